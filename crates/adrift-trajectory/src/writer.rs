//! The incremental trajectory writer.
//!
//! A [`TrajectoryWriter`] owns one output target: it keeps the identity
//! registry, observation counters, write policy and chunk store together,
//! and turns accepted write events into immutable chunk files. All of its
//! own state advances only after a chunk persists successfully, so a write
//! that fails with an I/O error can be retried with identical inputs.
//!
//! The writer is synchronous and single-owner: every write is triggered by
//! the simulation loop advancing time, and no state is shared between
//! writers. In multi-worker runs each rank constructs its own writer over a
//! disjoint chunk directory; there is no cross-worker coordination.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::json;

use crate::chunk::{arrow_type, dense_array, sparse_array, ChunkDescriptor, ChunkStore};
use crate::counters::ObservationCounters;
use crate::fill::OutputVariables;
use crate::layout::{AttrMap, CfTrajectoryLayout, OutputLayout, TimeOrigin};
use crate::policy::{DeletionSubset, WriteDecision, WritePolicy};
use crate::registry::IdentityRegistry;
use crate::OutputError;
use adrift_particles::collection::ParticleSet;

/// Output extensions accepted for the target path.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["parquet", "pqt", "parq"];

// ---------------------------------------------------------------------------
// WriterConfig
// ---------------------------------------------------------------------------

/// How write events are expected to arrive.
///
/// The cadence is documentation for the driving loop; the policy dedups
/// repeated periodic times either way.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCadence {
    /// The loop triggers a write every `interval` seconds of simulation time.
    Interval(f64),
    /// Writes are triggered externally (e.g. by an event kernel).
    External,
}

/// Identity of this worker within a multi-process run.
///
/// Passed in explicitly so output-path partitioning is a pure function of
/// configuration rather than of global process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRank {
    pub rank: usize,
    pub size: usize,
}

impl Default for WorkerRank {
    fn default() -> Self {
        Self { rank: 0, size: 1 }
    }
}

/// Construction parameters for a [`TrajectoryWriter`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Output target directory; the extension must be one of
    /// [`ALLOWED_EXTENSIONS`].
    pub path: PathBuf,
    /// Expected write cadence.
    pub cadence: OutputCadence,
    /// On-deletion-only write mode.
    pub write_on_delete: bool,
    /// This worker's rank within the run.
    pub rank: WorkerRank,
    /// Origin and calendar of the time axis, for metadata.
    pub time_origin: TimeOrigin,
}

impl WriterConfig {
    /// Config with external cadence, periodic mode, single worker.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cadence: OutputCadence::External,
            write_on_delete: false,
            rank: WorkerRank::default(),
            time_origin: TimeOrigin::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TrajectoryWriter
// ---------------------------------------------------------------------------

/// Incremental writer of per-particle trajectory chunks.
pub struct TrajectoryWriter {
    layout: Box<dyn OutputLayout>,
    registry: IdentityRegistry,
    counters: ObservationCounters,
    policy: WritePolicy,
    variables: OutputVariables,
    attrs: BTreeMap<String, AttrMap>,
    metadata: BTreeMap<String, serde_json::Value>,
    cadence: OutputCadence,
    store: ChunkStore,
    closed: bool,
}

impl std::fmt::Debug for TrajectoryWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrajectoryWriter")
            .field("layout", &"<dyn OutputLayout>")
            .field("registry", &self.registry)
            .field("counters", &self.counters)
            .field("policy", &self.policy)
            .field("variables", &self.variables)
            .field("attrs", &self.attrs)
            .field("metadata", &self.metadata)
            .field("cadence", &self.cadence)
            .field("store", &self.store)
            .field("closed", &self.closed)
            .finish()
    }
}

impl TrajectoryWriter {
    /// Construct a writer over `pset`'s schema with the stock CF trajectory
    /// layout.
    ///
    /// Validates the output extension before touching the filesystem, wipes
    /// and recreates this writer's chunk directory, and clears the
    /// population's once-written flags (a fresh writer owns a fresh
    /// trajectory history).
    ///
    /// # Errors
    ///
    /// [`OutputError::UnsupportedExtension`] for a target outside the
    /// allow-list; [`OutputError::Io`] if the chunk directory cannot be
    /// prepared. No partial state is created on error.
    pub fn new(config: WriterConfig, pset: &mut ParticleSet) -> Result<Self, OutputError> {
        Self::with_layout(config, pset, Box::new(CfTrajectoryLayout))
    }

    /// Construct a writer with a caller-supplied [`OutputLayout`].
    pub fn with_layout(
        config: WriterConfig,
        pset: &mut ParticleSet,
        layout: Box<dyn OutputLayout>,
    ) -> Result<Self, OutputError> {
        let extension = config
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_owned();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(OutputError::UnsupportedExtension { extension });
        }
        if let OutputCadence::Interval(interval) = config.cadence {
            if !(interval > 0.0 && interval.is_finite()) {
                return Err(OutputError::InvalidInterval { interval });
            }
        }

        assert!(
            config.rank.size > 0 && config.rank.rank < config.rank.size,
            "worker rank {} is not valid for a run of size {}",
            config.rank.rank,
            config.rank.size
        );
        let chunk_dir = if config.rank.size > 1 {
            let dir = config
                .path
                .join(format!("proc{:02}.parquet", config.rank.rank));
            tracing::warn!(
                rank = config.rank.rank,
                path = %dir.display(),
                "multi-worker run: chunk files are written per worker rank"
            );
            dir
        } else {
            config.path.clone()
        };
        let store = ChunkStore::create(&chunk_dir)?;

        let variables = OutputVariables::classify(pset.ptype());
        let attrs = layout.variable_attributes(&variables, &config.time_origin);

        // A new writer attached to an existing population starts every
        // particle's write-once history over.
        pset.reset_once_written();

        let metadata = BTreeMap::from([
            ("feature_type".to_owned(), json!("trajectory")),
            ("Conventions".to_owned(), json!("CF-1.6/CF-1.7")),
            (
                "adrift_version".to_owned(),
                json!(env!("CARGO_PKG_VERSION")),
            ),
        ]);

        Ok(Self {
            layout,
            registry: IdentityRegistry::new(),
            counters: ObservationCounters::new(),
            policy: WritePolicy::new(config.write_on_delete),
            variables,
            attrs,
            metadata,
            cadence: config.cadence,
            store,
            closed: false,
        })
    }

    /// The configured write cadence, for the driving loop to query.
    pub fn cadence(&self) -> &OutputCadence {
        &self.cadence
    }

    /// Attach a user metadata entry to all subsequently written chunks.
    pub fn add_metadata(&mut self, name: &str, value: impl Into<serde_json::Value>) {
        self.metadata.insert(name.to_owned(), value.into());
    }

    /// Number of distinct identities ever observed.
    pub fn maxids(&self) -> usize {
        self.registry.len()
    }

    /// Number of chunks persisted so far.
    pub fn chunks_written(&self) -> u64 {
        self.store.next_sequence()
    }

    /// Directory chunk files are written into.
    pub fn chunk_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Rows emitted so far for `id`, if it has ever been observed.
    pub fn observation_count(&self, id: i64) -> Option<u64> {
        self.registry.get(id).map(|local| self.counters.get(local))
    }

    /// Write one time step of `pset` to the output target.
    ///
    /// Consults the write policy with `time` and the optional deletion
    /// subset; if the policy decides to write, assembles a chunk for the
    /// selected particles and persists it. Registry, counters, once-written
    /// flags, periodic-time bookkeeping and the chunk sequence advance only
    /// after the chunk file is on disk.
    ///
    /// Returns the descriptor of the persisted chunk, or `None` when the
    /// policy skipped the write.
    pub fn write(
        &mut self,
        pset: &mut ParticleSet,
        time: f64,
        deleted: Option<DeletionSubset>,
    ) -> Result<Option<ChunkDescriptor>, OutputError> {
        if self.closed {
            return Err(OutputError::Closed);
        }

        let selection = match self.policy.evaluate(pset, time, deleted) {
            WriteDecision::Skip(_) => return Ok(None),
            WriteDecision::Write(selection) => selection,
        };
        let indices = &selection.indices;

        // Resolve identities and (tentatively) their local indices; new
        // identities get the indices `register` will assign on commit.
        let pids: Vec<i64> = indices.iter().map(|&i| pset.ids()[i]).collect();
        let plan = self.registry.plan(&pids);

        // Rows that are a particle's first-ever write.
        let once_mask: Vec<bool> = indices.iter().map(|&i| !pset.once_written(i)).collect();
        let once_rows: Vec<usize> = indices
            .iter()
            .zip(&once_mask)
            .filter_map(|(&i, &first)| first.then_some(i))
            .collect();

        // Each row's position within its particle's trajectory.
        let obs: Vec<u64> = plan.local.iter().map(|&l| self.counters.get(l)).collect();

        let batch = self.assemble_chunk(pset, indices, &pids, &obs, &once_mask, &once_rows)?;
        let descriptor = self.store.persist(&batch)?;

        // Commit: nothing above this point mutated writer or collection state.
        self.registry.register(&plan.new_ids);
        self.counters.grow_to(self.registry.len());
        self.counters.increment(&plan.local);
        pset.set_once_written(&once_rows);
        if selection.periodic {
            self.policy.mark_written(time);
        }

        Ok(Some(descriptor))
    }

    /// Tear the writer down. Further writes fail with [`OutputError::Closed`];
    /// previously persisted chunks are unaffected.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Build the record batch for one chunk: the `(trajectory, obs)` row key
    /// followed by one column per selected variable.
    fn assemble_chunk(
        &self,
        pset: &ParticleSet,
        indices: &[usize],
        pids: &[i64],
        obs: &[u64],
        once_mask: &[bool],
        once_rows: &[usize],
    ) -> Result<RecordBatch, OutputError> {
        let mut fields: Vec<Field> = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();

        fields.push(
            Field::new("trajectory", DataType::Int64, false)
                .with_metadata(self.field_metadata("trajectory")),
        );
        arrays.push(Arc::new(Int64Array::from(pids.to_vec())));
        fields.push(Field::new("obs", DataType::UInt64, false));
        arrays.push(Arc::new(UInt64Array::from(obs.to_vec())));

        for var in &self.variables.every {
            let out_name = self.layout.output_name(&var.name);
            if out_name == "trajectory" {
                // The identity is the row key, not a data column.
                continue;
            }
            let col = pset.gather(&var.name, indices)?;
            fields.push(
                Field::new(out_name.as_str(), arrow_type(var.dtype), false)
                    .with_metadata(self.field_metadata(&out_name)),
            );
            arrays.push(dense_array(&col));
        }

        for var in &self.variables.once {
            let out_name = self.layout.output_name(&var.name);
            if out_name == "trajectory" {
                continue;
            }
            let col = pset.gather(&var.name, once_rows)?;
            fields.push(
                Field::new(out_name.as_str(), arrow_type(var.dtype), true)
                    .with_metadata(self.field_metadata(&out_name)),
            );
            arrays.push(sparse_array(&col, once_mask));
        }

        let schema = Arc::new(Schema::new_with_metadata(fields, self.schema_metadata()));
        Ok(RecordBatch::try_new(schema, arrays)?)
    }

    /// Writer-level metadata in Arrow schema form.
    fn schema_metadata(&self) -> HashMap<String, String> {
        self.metadata
            .iter()
            .map(|(k, v)| (k.clone(), json_to_metadata_string(v)))
            .collect()
    }

    /// Attribute metadata of one output variable in Arrow field form.
    fn field_metadata(&self, out_name: &str) -> HashMap<String, String> {
        self.attrs
            .get(out_name)
            .map(|attrs| {
                attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), json_to_metadata_string(v)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Drop for TrajectoryWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Render an attribute value for Arrow/parquet metadata, which is string
/// keyed and string valued. Plain strings stay unquoted.
fn json_to_metadata_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
