//! Adrift trajectory output -- incremental, chunked, columnar trajectory
//! writing for a dynamically changing particle population.
//!
//! The writer reconciles an open population (particles are added, mutated
//! and removed between write events) with an append-only storage model:
//! every accepted write event emits one immutable parquet chunk whose rows
//! are keyed by `(trajectory, obs)` -- the particle's identity and its
//! position within that particle's trajectory. Identities get stable compact
//! local indices on first observation ([`registry`]), per-particle
//! observation counters make the `obs` sequence gap-free ([`counters`]),
//! the write policy decides what a write event covers ([`policy`]), and
//! variables are classified once into write-once and write-every-time
//! groups with type-derived fill-value metadata ([`fill`]).
//!
//! Downstream consumers can reassemble ordered per-particle trajectories
//! from the chunk files alone, in any order, without this crate.
//!
//! # Quick Start
//!
//! ```no_run
//! use adrift_particles::prelude::*;
//! use adrift_trajectory::prelude::*;
//!
//! let ptype = ParticleType::new()
//!     .with_variable(Variable::new("temperature", ElementType::Float32));
//! let mut pset = ParticleSet::new(ptype);
//! for id in [1, 2] {
//!     let idx = pset.add(id);
//!     pset.set_value("time", idx, ScalarValue::Float64(0.0)).unwrap();
//! }
//!
//! let config = WriterConfig::new("run_output.parquet");
//! let mut writer = TrajectoryWriter::new(config, &mut pset).unwrap();
//!
//! // One chunk per accepted write event.
//! let chunk = writer.write(&mut pset, 0.0, None).unwrap();
//! assert!(chunk.is_some());
//!
//! // Repeating the same periodic time is a no-op.
//! assert!(writer.write(&mut pset, 0.0, None).unwrap().is_none());
//! ```

#![deny(unsafe_code)]

pub mod chunk;
pub mod counters;
pub mod fill;
pub mod layout;
pub mod policy;
pub mod registry;
pub mod writer;

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by trajectory output operations.
///
/// Construction-time errors abort construction with no partial state;
/// per-write errors abort only that write, leaving prior chunks and all
/// writer state intact.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The output target's extension is not in the allow-list.
    #[error("unsupported output extension '{extension}'. Use one of: .parquet, .pqt, .parq")]
    UnsupportedExtension { extension: String },

    /// A fixed output interval must be positive and finite.
    #[error("output interval must be positive and finite, got {interval}")]
    InvalidInterval { interval: f64 },

    /// Filesystem failure preparing the store or creating a chunk file.
    #[error("I/O failure at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The parquet writer failed while persisting a chunk.
    #[error("failed to persist chunk '{path}': {source}")]
    Persist {
        path: PathBuf,
        source: parquet::errors::ParquetError,
    },

    /// Chunk table assembly failed.
    #[error("failed to assemble chunk table: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// The particle collection rejected a column fetch.
    #[error("particle collection error: {0}")]
    Collection(#[from] adrift_particles::ParticleError),

    /// The writer has been closed and accepts no further writes.
    #[error("trajectory writer is closed; no further writes are accepted")]
    Closed,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::chunk::{ChunkDescriptor, ChunkStore};
    pub use crate::counters::ObservationCounters;
    pub use crate::fill::{fill_value, FillValue, OutputVariables};
    pub use crate::layout::{AttrMap, CfTrajectoryLayout, OutputLayout, TimeOrigin};
    pub use crate::policy::{DeletionSubset, SkipReason, WriteBatch, WriteDecision, WritePolicy};
    pub use crate::registry::{IdentityRegistry, IndexPlan};
    pub use crate::writer::{
        OutputCadence, TrajectoryWriter, WorkerRank, WriterConfig, ALLOWED_EXTENSIONS,
    };
    pub use crate::OutputError;
}
