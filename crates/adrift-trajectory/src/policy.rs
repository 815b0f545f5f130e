//! Write policy: decides whether a write event produces output, and for
//! which subset of the population.
//!
//! Every evaluation is atomic from the caller's perspective: the policy is
//! consulted with the current simulation time and an optional deletion
//! subset, returns a [`WriteDecision`], and holds no in-progress state
//! between calls. Deletion-subset writes and periodic writes are mutually
//! exclusive per call -- a supplied subset always takes the deletion path.
//!
//! The polymorphic "deleted subset" input (flag / indicator mask / explicit
//! index list) is a tagged variant resolved to one canonical index set here
//! at the policy boundary, so the rest of the writer never branches on its
//! shape.

use adrift_particles::collection::ParticleSet;

// ---------------------------------------------------------------------------
// DeletionSubset
// ---------------------------------------------------------------------------

/// Caller-supplied description of which particles are being deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionSubset {
    /// All particles currently in the deleted state, resolved via the
    /// collection's state-equality query.
    AllDeleted,
    /// Indicator mask over the active population; `true` entries are written.
    Mask(Vec<bool>),
    /// Explicit storage indices, passed through unchanged.
    Indices(Vec<usize>),
}

// ---------------------------------------------------------------------------
// WriteDecision
// ---------------------------------------------------------------------------

/// Why an evaluation produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Writer is in on-deletion-only mode and no deletion subset was given.
    OnDeleteOnly,
    /// A periodic write already happened at this exact time.
    RepeatedTime,
    /// The active population is empty (diagnostic emitted, non-fatal).
    EmptyPopulation,
    /// The resolved index subset was empty.
    EmptySelection,
}

/// A batch of particles selected for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    /// Storage indices of the particles to write, in collection order for
    /// periodic writes or caller order for explicit deletion indices.
    pub indices: Vec<usize>,
    /// `true` if this batch came from the periodic path. The writer records
    /// the periodic time via [`WritePolicy::mark_written`] only after the
    /// chunk persists, so a failed persist can be retried.
    pub periodic: bool,
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteDecision {
    Skip(SkipReason),
    Write(WriteBatch),
}

// ---------------------------------------------------------------------------
// WritePolicy
// ---------------------------------------------------------------------------

/// Per-writer write-decision state machine.
#[derive(Debug, Clone)]
pub struct WritePolicy {
    on_delete_only: bool,
    last_written_time: Option<f64>,
}

impl WritePolicy {
    /// Create a policy; `on_delete_only` selects the on-deletion write mode.
    pub fn new(on_delete_only: bool) -> Self {
        Self {
            on_delete_only,
            last_written_time: None,
        }
    }

    /// The time of the last accepted periodic write, if any.
    pub fn last_written_time(&self) -> Option<f64> {
        self.last_written_time
    }

    /// Record `time` as the last periodic write time. Called by the writer
    /// after a periodic chunk persists successfully.
    pub fn mark_written(&mut self, time: f64) {
        self.last_written_time = Some(time);
    }

    /// Evaluate one write request.
    ///
    /// The only mutation this performs is recording `time` when a periodic
    /// evaluation resolves to an empty selection (nothing will be persisted,
    /// so there is no later commit point). A non-empty periodic decision is
    /// returned with `periodic: true` and committed by the caller instead.
    ///
    /// # Panics
    ///
    /// Panics if a deletion mask's length does not match the population, or
    /// an explicit deletion index lies outside it. Both are contract
    /// violations by the caller.
    pub fn evaluate(
        &mut self,
        pset: &ParticleSet,
        time: f64,
        deleted: Option<DeletionSubset>,
    ) -> WriteDecision {
        if self.on_delete_only && deleted.is_none() {
            return WriteDecision::Skip(SkipReason::OnDeleteOnly);
        }
        // A deletion subset forces a write even at a repeated time.
        if deleted.is_none() && self.last_written_time == Some(time) {
            return WriteDecision::Skip(SkipReason::RepeatedTime);
        }
        if pset.is_empty() {
            tracing::warn!(time, "particle set is empty; skipping trajectory write");
            return WriteDecision::Skip(SkipReason::EmptyPopulation);
        }

        match deleted {
            Some(subset) => {
                let indices = resolve_subset(subset, pset);
                if indices.is_empty() {
                    WriteDecision::Skip(SkipReason::EmptySelection)
                } else {
                    WriteDecision::Write(WriteBatch {
                        indices,
                        periodic: false,
                    })
                }
            }
            None => {
                let indices = pset.due_for_output(time);
                if indices.is_empty() {
                    // Nothing due: remember the time so the caller's loop can
                    // re-enter at the same time without re-resolving.
                    self.mark_written(time);
                    WriteDecision::Skip(SkipReason::EmptySelection)
                } else {
                    WriteDecision::Write(WriteBatch {
                        indices,
                        periodic: true,
                    })
                }
            }
        }
    }
}

/// Resolve a [`DeletionSubset`] to a concrete index set.
fn resolve_subset(subset: DeletionSubset, pset: &ParticleSet) -> Vec<usize> {
    match subset {
        DeletionSubset::AllDeleted => pset.deleted_indices(),
        DeletionSubset::Mask(mask) => {
            assert_eq!(
                mask.len(),
                pset.len(),
                "deletion mask length {} does not match population size {}",
                mask.len(),
                pset.len()
            );
            mask.iter()
                .enumerate()
                .filter_map(|(i, &m)| m.then_some(i))
                .collect()
        }
        DeletionSubset::Indices(indices) => {
            for &i in &indices {
                assert!(
                    i < pset.len(),
                    "deletion index {i} lies outside the active population ({})",
                    pset.len()
                );
            }
            indices
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
