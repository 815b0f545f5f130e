//! Per-particle status codes.
//!
//! The simulation kernel sets a [`StatusCode`] on each particle as it steps
//! the population. The trajectory writer only ever queries for
//! [`StatusCode::Delete`] to resolve "currently deleted" subsets; the other
//! codes exist for the kernel loop.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StatusCode
// ---------------------------------------------------------------------------

/// State of a particle within the current simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// The particle was stepped successfully.
    Success,
    /// The particle still needs to be evaluated this step.
    Evaluate,
    /// The kernel requested re-execution of this particle.
    Repeat,
    /// The particle is marked for removal from the simulation.
    Delete,
    /// The kernel requested that execution stop after this step.
    StopExecution,
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_success() {
        assert_eq!(StatusCode::default(), StatusCode::Success);
    }

    #[test]
    fn serialization_roundtrip() {
        let json = serde_json::to_string(&StatusCode::Delete).unwrap();
        let back: StatusCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StatusCode::Delete);
    }
}
