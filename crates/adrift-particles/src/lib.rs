//! Adrift particles -- SoA particle collection with a typed variable schema.
//!
//! This crate provides the particle population side of the Adrift
//! particle-tracking framework. A [`ParticleType`](variable::ParticleType)
//! declares the per-particle variables (name, element type, write cadence);
//! a [`ParticleSet`](collection::ParticleSet) stores the population in a
//! Structure-of-Arrays layout and exposes the query surface the trajectory
//! writer consumes: identity enumeration, column fetch by index subset, the
//! deleted-state and due-for-output queries, and the once-written flag.
//!
//! # Quick Start
//!
//! ```
//! use adrift_particles::prelude::*;
//!
//! let ptype = ParticleType::new()
//!     .with_variable(Variable::new("temperature", ElementType::Float32))
//!     .with_variable(Variable::new("release_depth", ElementType::Float32).write_once());
//!
//! let mut pset = ParticleSet::new(ptype);
//! let idx = pset.add(1001);
//! pset.set_value("temperature", idx, ScalarValue::Float32(18.2)).unwrap();
//! pset.set_value("time", idx, ScalarValue::Float64(0.0)).unwrap();
//!
//! assert_eq!(pset.ids(), &[1001]);
//! assert_eq!(pset.due_for_output(0.0), vec![0]);
//! ```

#![deny(unsafe_code)]

pub mod collection;
pub mod state;
pub mod variable;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by particle collection operations.
#[derive(Debug, thiserror::Error)]
pub enum ParticleError {
    /// A variable was referenced that the schema does not define.
    #[error("variable '{name}' is not defined. Known variables: [{known}]")]
    UnknownVariable { name: String, known: String },

    /// A value of the wrong element type was written to a variable.
    #[error("type mismatch for variable '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: variable::ElementType,
        actual: variable::ElementType,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::collection::{Column, ParticleSet};
    pub use crate::state::StatusCode;
    pub use crate::variable::{
        ElementType, ParticleType, ScalarValue, Variable, WriteCadence, BUILTIN_VARIABLES,
    };
    pub use crate::ParticleError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
