//! Variable descriptors and the particle-type schema.
//!
//! A [`Variable`] describes one per-particle quantity: its name, its element
//! type, and its *write cadence* -- whether the trajectory writer emits it at
//! every observation, only at a particle's first observation, or never.
//! A [`ParticleType`] is the full schema of a particle population: the five
//! built-in variables (`id`, `time`, `lon`, `lat`, `z`) plus any number of
//! user-declared ones.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ElementType
// ---------------------------------------------------------------------------

/// Element type of a particle variable.
///
/// Covers every numeric and boolean element type a variable may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Bool,
}

impl ElementType {
    /// Returns `true` for the floating-point element types.
    pub fn is_float(self) -> bool {
        matches!(self, ElementType::Float32 | ElementType::Float64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::UInt8 => "uint8",
            ElementType::UInt16 => "uint16",
            ElementType::UInt32 => "uint32",
            ElementType::UInt64 => "uint64",
            ElementType::Bool => "bool",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// ScalarValue
// ---------------------------------------------------------------------------

/// A single typed value read from or written to a particle variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Float32(f32),
    Float64(f64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Bool(bool),
}

impl ScalarValue {
    /// The element type this value belongs to.
    pub fn element_type(self) -> ElementType {
        match self {
            ScalarValue::Float32(_) => ElementType::Float32,
            ScalarValue::Float64(_) => ElementType::Float64,
            ScalarValue::Int8(_) => ElementType::Int8,
            ScalarValue::Int16(_) => ElementType::Int16,
            ScalarValue::Int32(_) => ElementType::Int32,
            ScalarValue::Int64(_) => ElementType::Int64,
            ScalarValue::UInt8(_) => ElementType::UInt8,
            ScalarValue::UInt16(_) => ElementType::UInt16,
            ScalarValue::UInt32(_) => ElementType::UInt32,
            ScalarValue::UInt64(_) => ElementType::UInt64,
            ScalarValue::Bool(_) => ElementType::Bool,
        }
    }
}

// ---------------------------------------------------------------------------
// WriteCadence
// ---------------------------------------------------------------------------

/// How often the trajectory writer emits a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteCadence {
    /// The variable is internal and never written to output.
    Never,
    /// The variable is written at every observation of the particle.
    EveryWrite,
    /// The variable is written only at the particle's first observation.
    Once,
}

impl WriteCadence {
    /// Returns `true` if the variable participates in output at all.
    pub fn is_written(self) -> bool {
        !matches!(self, WriteCadence::Never)
    }
}

// ---------------------------------------------------------------------------
// Variable
// ---------------------------------------------------------------------------

/// Descriptor of one per-particle variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Name under which the variable is stored and written.
    pub name: String,
    /// Element type of the variable's values.
    pub dtype: ElementType,
    /// Write cadence (see [`WriteCadence`]).
    pub cadence: WriteCadence,
}

impl Variable {
    /// Create a variable written at every observation.
    pub fn new(name: &str, dtype: ElementType) -> Self {
        Self {
            name: name.to_owned(),
            dtype,
            cadence: WriteCadence::EveryWrite,
        }
    }

    /// Switch the variable to write-once cadence.
    pub fn write_once(mut self) -> Self {
        self.cadence = WriteCadence::Once;
        self
    }

    /// Exclude the variable from output entirely.
    pub fn never_written(mut self) -> Self {
        self.cadence = WriteCadence::Never;
        self
    }
}

// ---------------------------------------------------------------------------
// ParticleType
// ---------------------------------------------------------------------------

/// Names of the variables every [`ParticleType`] defines.
pub const BUILTIN_VARIABLES: [&str; 5] = ["id", "time", "lon", "lat", "z"];

/// Schema of a particle population.
///
/// Always contains the built-in variables `id` (`Int64`), `time` (`Float64`)
/// and the spatial coordinates `lon`/`lat`/`z` in the configured position
/// dtype. User variables are appended with [`with_variable`](Self::with_variable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleType {
    variables: Vec<Variable>,
}

impl ParticleType {
    /// Create a schema with `Float32` spatial coordinates.
    pub fn new() -> Self {
        Self::with_position_dtype(ElementType::Float32)
    }

    /// Create a schema whose `lon`/`lat`/`z` use the given float dtype.
    ///
    /// # Panics
    ///
    /// Panics if `dtype` is not a floating-point element type.
    pub fn with_position_dtype(dtype: ElementType) -> Self {
        assert!(
            dtype.is_float(),
            "position dtype must be float32 or float64, got {dtype}"
        );
        Self {
            variables: vec![
                Variable::new("id", ElementType::Int64),
                Variable::new("time", ElementType::Float64),
                Variable::new("lon", dtype),
                Variable::new("lat", dtype),
                Variable::new("z", dtype),
            ],
        }
    }

    /// Append a user variable to the schema.
    ///
    /// # Panics
    ///
    /// Panics if a variable with the same name is already defined (including
    /// the built-ins).
    pub fn with_variable(mut self, var: Variable) -> Self {
        if self.variables.iter().any(|v| v.name == var.name) {
            panic!("variable '{}' is already defined in this particle type", var.name);
        }
        self.variables.push(var);
        self
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// All variables in declaration order (built-ins first).
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Variables that participate in output (cadence other than `Never`).
    pub fn written_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| v.cadence.is_written())
    }

    /// Comma-separated list of defined variable names, for error messages.
    pub fn known_names(&self) -> String {
        self.variables
            .iter()
            .map(|v| v.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ParticleType {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_variables_present() {
        let ptype = ParticleType::new();
        for name in BUILTIN_VARIABLES {
            assert!(ptype.get(name).is_some(), "missing builtin '{name}'");
        }
        assert_eq!(ptype.get("id").unwrap().dtype, ElementType::Int64);
        assert_eq!(ptype.get("time").unwrap().dtype, ElementType::Float64);
        assert_eq!(ptype.get("lon").unwrap().dtype, ElementType::Float32);
    }

    #[test]
    fn position_dtype_configurable() {
        let ptype = ParticleType::with_position_dtype(ElementType::Float64);
        assert_eq!(ptype.get("lon").unwrap().dtype, ElementType::Float64);
        assert_eq!(ptype.get("z").unwrap().dtype, ElementType::Float64);
        // time stays f64 regardless.
        assert_eq!(ptype.get("time").unwrap().dtype, ElementType::Float64);
    }

    #[test]
    #[should_panic(expected = "position dtype must be float32 or float64")]
    fn integer_position_dtype_rejected() {
        let _ = ParticleType::with_position_dtype(ElementType::Int32);
    }

    #[test]
    fn user_variables_appended_with_cadence() {
        let ptype = ParticleType::new()
            .with_variable(Variable::new("temperature", ElementType::Float32))
            .with_variable(Variable::new("origin_basin", ElementType::Int32).write_once())
            .with_variable(Variable::new("scratch", ElementType::Float64).never_written());

        assert_eq!(
            ptype.get("temperature").unwrap().cadence,
            WriteCadence::EveryWrite
        );
        assert_eq!(ptype.get("origin_basin").unwrap().cadence, WriteCadence::Once);
        assert_eq!(ptype.get("scratch").unwrap().cadence, WriteCadence::Never);

        let written: Vec<_> = ptype.written_variables().map(|v| v.name.as_str()).collect();
        assert!(written.contains(&"temperature"));
        assert!(written.contains(&"origin_basin"));
        assert!(!written.contains(&"scratch"));
    }

    #[test]
    #[should_panic(expected = "already defined")]
    fn duplicate_variable_name_rejected() {
        let _ = ParticleType::new().with_variable(Variable::new("time", ElementType::Float32));
    }

    #[test]
    fn scalar_value_element_types() {
        assert_eq!(
            ScalarValue::Float32(1.0).element_type(),
            ElementType::Float32
        );
        assert_eq!(ScalarValue::Bool(true).element_type(), ElementType::Bool);
        assert_eq!(ScalarValue::UInt64(9).element_type(), ElementType::UInt64);
    }
}
