//! Variable classification and the type/fill-value table.
//!
//! Classification happens exactly once, at writer construction: every schema
//! variable marked for output lands in either the write-every-time or the
//! write-once group of an [`OutputVariables`]. The fill-value table maps
//! each element type to its sentinel -- NaN for floating types, the type's
//! maximum for integer and boolean types (booleans are stored as `int8` on
//! disk, so they share its maximum). Fill values feed the documentation
//! attributes attached to the output; they are never substituted into
//! fetched data.

use std::fmt;

use adrift_particles::variable::{ElementType, ParticleType, Variable, WriteCadence};

// ---------------------------------------------------------------------------
// FillValue
// ---------------------------------------------------------------------------

/// Sentinel value documenting "no data" for one element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillValue {
    /// Floating-point sentinel (always NaN).
    Float(f64),
    /// Signed-integer sentinel (the type's maximum).
    Int(i64),
    /// Unsigned-integer sentinel (the type's maximum).
    UInt(u64),
}

impl FillValue {
    /// JSON representation for attribute metadata. NaN has no JSON number
    /// form, so float sentinels serialize as the string `"NaN"`.
    pub fn to_json(self) -> serde_json::Value {
        match self {
            FillValue::Float(_) => serde_json::Value::String("NaN".to_owned()),
            FillValue::Int(v) => serde_json::Value::from(v),
            FillValue::UInt(v) => serde_json::Value::from(v),
        }
    }
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillValue::Float(_) => write!(f, "NaN"),
            FillValue::Int(v) => write!(f, "{v}"),
            FillValue::UInt(v) => write!(f, "{v}"),
        }
    }
}

/// The fill-value sentinel for `dtype`.
pub fn fill_value(dtype: ElementType) -> FillValue {
    match dtype {
        ElementType::Float32 | ElementType::Float64 => FillValue::Float(f64::NAN),
        // Booleans are written as int8 and share its maximum.
        ElementType::Bool | ElementType::Int8 => FillValue::Int(i8::MAX as i64),
        ElementType::Int16 => FillValue::Int(i16::MAX as i64),
        ElementType::Int32 => FillValue::Int(i32::MAX as i64),
        ElementType::Int64 => FillValue::Int(i64::MAX),
        ElementType::UInt8 => FillValue::UInt(u8::MAX as u64),
        ElementType::UInt16 => FillValue::UInt(u16::MAX as u64),
        ElementType::UInt32 => FillValue::UInt(u32::MAX as u64),
        ElementType::UInt64 => FillValue::UInt(u64::MAX),
    }
}

// ---------------------------------------------------------------------------
// OutputVariables
// ---------------------------------------------------------------------------

/// The output variable set, partitioned by write cadence.
#[derive(Debug, Clone)]
pub struct OutputVariables {
    /// Variables written at every observation.
    pub every: Vec<Variable>,
    /// Variables written only at a particle's first observation.
    pub once: Vec<Variable>,
}

impl OutputVariables {
    /// Partition the schema's written variables by cadence.
    pub fn classify(ptype: &ParticleType) -> Self {
        let mut every = Vec::new();
        let mut once = Vec::new();
        for var in ptype.written_variables() {
            match var.cadence {
                WriteCadence::EveryWrite => every.push(var.clone()),
                WriteCadence::Once => once.push(var.clone()),
                WriteCadence::Never => unreachable!("written_variables excludes Never"),
            }
        }
        Self { every, once }
    }

    /// All output variables, every-write group first.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.every.iter().chain(self.once.iter())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_types_fill_with_nan() {
        for dtype in [ElementType::Float32, ElementType::Float64] {
            match fill_value(dtype) {
                FillValue::Float(v) => assert!(v.is_nan()),
                other => panic!("expected NaN sentinel for {dtype}, got {other:?}"),
            }
        }
    }

    #[test]
    fn integer_types_fill_with_type_maximum() {
        assert_eq!(fill_value(ElementType::Int8), FillValue::Int(127));
        assert_eq!(fill_value(ElementType::Int16), FillValue::Int(i16::MAX as i64));
        assert_eq!(fill_value(ElementType::Int32), FillValue::Int(i32::MAX as i64));
        assert_eq!(fill_value(ElementType::Int64), FillValue::Int(i64::MAX));
        assert_eq!(fill_value(ElementType::UInt8), FillValue::UInt(255));
        assert_eq!(fill_value(ElementType::UInt16), FillValue::UInt(u16::MAX as u64));
        assert_eq!(fill_value(ElementType::UInt32), FillValue::UInt(u32::MAX as u64));
        assert_eq!(fill_value(ElementType::UInt64), FillValue::UInt(u64::MAX));
    }

    #[test]
    fn bool_shares_the_int8_maximum() {
        assert_eq!(fill_value(ElementType::Bool), fill_value(ElementType::Int8));
    }

    #[test]
    fn json_form_is_metadata_friendly() {
        assert_eq!(
            fill_value(ElementType::Float32).to_json(),
            serde_json::Value::String("NaN".to_owned())
        );
        assert_eq!(
            fill_value(ElementType::Int32).to_json(),
            serde_json::json!(i32::MAX)
        );
    }

    #[test]
    fn classification_partitions_by_cadence() {
        let ptype = ParticleType::new()
            .with_variable(Variable::new("temperature", ElementType::Float32))
            .with_variable(Variable::new("release_depth", ElementType::Float32).write_once())
            .with_variable(Variable::new("scratch", ElementType::Float64).never_written());

        let vars = OutputVariables::classify(&ptype);
        let every: Vec<&str> = vars.every.iter().map(|v| v.name.as_str()).collect();
        let once: Vec<&str> = vars.once.iter().map(|v| v.name.as_str()).collect();

        assert_eq!(every, vec!["id", "time", "lon", "lat", "z", "temperature"]);
        assert_eq!(once, vec!["release_depth"]);
        assert!(vars.iter().all(|v| v.name != "scratch"));
    }
}
