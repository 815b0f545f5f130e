//! Structure-of-Arrays particle collection.
//!
//! A [`ParticleSet`] stores one [`Column`] per schema variable plus the
//! bookkeeping the trajectory writer needs: per-particle status codes and the
//! once-written flag. Particle identities are caller-owned `i64` keys; the
//! collection never invents or recycles them.
//!
//! The query surface follows what the output subsystem consumes:
//! enumeration ([`ids`](ParticleSet::ids), [`len`](ParticleSet::len)),
//! column fetch by index subset ([`gather`](ParticleSet::gather)),
//! the deleted-state query ([`deleted_indices`](ParticleSet::deleted_indices)),
//! the due-for-output query ([`due_for_output`](ParticleSet::due_for_output)),
//! and get/set of the once-written flag.

use std::collections::BTreeMap;

use crate::state::StatusCode;
use crate::variable::{ElementType, ParticleType, ScalarValue};
use crate::ParticleError;

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// A dense, typed column of per-particle values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Bool(Vec<bool>),
}

impl Column {
    /// Create a zero-initialized column of the given type and length.
    pub fn zeroed(dtype: ElementType, len: usize) -> Self {
        match dtype {
            ElementType::Float32 => Column::Float32(vec![0.0; len]),
            ElementType::Float64 => Column::Float64(vec![0.0; len]),
            ElementType::Int8 => Column::Int8(vec![0; len]),
            ElementType::Int16 => Column::Int16(vec![0; len]),
            ElementType::Int32 => Column::Int32(vec![0; len]),
            ElementType::Int64 => Column::Int64(vec![0; len]),
            ElementType::UInt8 => Column::UInt8(vec![0; len]),
            ElementType::UInt16 => Column::UInt16(vec![0; len]),
            ElementType::UInt32 => Column::UInt32(vec![0; len]),
            ElementType::UInt64 => Column::UInt64(vec![0; len]),
            ElementType::Bool => Column::Bool(vec![false; len]),
        }
    }

    /// The element type of this column.
    pub fn element_type(&self) -> ElementType {
        match self {
            Column::Float32(_) => ElementType::Float32,
            Column::Float64(_) => ElementType::Float64,
            Column::Int8(_) => ElementType::Int8,
            Column::Int16(_) => ElementType::Int16,
            Column::Int32(_) => ElementType::Int32,
            Column::Int64(_) => ElementType::Int64,
            Column::UInt8(_) => ElementType::UInt8,
            Column::UInt16(_) => ElementType::UInt16,
            Column::UInt32(_) => ElementType::UInt32,
            Column::UInt64(_) => ElementType::UInt64,
            Column::Bool(_) => ElementType::Bool,
        }
    }

    /// Number of values in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Float32(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Int8(v) => v.len(),
            Column::Int16(v) => v.len(),
            Column::Int32(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::UInt8(v) => v.len(),
            Column::UInt16(v) => v.len(),
            Column::UInt32(v) => v.len(),
            Column::UInt64(v) => v.len(),
            Column::Bool(v) => v.len(),
        }
    }

    /// Returns `true` if the column holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append the type's zero value.
    fn push_default(&mut self) {
        match self {
            Column::Float32(v) => v.push(0.0),
            Column::Float64(v) => v.push(0.0),
            Column::Int8(v) => v.push(0),
            Column::Int16(v) => v.push(0),
            Column::Int32(v) => v.push(0),
            Column::Int64(v) => v.push(0),
            Column::UInt8(v) => v.push(0),
            Column::UInt16(v) => v.push(0),
            Column::UInt32(v) => v.push(0),
            Column::UInt64(v) => v.push(0),
            Column::Bool(v) => v.push(false),
        }
    }

    /// Copy out the values at `indices`, in the given order.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of range.
    pub fn gather(&self, indices: &[usize]) -> Column {
        match self {
            Column::Float32(v) => Column::Float32(indices.iter().map(|&i| v[i]).collect()),
            Column::Float64(v) => Column::Float64(indices.iter().map(|&i| v[i]).collect()),
            Column::Int8(v) => Column::Int8(indices.iter().map(|&i| v[i]).collect()),
            Column::Int16(v) => Column::Int16(indices.iter().map(|&i| v[i]).collect()),
            Column::Int32(v) => Column::Int32(indices.iter().map(|&i| v[i]).collect()),
            Column::Int64(v) => Column::Int64(indices.iter().map(|&i| v[i]).collect()),
            Column::UInt8(v) => Column::UInt8(indices.iter().map(|&i| v[i]).collect()),
            Column::UInt16(v) => Column::UInt16(indices.iter().map(|&i| v[i]).collect()),
            Column::UInt32(v) => Column::UInt32(indices.iter().map(|&i| v[i]).collect()),
            Column::UInt64(v) => Column::UInt64(indices.iter().map(|&i| v[i]).collect()),
            Column::Bool(v) => Column::Bool(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    /// Read the value at `index`.
    pub fn get(&self, index: usize) -> ScalarValue {
        match self {
            Column::Float32(v) => ScalarValue::Float32(v[index]),
            Column::Float64(v) => ScalarValue::Float64(v[index]),
            Column::Int8(v) => ScalarValue::Int8(v[index]),
            Column::Int16(v) => ScalarValue::Int16(v[index]),
            Column::Int32(v) => ScalarValue::Int32(v[index]),
            Column::Int64(v) => ScalarValue::Int64(v[index]),
            Column::UInt8(v) => ScalarValue::UInt8(v[index]),
            Column::UInt16(v) => ScalarValue::UInt16(v[index]),
            Column::UInt32(v) => ScalarValue::UInt32(v[index]),
            Column::UInt64(v) => ScalarValue::UInt64(v[index]),
            Column::Bool(v) => ScalarValue::Bool(v[index]),
        }
    }

    /// Write `value` at `index`. The value's type must match the column's.
    fn set(&mut self, index: usize, value: ScalarValue) -> Result<(), ElementType> {
        match (self, value) {
            (Column::Float32(v), ScalarValue::Float32(x)) => v[index] = x,
            (Column::Float64(v), ScalarValue::Float64(x)) => v[index] = x,
            (Column::Int8(v), ScalarValue::Int8(x)) => v[index] = x,
            (Column::Int16(v), ScalarValue::Int16(x)) => v[index] = x,
            (Column::Int32(v), ScalarValue::Int32(x)) => v[index] = x,
            (Column::Int64(v), ScalarValue::Int64(x)) => v[index] = x,
            (Column::UInt8(v), ScalarValue::UInt8(x)) => v[index] = x,
            (Column::UInt16(v), ScalarValue::UInt16(x)) => v[index] = x,
            (Column::UInt32(v), ScalarValue::UInt32(x)) => v[index] = x,
            (Column::UInt64(v), ScalarValue::UInt64(x)) => v[index] = x,
            (Column::Bool(v), ScalarValue::Bool(x)) => v[index] = x,
            (col, _) => return Err(col.element_type()),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ParticleSet
// ---------------------------------------------------------------------------

/// SoA collection of simulated particles.
#[derive(Debug, Clone)]
pub struct ParticleSet {
    ptype: ParticleType,
    /// Caller-owned unique identity per particle, parallel to every column.
    ids: Vec<i64>,
    state: Vec<StatusCode>,
    /// Set by the trajectory writer once a particle's first row is emitted.
    once_written: Vec<bool>,
    /// One column per schema variable except `id`, which lives in `ids`.
    columns: BTreeMap<String, Column>,
}

impl ParticleSet {
    /// Create an empty collection with the given schema.
    pub fn new(ptype: ParticleType) -> Self {
        let columns = ptype
            .variables()
            .iter()
            .filter(|v| v.name != "id")
            .map(|v| (v.name.clone(), Column::zeroed(v.dtype, 0)))
            .collect();
        Self {
            ptype,
            ids: Vec::new(),
            state: Vec::new(),
            once_written: Vec::new(),
            columns,
        }
    }

    /// Number of particles currently in the collection.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if the collection holds no particles.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The schema this collection was created with.
    pub fn ptype(&self) -> &ParticleType {
        &self.ptype
    }

    /// Identities of all particles, in storage order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Append a particle with the given identity; all variables start zeroed.
    ///
    /// Returns the storage index of the new particle.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already present -- identities are unique by contract.
    pub fn add(&mut self, id: i64) -> usize {
        assert!(
            !self.ids.contains(&id),
            "particle id {id} is already present in the collection"
        );
        self.ids.push(id);
        self.state.push(StatusCode::default());
        self.once_written.push(false);
        for col in self.columns.values_mut() {
            col.push_default();
        }
        self.ids.len() - 1
    }

    /// Remove the particles at `indices`, compacting the collection while
    /// preserving the relative order of the survivors.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of range.
    pub fn remove(&mut self, indices: &[usize]) {
        for &i in indices {
            assert!(i < self.len(), "remove index {i} out of range ({})", self.len());
        }
        let mut keep = vec![true; self.len()];
        for &i in indices {
            keep[i] = false;
        }
        let kept: Vec<usize> = (0..self.len()).filter(|&i| keep[i]).collect();

        self.ids = kept.iter().map(|&i| self.ids[i]).collect();
        self.state = kept.iter().map(|&i| self.state[i]).collect();
        self.once_written = kept.iter().map(|&i| self.once_written[i]).collect();
        for col in self.columns.values_mut() {
            *col = col.gather(&kept);
        }
    }

    /// Borrow the full column for `name`. The `id` variable is not backed by
    /// a [`Column`]; use [`ids`](Self::ids) or [`gather`](Self::gather).
    pub fn column(&self, name: &str) -> Result<&Column, ParticleError> {
        self.columns.get(name).ok_or_else(|| ParticleError::UnknownVariable {
            name: name.to_owned(),
            known: self.ptype.known_names(),
        })
    }

    /// Copy out the values of variable `name` at `indices`, in order.
    ///
    /// `"id"` is served from identity storage as an `Int64` column.
    pub fn gather(&self, name: &str, indices: &[usize]) -> Result<Column, ParticleError> {
        if name == "id" {
            return Ok(Column::Int64(indices.iter().map(|&i| self.ids[i]).collect()));
        }
        Ok(self.column(name)?.gather(indices))
    }

    /// Read one value of variable `name` at storage index `index`.
    pub fn value(&self, name: &str, index: usize) -> Result<ScalarValue, ParticleError> {
        if name == "id" {
            return Ok(ScalarValue::Int64(self.ids[index]));
        }
        Ok(self.column(name)?.get(index))
    }

    /// Write one value of variable `name` at storage index `index`.
    ///
    /// The value's element type must match the schema.
    ///
    /// # Panics
    ///
    /// Panics if `name` is `"id"` -- identities are caller-owned and fixed at
    /// [`add`](Self::add).
    pub fn set_value(
        &mut self,
        name: &str,
        index: usize,
        value: ScalarValue,
    ) -> Result<(), ParticleError> {
        assert!(
            name != "id",
            "the 'id' variable is fixed at add() and cannot be reassigned"
        );
        let known = self.ptype.known_names();
        let col = self
            .columns
            .get_mut(name)
            .ok_or_else(|| ParticleError::UnknownVariable {
                name: name.to_owned(),
                known,
            })?;
        col.set(index, value).map_err(|expected| ParticleError::TypeMismatch {
            name: name.to_owned(),
            expected,
            actual: value.element_type(),
        })
    }

    /// Status code of the particle at `index`.
    pub fn state(&self, index: usize) -> StatusCode {
        self.state[index]
    }

    /// Set the status code of the particle at `index`.
    pub fn set_state(&mut self, index: usize, code: StatusCode) {
        self.state[index] = code;
    }

    /// Storage indices of all particles currently in the deleted state.
    pub fn deleted_indices(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.state[i] == StatusCode::Delete)
            .collect()
    }

    /// Storage indices of particles due for output at simulation time `time`,
    /// i.e. those whose `time` variable has been advanced to exactly `time`.
    pub fn due_for_output(&self, time: f64) -> Vec<usize> {
        let times = self.time_column();
        (0..self.len()).filter(|&i| times[i] == time).collect()
    }

    /// Whether the particle at `index` has had its first row emitted.
    pub fn once_written(&self, index: usize) -> bool {
        self.once_written[index]
    }

    /// Mark the particles at `indices` as once-written. Idempotent; the flag
    /// is never unset for a living particle.
    pub fn set_once_written(&mut self, indices: &[usize]) {
        for &i in indices {
            self.once_written[i] = true;
        }
    }

    /// Clear every once-written flag. Called when a new trajectory writer is
    /// attached to an existing population.
    pub fn reset_once_written(&mut self) {
        for flag in &mut self.once_written {
            *flag = false;
        }
    }

    fn time_column(&self) -> &[f64] {
        match &self.columns["time"] {
            Column::Float64(v) => v,
            other => panic!(
                "schema invariant broken: 'time' column has type {}",
                other.element_type()
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;

    fn small_set() -> ParticleSet {
        let ptype = ParticleType::new()
            .with_variable(Variable::new("temperature", ElementType::Float32))
            .with_variable(Variable::new("origin_basin", ElementType::Int32).write_once());
        let mut pset = ParticleSet::new(ptype);
        for id in [11, 7, 42] {
            pset.add(id);
        }
        pset
    }

    #[test]
    fn add_and_enumerate() {
        let pset = small_set();
        assert_eq!(pset.len(), 3);
        assert_eq!(pset.ids(), &[11, 7, 42]);
    }

    #[test]
    #[should_panic(expected = "already present")]
    fn duplicate_id_rejected() {
        let mut pset = small_set();
        pset.add(7);
    }

    #[test]
    fn set_and_get_values() {
        let mut pset = small_set();
        pset.set_value("temperature", 1, ScalarValue::Float32(19.5)).unwrap();
        pset.set_value("time", 1, ScalarValue::Float64(3.0)).unwrap();
        assert_eq!(
            pset.value("temperature", 1).unwrap(),
            ScalarValue::Float32(19.5)
        );
        assert_eq!(pset.value("time", 1).unwrap(), ScalarValue::Float64(3.0));
        assert_eq!(pset.value("id", 2).unwrap(), ScalarValue::Int64(42));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let mut pset = small_set();
        let err = pset
            .set_value("temperature", 0, ScalarValue::Float64(1.0))
            .unwrap_err();
        match err {
            ParticleError::TypeMismatch { name, expected, actual } => {
                assert_eq!(name, "temperature");
                assert_eq!(expected, ElementType::Float32);
                assert_eq!(actual, ElementType::Float64);
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "cannot be reassigned")]
    fn id_is_immutable() {
        let mut pset = small_set();
        let _ = pset.set_value("id", 0, ScalarValue::Int64(99));
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let pset = small_set();
        let err = pset.gather("salinity", &[0]).unwrap_err();
        assert!(matches!(err, ParticleError::UnknownVariable { .. }));
        // Error message lists the known names.
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn gather_orders_by_request() {
        let mut pset = small_set();
        for (i, t) in [0.5f32, 1.5, 2.5].iter().enumerate() {
            pset.set_value("temperature", i, ScalarValue::Float32(*t)).unwrap();
        }
        let col = pset.gather("temperature", &[2, 0]).unwrap();
        assert_eq!(col, Column::Float32(vec![2.5, 0.5]));
        let ids = pset.gather("id", &[1, 2]).unwrap();
        assert_eq!(ids, Column::Int64(vec![7, 42]));
    }

    #[test]
    fn deleted_indices_follow_state() {
        let mut pset = small_set();
        assert!(pset.deleted_indices().is_empty());
        pset.set_state(0, StatusCode::Delete);
        pset.set_state(2, StatusCode::Delete);
        assert_eq!(pset.deleted_indices(), vec![0, 2]);
    }

    #[test]
    fn due_for_output_matches_time() {
        let mut pset = small_set();
        pset.set_value("time", 0, ScalarValue::Float64(1.0)).unwrap();
        pset.set_value("time", 1, ScalarValue::Float64(2.0)).unwrap();
        pset.set_value("time", 2, ScalarValue::Float64(1.0)).unwrap();
        assert_eq!(pset.due_for_output(1.0), vec![0, 2]);
        assert_eq!(pset.due_for_output(2.0), vec![1]);
        assert!(pset.due_for_output(9.0).is_empty());
    }

    #[test]
    fn once_written_flags_idempotent() {
        let mut pset = small_set();
        assert!(!pset.once_written(1));
        pset.set_once_written(&[1]);
        pset.set_once_written(&[1]);
        assert!(pset.once_written(1));
        pset.reset_once_written();
        assert!(!pset.once_written(1));
    }

    #[test]
    fn remove_compacts_preserving_order() {
        let mut pset = small_set();
        pset.set_value("temperature", 2, ScalarValue::Float32(9.0)).unwrap();
        pset.set_once_written(&[2]);
        pset.remove(&[1]);
        assert_eq!(pset.ids(), &[11, 42]);
        assert_eq!(
            pset.value("temperature", 1).unwrap(),
            ScalarValue::Float32(9.0)
        );
        assert!(pset.once_written(1));
        assert!(!pset.once_written(0));
    }
}
