//! Property tests for the SoA particle collection.
//!
//! Random add/remove/set sequences are checked against a simple
//! map-based model: identity storage and every column must stay aligned
//! through arbitrary churn.

use std::collections::BTreeMap;

use proptest::prelude::*;

use adrift_particles::prelude::*;

#[derive(Debug, Clone)]
enum SetOp {
    Add,
    Remove(usize),
    SetTemperature(usize, i32),
}

fn set_op_strategy() -> impl Strategy<Value = SetOp> {
    prop_oneof![
        3 => Just(SetOp::Add),
        1 => (0..100usize).prop_map(SetOp::Remove),
        2 => (0..100usize, -1_000_000i32..1_000_000i32)
            .prop_map(|(i, v)| SetOp::SetTemperature(i, v)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn columns_stay_aligned_under_churn(ops in prop::collection::vec(set_op_strategy(), 1..60)) {
        let ptype = ParticleType::new()
            .with_variable(Variable::new("temperature", ElementType::Float32));
        let mut pset = ParticleSet::new(ptype);

        let mut next_id: i64 = 0;
        // Model: identity -> temperature.
        let mut model: BTreeMap<i64, f32> = BTreeMap::new();
        // Model: storage order of identities.
        let mut order: Vec<i64> = Vec::new();

        for op in ops {
            match op {
                SetOp::Add => {
                    pset.add(next_id);
                    model.insert(next_id, 0.0);
                    order.push(next_id);
                    next_id += 1;
                }
                SetOp::Remove(k) => {
                    if !pset.is_empty() {
                        let idx = k % pset.len();
                        let id = order.remove(idx);
                        model.remove(&id);
                        pset.remove(&[idx]);
                    }
                }
                SetOp::SetTemperature(k, raw) => {
                    if !pset.is_empty() {
                        let idx = k % pset.len();
                        let value = raw as f32 * 0.01;
                        pset.set_value("temperature", idx, ScalarValue::Float32(value)).unwrap();
                        model.insert(order[idx], value);
                    }
                }
            }

            // Identity order and length agree with the model.
            prop_assert_eq!(pset.ids(), order.as_slice());
            prop_assert_eq!(pset.len(), model.len());
        }

        // Every value survives churn, addressed through its identity.
        for (idx, id) in order.iter().enumerate() {
            prop_assert_eq!(
                pset.value("temperature", idx).unwrap(),
                ScalarValue::Float32(model[id])
            );
        }

        // Gathering all indices reproduces identity storage.
        let all: Vec<usize> = (0..pset.len()).collect();
        prop_assert_eq!(
            pset.gather("id", &all).unwrap(),
            Column::Int64(order.clone())
        );
    }
}
