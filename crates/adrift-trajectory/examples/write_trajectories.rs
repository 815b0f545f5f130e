//! Minimal driving loop: seed a small population, advect it, and write one
//! trajectory chunk per step, plus a final on-deletion flush.
//!
//! Run with `RUST_LOG=debug cargo run --example write_trajectories` to see
//! the per-chunk tracing output.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use adrift_particles::prelude::*;
use adrift_trajectory::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let ptype = ParticleType::with_position_dtype(ElementType::Float64)
        .with_variable(Variable::new("temperature", ElementType::Float32))
        .with_variable(Variable::new("release_depth", ElementType::Float32).write_once());
    let mut pset = ParticleSet::new(ptype);
    for id in 0..4i64 {
        let idx = pset.add(id);
        pset.set_value("lat", idx, ScalarValue::Float64(45.0))?;
        pset.set_value(
            "release_depth",
            idx,
            ScalarValue::Float32(-10.0 * (id + 1) as f32),
        )?;
    }

    let mut config = WriterConfig::new("adrift_demo.parquet");
    config.cadence = OutputCadence::Interval(1.0);
    let mut writer = TrajectoryWriter::new(config, &mut pset)?;
    writer.add_metadata("run_name", "demo_drift");

    for step in 0..5u32 {
        let time = f64::from(step);
        for idx in 0..pset.len() {
            // Toy advection: drift east, warm slowly.
            let lon = -30.0 + idx as f64 + 0.25 * time;
            pset.set_value("lon", idx, ScalarValue::Float64(lon))?;
            pset.set_value("temperature", idx, ScalarValue::Float32(14.0 + time as f32))?;
            pset.set_value("time", idx, ScalarValue::Float64(time))?;
        }
        if let Some(chunk) = writer.write(&mut pset, time, None)? {
            println!(
                "chunk {} -> {} ({} rows)",
                chunk.sequence,
                chunk.path.display(),
                chunk.rows
            );
        }
    }

    // Delete one particle and flush its last state on the way out.
    pset.set_state(2, StatusCode::Delete);
    if let Some(chunk) = writer.write(&mut pset, 5.0, Some(DeletionSubset::AllDeleted))? {
        println!("deletion chunk {} ({} rows)", chunk.sequence, chunk.rows);
    }
    let dead = pset.deleted_indices();
    pset.remove(&dead);

    writer.close();
    Ok(())
}
