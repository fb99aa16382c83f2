use anyhow::Result;
use std::path::PathBuf;

use super::load_run_inputs;

/// `dpx check`: fail fast on bad config, schema or shots; print a summary.
pub fn run(config_paths: &[PathBuf]) -> Result<()> {
    let inputs = load_run_inputs(config_paths)?;
    let schema = &inputs.schema;

    println!("config_hash={}", inputs.loaded.config_hash);
    println!("schema_path={}", inputs.run_config.schema.path.display());
    println!("schema_shape={}", schema.shape().as_str());
    println!("points={}", schema.len());
    for id in schema.time_group_ids() {
        println!(
            "time_group={} points={}",
            id,
            schema.points_in_group(id).count()
        );
    }
    let unbound = schema.points().iter().filter(|p| !p.is_time_bound()).count();
    println!("unbound_points={}", unbound);
    println!(
        "shots={}",
        inputs.shots.as_ref().map(|s| s.len()).unwrap_or(0)
    );
    Ok(())
}
