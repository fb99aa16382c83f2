//! Command handler modules for the `dpx` binary.
//!
//! Shared loading helpers live here; command-specific logic lives in the
//! submodules. Relative paths inside the run config resolve against the
//! current working directory.

pub mod check;
pub mod replay;
pub mod shots;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::warn;

use dpx_config::{LoadedConfig, RunConfig, UnusedKeyPolicy};
use dpx_schema::Schema;
use dpx_shots::Shots;

/// Everything a run needs, loaded once up front.
pub struct RunInputs {
    pub loaded: LoadedConfig,
    pub run_config: RunConfig,
    pub schema: Schema,
    pub shots: Option<Shots>,
}

/// Load layered config, then the schema and (optional) shots it points at.
/// Any failure here aborts before the first cycle.
pub fn load_run_inputs(config_paths: &[PathBuf]) -> Result<RunInputs> {
    let loaded = dpx_config::load_layered_yaml(config_paths)?;

    let report = dpx_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(keys = ?report.unused_leaf_pointers, "config contains unused keys");
    }

    let run_config = loaded.run_config()?;

    let schema = dpx_schema::load_schema_file(&run_config.schema.path, run_config.schema.shape)
        .with_context(|| format!("schema load failed: {}", run_config.schema.path.display()))?;

    let shots = match &run_config.shots {
        Some(section) => Some(
            Shots::load(&section.path)
                .with_context(|| format!("shots load failed: {}", section.path.display()))?,
        ),
        None => None,
    };

    Ok(RunInputs {
        loaded,
        run_config,
        schema,
        shots,
    })
}
