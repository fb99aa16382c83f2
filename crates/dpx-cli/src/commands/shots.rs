use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;

use dpx_shots::{Shots, SHOT_TIME_FORMAT};

/// `dpx shots`: one JSON line per shot, sorted by start time.
pub fn run(file: &Path) -> Result<()> {
    let shots = Shots::load(file).with_context(|| format!("shots load failed: {}", file.display()))?;

    for shot in &shots {
        let line = json!({
            "start": shot.start().format(SHOT_TIME_FORMAT).to_string(),
            "stop": shot.stop().format(SHOT_TIME_FORMAT).to_string(),
            "tags": shot.tags(),
        });
        println!("{}", line);
    }
    Ok(())
}
