//! `dpx replay`: drive recorded scrapes through one engine.
//!
//! Input is JSONL, one snapshot per line:
//! `{"values": {..}, "times": {..}, "at": "YYYY-MM-DD HH:MM:SS"}`. `at` is
//! the wall-clock time of the scrape; without it the local clock is used.
//! Blank lines are skipped. Output is one JSON line per emitted sample.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use dpx_reconcile::{parse_reading_time, Engine, RawSnapshot, Sample, Value, READING_TIME_FORMAT};
use dpx_schema::Tags;
use dpx_shots::Shots;

use super::load_run_inputs;

#[derive(Debug, Deserialize)]
struct SnapshotLine {
    #[serde(flatten)]
    snapshot: RawSnapshot,
    #[serde(default)]
    at: Option<String>,
}

#[derive(Debug, Serialize)]
struct SampleRecord<'a> {
    cycle: usize,
    name: &'a str,
    value: &'a Value,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Tags>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub cycles: usize,
    pub samples: usize,
}

pub fn run(config_paths: &[PathBuf], snapshots: &Path) -> Result<()> {
    let inputs = load_run_inputs(config_paths)?;
    let file = File::open(snapshots)
        .with_context(|| format!("failed to open snapshots: {}", snapshots.display()))?;

    let mut engine = Engine::new(inputs.schema);
    let stdout = io::stdout();
    let summary = replay(
        &mut engine,
        inputs.shots.as_ref(),
        BufReader::new(file),
        stdout.lock(),
    )?;

    info!(
        config_hash = %inputs.loaded.config_hash,
        cycles = summary.cycles,
        samples = summary.samples,
        "replay complete"
    );
    Ok(())
}

/// Run every snapshot in `input` through `engine` in order and write the
/// samples each cycle emits to `out`.
///
/// A line that is not a valid snapshot aborts the replay with its line
/// number; per-field conversion problems do not.
pub fn replay<R: BufRead, W: Write>(
    engine: &mut Engine,
    shots: Option<&Shots>,
    input: R,
    mut out: W,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (idx, line) in input.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.with_context(|| format!("read failed at line {lineno}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed: SnapshotLine = serde_json::from_str(&line)
            .with_context(|| format!("invalid snapshot at line {lineno}"))?;

        match parsed.at.as_deref() {
            Some(at) => {
                let now = parse_reading_time(at)
                    .with_context(|| format!("invalid 'at' at line {lineno}"))?;
                engine.reconcile_at(&parsed.snapshot, now);
            }
            None => {
                engine.reconcile(&parsed.snapshot);
            }
        }
        summary.cycles += 1;

        for sample in engine.samples() {
            let record = SampleRecord {
                cycle: summary.cycles,
                name: &sample.name,
                value: &sample.value,
                time: sample.time.format(READING_TIME_FORMAT).to_string(),
                tags: merged_tags(&sample, shots),
            };
            serde_json::to_writer(&mut out, &record).context("serialize sample failed")?;
            writeln!(out).context("write sample failed")?;
            summary.samples += 1;
        }
    }

    out.flush().context("flush output failed")?;
    Ok(summary)
}

/// Shot tags underneath, point tags on top.
fn merged_tags(sample: &Sample, shots: Option<&Shots>) -> Option<Tags> {
    let shot_tags = shots.and_then(|s| s.tags_at(sample.time));
    match (shot_tags, &sample.tags) {
        (None, None) => None,
        (shot, point) => {
            let mut tags = shot.cloned().unwrap_or_default();
            if let Some(point) = point {
                tags.extend(point.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(tags)
        }
    }
}
