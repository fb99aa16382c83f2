//! dpx-shots
//!
//! Shots are time-bounded experiment runs carrying metadata tags. Samples are
//! attributed to the shot whose window contains their time.
//!
//! Ordering is by start time only, through the explicit [`compare_by_start`]
//! comparator. `Shot` deliberately implements no `Ord`/`PartialEq`: two
//! shots with the same start compare equal under that comparator even when
//! their stop times or tags differ. Shots are expected to be disjoint.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;

/// Wire format of shot bounds (UTC, literal `Z`).
pub const SHOT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub type ShotTags = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShotError {
    Io { path: String, message: String },
    /// The document does not have the expected structure.
    Malformed(String),
    InvalidTime { field: &'static str, raw: String },
    /// A tag value is not a scalar.
    InvalidTag(String),
    StopBeforeStart {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },
}

impl fmt::Display for ShotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShotError::Io { path, message } => {
                write!(f, "failed to read shot file '{path}': {message}")
            }
            ShotError::Malformed(msg) => write!(f, "malformed shot document: {msg}"),
            ShotError::InvalidTime { field, raw } => write!(
                f,
                "shot {field} time '{raw}' does not match {SHOT_TIME_FORMAT}"
            ),
            ShotError::InvalidTag(key) => write!(f, "shot tag '{key}' must be a scalar"),
            ShotError::StopBeforeStart { start, stop } => {
                write!(f, "shot stop {stop} is before start {start}")
            }
        }
    }
}

impl std::error::Error for ShotError {}

// ---------------------------------------------------------------------------
// Shot
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Shot {
    tags: ShotTags,
    start: NaiveDateTime,
    stop: NaiveDateTime,
}

impl Shot {
    pub fn new(tags: ShotTags, start: NaiveDateTime, stop: NaiveDateTime) -> Result<Self, ShotError> {
        if stop < start {
            return Err(ShotError::StopBeforeStart { start, stop });
        }
        Ok(Self { tags, start, stop })
    }

    /// Build from wire-format bounds.
    pub fn parse(tags: ShotTags, start: &str, stop: &str) -> Result<Self, ShotError> {
        let start = parse_shot_time(start, "start")?;
        let stop = parse_shot_time(stop, "stop")?;
        Self::new(tags, start, stop)
    }

    /// Single-shot document: `{tags: {...}, time: {start, stop}}`.
    pub fn from_yaml_str(doc: &str) -> Result<Self, ShotError> {
        let raw: RawShot =
            serde_yaml::from_str(doc).map_err(|e| ShotError::Malformed(e.to_string()))?;
        raw.into_shot()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ShotError> {
        Self::from_yaml_str(&read(path.as_ref())?)
    }

    pub fn tags(&self) -> &ShotTags {
        &self.tags
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn stop(&self) -> NaiveDateTime {
        self.stop
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.stop
    }
}

/// The one ordering shots have: start time, nothing else.
pub fn compare_by_start(a: &Shot, b: &Shot) -> Ordering {
    a.start.cmp(&b.start)
}

pub fn parse_shot_time(raw: &str, field: &'static str) -> Result<NaiveDateTime, ShotError> {
    NaiveDateTime::parse_from_str(raw, SHOT_TIME_FORMAT).map_err(|_| ShotError::InvalidTime {
        field,
        raw: raw.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Shots
// ---------------------------------------------------------------------------

/// Shots sorted by start time.
#[derive(Clone, Debug, Default)]
pub struct Shots {
    shots: Vec<Shot>,
}

impl Shots {
    /// Sorts with [`compare_by_start`]; the sort is stable, so shots with
    /// equal starts keep their input order.
    pub fn new(mut shots: Vec<Shot>) -> Self {
        shots.sort_by(compare_by_start);
        Self { shots }
    }

    /// Document with a top-level `shots:` list of single-shot entries.
    pub fn from_yaml_str(doc: &str) -> Result<Self, ShotError> {
        let raw: RawShots =
            serde_yaml::from_str(doc).map_err(|e| ShotError::Malformed(e.to_string()))?;
        let shots = raw
            .shots
            .into_iter()
            .map(RawShot::into_shot)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(shots))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ShotError> {
        Self::from_yaml_str(&read(path.as_ref())?)
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shot> {
        self.shots.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Shot> {
        self.shots.get(index)
    }

    /// The most recently started shot whose window contains `t`.
    pub fn shot_at(&self, t: NaiveDateTime) -> Option<&Shot> {
        let end = self.shots.partition_point(|s| s.start <= t);
        self.shots[..end].iter().rev().find(|s| s.contains(t))
    }

    pub fn tags_at(&self, t: NaiveDateTime) -> Option<&ShotTags> {
        self.shot_at(t).map(Shot::tags)
    }
}

impl<'a> IntoIterator for &'a Shots {
    type Item = &'a Shot;
    type IntoIter = std::slice::Iter<'a, Shot>;

    fn into_iter(self) -> Self::IntoIter {
        self.shots.iter()
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawShots {
    shots: Vec<RawShot>,
}

#[derive(Debug, Deserialize)]
struct RawShot {
    #[serde(default)]
    tags: Option<serde_yaml::Mapping>,
    time: RawWindow,
}

#[derive(Debug, Deserialize)]
struct RawWindow {
    start: String,
    stop: String,
}

impl RawShot {
    fn into_shot(self) -> Result<Shot, ShotError> {
        let tags = match self.tags {
            Some(m) => scalar_tags(m)?,
            None => ShotTags::new(),
        };
        Shot::parse(tags, &self.time.start, &self.time.stop)
    }
}

fn scalar_tags(m: serde_yaml::Mapping) -> Result<ShotTags, ShotError> {
    use serde_yaml::Value;

    let mut tags = ShotTags::new();
    for (k, v) in m {
        let key = match k {
            Value::String(s) => s,
            other => return Err(ShotError::InvalidTag(format!("{other:?}"))),
        };
        let value = match v {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(ShotError::InvalidTag(key)),
        };
        tags.insert(key, value);
    }
    Ok(tags)
}

fn read(path: &Path) -> Result<String, ShotError> {
    fs::read_to_string(path).map_err(|e| ShotError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
