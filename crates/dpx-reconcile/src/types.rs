use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;
use dpx_schema::{PointSpec, Tags, TimeGroupId};
use serde::{Deserialize, Serialize};

use crate::CoerceError;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A coerced reading.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Float(f64),
    Text(String),
    /// Passthrough for undeclared/unknown types.
    Raw(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Raw(s) => Some(s.as_str()),
            Value::Float(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) | Value::Raw(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One scrape: identifier → raw value, and time group id → raw reading time.
///
/// Lives for one reconcile call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub times: BTreeMap<String, String>,
}

impl RawSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, id: impl Into<String>, raw: impl Into<String>) -> Self {
        self.values.insert(id.into(), raw.into());
        self
    }

    pub fn with_time(mut self, id: impl Into<String>, raw: impl Into<String>) -> Self {
        self.times.insert(id.into(), raw.into());
        self
    }

    pub fn value(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn time(&self, id: &str) -> Option<&str> {
        self.times.get(id).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Per-point state
// ---------------------------------------------------------------------------

/// A declared point plus its current value and the time attributed to it.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPoint {
    spec: PointSpec,
    pub(crate) value: Option<Value>,
    pub(crate) time: Option<NaiveDateTime>,
}

impl DataPoint {
    pub fn new(spec: PointSpec) -> Self {
        Self {
            spec,
            value: None,
            time: None,
        }
    }

    pub fn spec(&self) -> &PointSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// `None` means "do not persist": not found, not convertible, or never
    /// updated. Never read it as zero or empty.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn time(&self) -> Option<NaiveDateTime> {
        self.time
    }
}

/// What happened to one point during a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointOutcome {
    /// Fresh value coerced and stored, time stamped.
    Updated,
    /// Its time group did not advance; value and time untouched.
    Unchanged,
    /// Eligible but its source id was absent from the snapshot.
    Missing,
    /// Eligible and present, but the raw value failed conversion.
    ConversionFailed { raw: String, error: CoerceError },
}

impl PointOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, PointOutcome::Updated)
    }
}

/// Result of one reconcile call.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    /// Wall-clock time of the cycle, attributed to unbound points.
    pub now: NaiveDateTime,
    /// Time groups whose reading time advanced this cycle.
    pub advanced: BTreeSet<TimeGroupId>,
    /// `(point name, outcome)` in schema order.
    pub outcomes: Vec<(String, PointOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, name: &str) -> Option<&PointOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }

    pub fn is_advanced(&self, id: &str) -> bool {
        self.advanced.iter().any(|g| g.as_str() == id)
    }

    pub fn updated_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_updated()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &CoerceError)> {
        self.outcomes.iter().filter_map(|(n, o)| match o {
            PointOutcome::ConversionFailed { error, .. } => Some((n.as_str(), error)),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A value that is new since the last observation, ready for a time-series
/// writer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub name: String,
    pub value: Value,
    pub time: NaiveDateTime,
    pub tags: Option<Tags>,
}

/// Legacy per-timestamp view: the group's time and its points' current
/// values (points with no value are left out).
#[derive(Clone, Debug, PartialEq)]
pub struct GroupView {
    pub id: TimeGroupId,
    pub time: Option<NaiveDateTime>,
    pub values: BTreeMap<String, Value>,
}
