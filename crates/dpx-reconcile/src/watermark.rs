//! Per-time-group reading-time watermark.
//!
//! # Purpose
//!
//! Instruments re-serve the same reading until they take a new one. Each time
//! group keeps the last reading time it accepted, and its points are only
//! re-read when a scrape presents a different one.
//!
//! # Invariants
//!
//! - **Parsed and different advances**: any successfully parsed time that is
//!   not equal to the watermark replaces it, including an earlier one.
//! - **Everything else is "no update"**: an unchanged, unparsable or absent
//!   time leaves the watermark untouched.
//! - **Idempotent re-scrapes**: presenting the same raw time twice advances
//!   at most once.

use chrono::NaiveDateTime;

use crate::coerce::{parse_reading_time, CoerceError};

// ---------------------------------------------------------------------------
// Advance decision
// ---------------------------------------------------------------------------

/// Result of checking a raw reading time against a watermark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeAdvance {
    /// Different reading. On `accept`, the watermark has moved to `current`.
    Advanced {
        previous: Option<NaiveDateTime>,
        current: NaiveDateTime,
    },
    /// Same reading time as the watermark.
    Unchanged(NaiveDateTime),
    /// The raw time did not parse.
    Unparsable { raw: String, error: CoerceError },
    /// The scrape carried no time for this group.
    Absent,
}

impl TimeAdvance {
    pub fn is_advanced(&self) -> bool {
        matches!(self, TimeAdvance::Advanced { .. })
    }

    /// Advanced to a time earlier than the previous watermark.
    pub fn moved_backwards(&self) -> bool {
        matches!(
            self,
            TimeAdvance::Advanced { previous: Some(previous), current } if current < previous
        )
    }
}

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Last accepted reading time of one time group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeGroupWatermark {
    last: Option<NaiveDateTime>,
}

impl TimeGroupWatermark {
    /// Empty watermark: the first parsable time always advances it.
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Check without moving the watermark.
    pub fn check(&self, raw: Option<&str>) -> TimeAdvance {
        let Some(raw) = raw else {
            return TimeAdvance::Absent;
        };

        let current = match parse_reading_time(raw) {
            Ok(t) => t,
            Err(error) => {
                return TimeAdvance::Unparsable {
                    raw: raw.to_string(),
                    error,
                }
            }
        };

        match self.last {
            Some(last) if current == last => TimeAdvance::Unchanged(last),
            previous => TimeAdvance::Advanced { previous, current },
        }
    }

    /// Check and, if advanced, move the watermark.
    pub fn accept(&mut self, raw: Option<&str>) -> TimeAdvance {
        let result = self.check(raw);
        if let TimeAdvance::Advanced { current, .. } = &result {
            self.last = Some(*current);
        }
        result
    }

    /// Last accepted reading time, `None` before the first advance.
    pub fn last(&self) -> Option<NaiveDateTime> {
        self.last
    }

    pub fn has_accepted_any(&self) -> bool {
        self.last.is_some()
    }
}
