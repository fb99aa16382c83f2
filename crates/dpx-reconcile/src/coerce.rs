//! Raw scraped string → typed value conversion.
//!
//! Pure functions; nothing here logs. Callers decide how to react to a
//! [`CoerceError`].

use std::fmt;

use chrono::NaiveDateTime;
use dpx_schema::DataType;

use crate::Value;

/// Wire format of instrument reading times.
pub const READING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A raw value that could not be converted to its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    /// Nothing numeric survived stripping (e.g. `"N/A"`).
    EmptyNumeric { raw: String },
    /// The stripped remainder is not a number (e.g. `"1.2.3"`).
    InvalidNumeric { raw: String, stripped: String },
    /// A reading time did not match [`READING_TIME_FORMAT`].
    InvalidDateTime { raw: String, reason: String },
}

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoerceError::EmptyNumeric { raw } => {
                write!(f, "'{raw}' contains no numeric characters")
            }
            CoerceError::InvalidNumeric { raw, stripped } => {
                write!(f, "'{raw}' could not be parsed as a number (stripped: '{stripped}')")
            }
            CoerceError::InvalidDateTime { raw, reason } => {
                write!(
                    f,
                    "'{raw}' is not a reading time ({READING_TIME_FORMAT}): {reason}"
                )
            }
        }
    }
}

impl std::error::Error for CoerceError {}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert `raw` to `data_type`.
///
/// - `float`: see [`to_float`]
/// - `string`: unchanged text
/// - anything else: opaque passthrough, never an error
pub fn coerce(raw: &str, data_type: &DataType) -> Result<Value, CoerceError> {
    match data_type {
        DataType::Float => to_float(raw).map(Value::Float),
        DataType::String => Ok(Value::Text(raw.to_string())),
        DataType::Other(_) => Ok(Value::Raw(raw.to_string())),
    }
}

/// Numeric extraction.
///
/// Every character that is not an ASCII digit or `.` is dropped, then the
/// remainder is parsed. Units and signs are stripped along with everything
/// else: `"12.3 V"` → `12.3`, `"-4"` → `4`.
pub fn to_float(raw: &str) -> Result<f64, CoerceError> {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if stripped.is_empty() {
        return Err(CoerceError::EmptyNumeric {
            raw: raw.to_string(),
        });
    }

    stripped
        .parse::<f64>()
        .map_err(|_| CoerceError::InvalidNumeric {
            raw: raw.to_string(),
            stripped,
        })
}

/// Parse an instrument reading time (`YYYY-MM-DD HH:MM:SS`, no zone).
pub fn parse_reading_time(raw: &str) -> Result<NaiveDateTime, CoerceError> {
    NaiveDateTime::parse_from_str(raw, READING_TIME_FORMAT).map_err(|e| {
        CoerceError::InvalidDateTime {
            raw: raw.to_string(),
            reason: e.to_string(),
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
