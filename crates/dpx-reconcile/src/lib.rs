//! dpx-reconcile
//!
//! Reconciles scraped key/value snapshots against a [`dpx_schema::Schema`].
//!
//! Architectural decisions:
//! - Staleness is tracked per time group; points bound to a group update only
//!   in the cycle its reading time advances
//! - Points without a group update every cycle, stamped with the caller's clock
//! - A field that fails conversion becomes `None` for that cycle only and never
//!   blocks the rest of the schema
//! - One engine owns the state for one schema; callers serialize cycles
//!
//! Pure logic apart from `tracing` diagnostics. Scraping and persistence are
//! the caller's business.

pub mod coerce;
mod engine;
mod types;
mod watermark;

pub use coerce::{coerce, parse_reading_time, to_float, CoerceError, READING_TIME_FORMAT};
pub use engine::Engine;
pub use types::*;
pub use watermark::{TimeAdvance, TimeGroupWatermark};
