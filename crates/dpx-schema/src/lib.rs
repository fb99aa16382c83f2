//! dpx-schema
//!
//! Declarative description of the data points a scrape is expected to carry.
//!
//! Architectural decisions:
//! - Two source shapes, one in-memory form: `independent` (each point names
//!   its own time group) and `grouped` (one time group owns a dict of fields)
//! - Structure is checked once at load; a bad reference fails before the
//!   first cycle runs
//! - Read-only after load. Per-cycle state lives in the reconcile engine
//!
//! No IO apart from [`load_schema_file`].

mod error;
mod loader;
mod types;

pub use error::SchemaError;
pub use loader::{load_schema_file, parse_schema};
pub use types::*;
