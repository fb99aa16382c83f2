use std::fmt;

/// Configuration errors raised while building a [`crate::Schema`].
///
/// All of these are fatal: a schema that fails to load never reaches the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema file could not be read.
    Io { path: String, message: String },
    /// The document is not valid YAML.
    InvalidYaml(String),
    /// The top level of the document is not a mapping.
    NotAMapping,
    /// A mapping key is not a string.
    NonStringKey(String),
    /// The `timestamps` entry is not a list of strings.
    InvalidTimestamps(String),
    /// A point declaration is malformed.
    InvalidPoint { name: String, reason: String },
    /// A tag value is not a scalar.
    InvalidTag { point: String, key: String },
    /// A grouped-shape entry is not a mapping of field -> type.
    InvalidGroup { group: String, reason: String },
    /// The same time group id is declared twice.
    DuplicateTimeGroup(String),
    /// Two points share a name.
    DuplicatePoint(String),
    /// A point names a time group that was never declared.
    UnknownTimeGroup { point: String, time_id: String },
    /// Grouped shape: a field name is also a time group id.
    NameCollidesWithTimeGroup(String),
    /// Unrecognised schema shape string.
    InvalidShape(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::Io { path, message } => {
                write!(f, "failed to read schema file '{path}': {message}")
            }
            SchemaError::InvalidYaml(msg) => write!(f, "schema is not valid yaml: {msg}"),
            SchemaError::NotAMapping => write!(f, "schema top level must be a mapping"),
            SchemaError::NonStringKey(k) => write!(f, "schema key must be a string, got {k}"),
            SchemaError::InvalidTimestamps(msg) => {
                write!(f, "'timestamps' must be a list of strings: {msg}")
            }
            SchemaError::InvalidPoint { name, reason } => {
                write!(f, "data point '{name}' is invalid: {reason}")
            }
            SchemaError::InvalidTag { point, key } => {
                write!(f, "data point '{point}': tag '{key}' must be a scalar")
            }
            SchemaError::InvalidGroup { group, reason } => {
                write!(f, "time group '{group}' is invalid: {reason}")
            }
            SchemaError::DuplicateTimeGroup(id) => {
                write!(f, "time group '{id}' is declared more than once")
            }
            SchemaError::DuplicatePoint(name) => {
                write!(f, "data point '{name}' is declared more than once")
            }
            SchemaError::UnknownTimeGroup { point, time_id } => write!(
                f,
                "data point '{point}' references undeclared time group '{time_id}'"
            ),
            SchemaError::NameCollidesWithTimeGroup(name) => write!(
                f,
                "field '{name}' has the same id as a time group"
            ),
            SchemaError::InvalidShape(s) => write!(
                f,
                "invalid schema shape '{s}'. expected one of: independent | grouped"
            ),
        }
    }
}

impl std::error::Error for SchemaError {}
