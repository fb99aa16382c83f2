//! YAML → [`Schema`] parsing for both source shapes.
//!
//! Independent shape:
//!
//! ```yaml
//! timestamps: [reading_time]
//! voltage:
//!   data_type: float
//!   source_id: "PS1 Voltage"   # optional, defaults to the key
//!   source_time: reading_time  # optional
//!   tags: {unit: V}            # optional
//! ```
//!
//! Grouped shape:
//!
//! ```yaml
//! reading_time:
//!   voltage: float
//!   status: string
//! status_time:
//!   status: string     # loaded as `reading_time.status` and `status_time.status`
//! ```
//!
//! Declaration order is preserved.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::{
    DataType, PointSpec, Schema, SchemaError, SchemaShape, Tags, TimeGroupId, TIMESTAMPS_KEY,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPoint {
    data_type: String,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    tags: Option<Mapping>,
    #[serde(default)]
    source_time: Option<String>,
}

/// Parse a schema document in the given shape.
pub fn parse_schema(yaml: &str, shape: SchemaShape) -> Result<Schema, SchemaError> {
    let doc: Value =
        serde_yaml::from_str(yaml).map_err(|e| SchemaError::InvalidYaml(e.to_string()))?;
    let map = match doc {
        Value::Mapping(m) => m,
        _ => return Err(SchemaError::NotAMapping),
    };

    match shape {
        SchemaShape::Independent => parse_independent(map),
        SchemaShape::Grouped => parse_grouped(map),
    }
}

/// Read and parse a schema file.
pub fn load_schema_file<P: AsRef<Path>>(path: P, shape: SchemaShape) -> Result<Schema, SchemaError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| SchemaError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_schema(&raw, shape)
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

fn parse_independent(map: Mapping) -> Result<Schema, SchemaError> {
    let mut time_groups: Vec<TimeGroupId> = Vec::new();
    let mut points: Vec<PointSpec> = Vec::new();

    for (k, v) in map {
        let key = key_str(&k)?;
        if key == TIMESTAMPS_KEY {
            let ids: Vec<String> = serde_yaml::from_value(v)
                .map_err(|e| SchemaError::InvalidTimestamps(e.to_string()))?;
            time_groups.extend(ids.into_iter().map(TimeGroupId::new));
            continue;
        }
        points.push(parse_point(key, v)?);
    }

    Schema::new(SchemaShape::Independent, time_groups, points)
}

/// A field declared under more than one group is named `{group}.{field}` in
/// each of them; its `source_id` stays the bare field.
fn parse_grouped(map: Mapping) -> Result<Schema, SchemaError> {
    let mut groups: Vec<(String, Mapping)> = Vec::new();
    for (k, v) in map {
        let group = key_str(&k)?;
        match v {
            Value::Mapping(m) => groups.push((group, m)),
            other => {
                return Err(SchemaError::InvalidGroup {
                    group,
                    reason: format!("expected a mapping of field -> type, got {}", kind(&other)),
                })
            }
        }
    }

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for (_, fields) in &groups {
        for fk in fields.keys() {
            *seen.entry(key_str(fk)?).or_default() += 1;
        }
    }

    let mut time_groups: Vec<TimeGroupId> = Vec::new();
    let mut points: Vec<PointSpec> = Vec::new();
    for (group, fields) in groups {
        let id = TimeGroupId::new(group.as_str());
        for (fk, fv) in fields {
            let field = key_str(&fk)?;
            let declared = match fv {
                Value::String(s) => s,
                other => {
                    return Err(SchemaError::InvalidPoint {
                        name: field,
                        reason: format!("declared type must be a string, got {}", kind(&other)),
                    })
                }
            };
            let name = if seen.get(&field).copied().unwrap_or(0) > 1 {
                format!("{group}.{field}")
            } else {
                field.clone()
            };
            points.push(
                PointSpec::new(name, DataType::parse(&declared))
                    .with_source_id(field)
                    .with_time_id(id.clone()),
            );
        }
        time_groups.push(id);
    }

    Schema::new(SchemaShape::Grouped, time_groups, points)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_point(name: String, v: Value) -> Result<PointSpec, SchemaError> {
    let raw: RawPoint = serde_yaml::from_value(v).map_err(|e| SchemaError::InvalidPoint {
        name: name.clone(),
        reason: e.to_string(),
    })?;

    let tags = match raw.tags {
        Some(m) => Some(parse_tags(&name, m)?),
        None => None,
    };

    let mut spec = PointSpec::new(name, DataType::parse(&raw.data_type));
    if let Some(source_id) = raw.source_id {
        spec.source_id = source_id;
    }
    spec.tags = tags;
    spec.time_id = raw.source_time.map(TimeGroupId::new);
    Ok(spec)
}

fn parse_tags(point: &str, m: Mapping) -> Result<Tags, SchemaError> {
    let mut tags = Tags::new();
    for (k, v) in m {
        let key = key_str(&k)?;
        let value = match v {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(SchemaError::InvalidTag {
                    point: point.to_string(),
                    key,
                })
            }
        };
        tags.insert(key, value);
    }
    Ok(tags)
}

fn key_str(k: &Value) -> Result<String, SchemaError> {
    match k {
        Value::String(s) => Ok(s.clone()),
        other => Err(SchemaError::NonStringKey(kind(other).to_string())),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEPENDENT: &str = r#"
timestamps:
  - reading_time
  - status_time
voltage:
  data_type: float
  source_id: "PS1 Voltage"
  source_time: reading_time
  tags:
    unit: V
    channel: 1
mode:
  data_type: string
  source_time: status_time
uptime:
  data_type: counter
"#;

    #[test]
    fn independent_shape_preserves_order_and_fields() {
        let s = parse_schema(INDEPENDENT, SchemaShape::Independent).unwrap();
        assert_eq!(s.shape(), SchemaShape::Independent);
        assert_eq!(
            s.time_group_ids(),
            &[TimeGroupId::new("reading_time"), TimeGroupId::new("status_time")]
        );

        let names: Vec<&str> = s.points().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["voltage", "mode", "uptime"]);

        let v = &s.points()[0];
        assert_eq!(v.source_id, "PS1 Voltage");
        assert_eq!(v.data_type, DataType::Float);
        assert_eq!(v.time_id, Some(TimeGroupId::new("reading_time")));
        let tags = v.tags.as_ref().unwrap();
        assert_eq!(tags.get("unit").map(String::as_str), Some("V"));
        assert_eq!(tags.get("channel").map(String::as_str), Some("1"));

        let u = &s.points()[2];
        assert_eq!(u.source_id, "uptime");
        assert_eq!(u.data_type, DataType::Other("counter".to_string()));
        assert!(u.time_id.is_none());
        assert!(u.tags.is_none());
    }

    #[test]
    fn timestamps_may_follow_points() {
        let yaml = "a:\n  data_type: float\n  source_time: t1\ntimestamps: [t1]\n";
        let s = parse_schema(yaml, SchemaShape::Independent).unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn independent_rejects_undeclared_source_time() {
        let yaml = "timestamps: [t1]\na:\n  data_type: float\n  source_time: t2\n";
        let err = parse_schema(yaml, SchemaShape::Independent).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTimeGroup { .. }));
    }

    #[test]
    fn independent_rejects_missing_data_type() {
        let yaml = "a:\n  source_id: x\n";
        let err = parse_schema(yaml, SchemaShape::Independent).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPoint { ref name, .. } if name == "a"));
    }

    #[test]
    fn independent_rejects_unknown_field() {
        let yaml = "a:\n  data_type: float\n  sauce_id: x\n";
        let err = parse_schema(yaml, SchemaShape::Independent).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPoint { .. }));
    }

    #[test]
    fn rejects_bad_timestamps() {
        let err = parse_schema("timestamps: t1\n", SchemaShape::Independent).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidTimestamps(_)));
    }

    #[test]
    fn rejects_nested_tag() {
        let yaml = "a:\n  data_type: float\n  tags:\n    unit: [V]\n";
        let err = parse_schema(yaml, SchemaShape::Independent).unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidTag {
                point: "a".to_string(),
                key: "unit".to_string()
            }
        );
    }

    #[test]
    fn rejects_non_mapping_document() {
        let err = parse_schema("- a\n- b\n", SchemaShape::Independent).unwrap_err();
        assert_eq!(err, SchemaError::NotAMapping);
    }

    #[test]
    fn rejects_invalid_yaml() {
        let err = parse_schema("a: [\n", SchemaShape::Independent).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidYaml(_)));
    }

    #[test]
    fn grouped_shape() {
        let yaml = "t1:\n  voltage: float\n  status: string\nt2:\n  flow: float\n";
        let s = parse_schema(yaml, SchemaShape::Grouped).unwrap();
        assert_eq!(s.shape(), SchemaShape::Grouped);
        assert_eq!(
            s.time_group_ids(),
            &[TimeGroupId::new("t1"), TimeGroupId::new("t2")]
        );
        let flow = s.point("flow").unwrap();
        assert_eq!(flow.source_id, "flow");
        assert_eq!(flow.time_id, Some(TimeGroupId::new("t2")));
        assert_eq!(s.points_in_group(&TimeGroupId::new("t1")).count(), 2);
    }

    #[test]
    fn grouped_rejects_scalar_group() {
        let err = parse_schema("t1: float\n", SchemaShape::Grouped).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidGroup { ref group, .. } if group == "t1"));
    }

    #[test]
    fn grouped_field_in_two_groups_is_qualified() {
        let yaml = "t1:\n  voltage: float\n  mode: string\nt2:\n  voltage: float\n";
        let s = parse_schema(yaml, SchemaShape::Grouped).unwrap();

        let names: Vec<&str> = s.points().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["t1.voltage", "mode", "t2.voltage"]);

        let v2 = s.point("t2.voltage").unwrap();
        assert_eq!(v2.source_id, "voltage");
        assert_eq!(v2.time_id, Some(TimeGroupId::new("t2")));
        assert_eq!(s.point("t1.voltage").unwrap().source_id, "voltage");
        assert!(s.point("voltage").is_none());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_schema_file("/nonexistent/dpx/schema.yaml", SchemaShape::Independent)
            .unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));
    }
}
