use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;
use tracing::warn;

use crate::SchemaError;

/// Key under which the independent shape lists its time groups.
pub const TIMESTAMPS_KEY: &str = "timestamps";

/// Descriptive metadata attached to a point or a shot.
pub type Tags = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Declared types
// ---------------------------------------------------------------------------

/// Semantic type a raw scraped string is converted to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Numeric extraction: keep digits and `.`, parse as `f64`.
    Float,
    /// Text, unchanged.
    String,
    /// Any other declared name. The raw value passes through untouched.
    Other(String),
}

impl DataType {
    /// Map a declared type name, matched exactly. Unknown names (including
    /// padded ones such as `"float "`) are not an error; they pass through.
    pub fn parse(s: &str) -> Self {
        match s {
            "float" => DataType::Float,
            "string" => DataType::String,
            other => DataType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a timestamp channel shared by one or more points.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeGroupId(pub String);

impl TimeGroupId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which source layout a schema was declared in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaShape {
    /// `timestamps: [..]` plus one entry per point, each naming its own
    /// `source_time`.
    #[default]
    Independent,
    /// `{time_id: {field: type}}`: one timestamp owns a dict of fields.
    Grouped,
}

impl SchemaShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaShape::Independent => "independent",
            SchemaShape::Grouped => "grouped",
        }
    }

    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(SchemaShape::Independent),
            "grouped" => Ok(SchemaShape::Grouped),
            other => Err(SchemaError::InvalidShape(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Point declaration
// ---------------------------------------------------------------------------

/// Declaration of one scalar measurement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointSpec {
    /// Unique within a schema.
    pub name: String,
    pub data_type: DataType,
    /// Identifier as it appears in the raw scrape. Defaults to `name`.
    pub source_id: String,
    pub tags: Option<Tags>,
    /// `None`: refreshed every cycle with wall-clock time.
    pub time_id: Option<TimeGroupId>,
}

impl PointSpec {
    pub fn new<S: Into<String>>(name: S, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            source_id: name.clone(),
            name,
            data_type,
            tags: None,
            time_id: None,
        }
    }

    pub fn with_source_id<S: Into<String>>(mut self, source_id: S) -> Self {
        self.source_id = source_id.into();
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_time_id(mut self, time_id: TimeGroupId) -> Self {
        self.time_id = Some(time_id);
        self
    }

    pub fn is_time_bound(&self) -> bool {
        self.time_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Ordered collection of point declarations plus the declared time groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    shape: SchemaShape,
    time_groups: Vec<TimeGroupId>,
    points: Vec<PointSpec>,
}

impl Schema {
    /// Build and validate a schema.
    ///
    /// Fails on duplicate time groups, duplicate point names, a `time_id`
    /// that names an undeclared group, and (grouped shape only) a field
    /// whose name is also a time group id.
    pub fn new(
        shape: SchemaShape,
        time_groups: Vec<TimeGroupId>,
        points: Vec<PointSpec>,
    ) -> Result<Self, SchemaError> {
        let mut groups: BTreeSet<&TimeGroupId> = BTreeSet::new();
        for g in &time_groups {
            if !groups.insert(g) {
                return Err(SchemaError::DuplicateTimeGroup(g.0.clone()));
            }
        }

        let mut names: BTreeSet<&str> = BTreeSet::new();
        for p in &points {
            if !names.insert(p.name.as_str()) {
                return Err(SchemaError::DuplicatePoint(p.name.clone()));
            }
            if let Some(t) = &p.time_id {
                if !groups.contains(t) {
                    return Err(SchemaError::UnknownTimeGroup {
                        point: p.name.clone(),
                        time_id: t.0.clone(),
                    });
                }
            }
            if shape == SchemaShape::Grouped && groups.contains(&TimeGroupId::new(p.name.as_str()))
            {
                return Err(SchemaError::NameCollidesWithTimeGroup(p.name.clone()));
            }
        }

        warn_on_shared_source_ids(&points);

        Ok(Self {
            shape,
            time_groups,
            points,
        })
    }

    pub fn shape(&self) -> SchemaShape {
        self.shape
    }

    /// Points in declaration order.
    pub fn points(&self) -> &[PointSpec] {
        &self.points
    }

    /// Declared time group ids, unique, in declaration order.
    pub fn time_group_ids(&self) -> &[TimeGroupId] {
        &self.time_groups
    }

    pub fn declares_time_group(&self, id: &str) -> bool {
        self.time_groups.iter().any(|g| g.as_str() == id)
    }

    pub fn point(&self, name: &str) -> Option<&PointSpec> {
        self.points.iter().find(|p| p.name == name)
    }

    pub fn points_in_group<'a>(
        &'a self,
        id: &'a TimeGroupId,
    ) -> impl Iterator<Item = &'a PointSpec> + 'a {
        self.points
            .iter()
            .filter(move |p| p.time_id.as_ref() == Some(id))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The same raw identifier claimed under different time groups resolves
/// independently for each point; that is rarely intended.
fn warn_on_shared_source_ids(points: &[PointSpec]) {
    let mut claims: BTreeMap<&str, BTreeSet<Option<&str>>> = BTreeMap::new();
    for p in points {
        claims
            .entry(p.source_id.as_str())
            .or_default()
            .insert(p.time_id.as_ref().map(|t| t.as_str()));
    }
    for (source_id, groups) in claims {
        if groups.len() > 1 {
            warn!(
                source_id,
                groups = ?groups,
                "source id is claimed by points in different time groups"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tg(s: &str) -> TimeGroupId {
        TimeGroupId::new(s)
    }

    #[test]
    fn data_type_parse() {
        assert_eq!(DataType::parse("float"), DataType::Float);
        assert_eq!(DataType::parse("string"), DataType::String);
        assert_eq!(
            DataType::parse("bool"),
            DataType::Other("bool".to_string())
        );
        assert_eq!(DataType::parse("bool").as_str(), "bool");
    }

    #[test]
    fn data_type_parse_is_exact() {
        assert_eq!(
            DataType::parse("float "),
            DataType::Other("float ".to_string())
        );
        assert_eq!(
            DataType::parse("Float"),
            DataType::Other("Float".to_string())
        );
    }

    #[test]
    fn shape_parse() {
        assert_eq!(
            SchemaShape::parse("Grouped").unwrap(),
            SchemaShape::Grouped
        );
        assert_eq!(
            SchemaShape::parse("independent").unwrap(),
            SchemaShape::Independent
        );
        assert!(SchemaShape::parse("flat").is_err());
    }

    #[test]
    fn source_id_defaults_to_name() {
        let p = PointSpec::new("voltage", DataType::Float);
        assert_eq!(p.source_id, "voltage");
        assert!(!p.is_time_bound());
    }

    #[test]
    fn rejects_undeclared_time_group() {
        let err = Schema::new(
            SchemaShape::Independent,
            vec![tg("t1")],
            vec![PointSpec::new("v", DataType::Float).with_time_id(tg("t2"))],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownTimeGroup {
                point: "v".to_string(),
                time_id: "t2".to_string()
            }
        );
    }

    #[test]
    fn rejects_duplicate_time_group() {
        let err = Schema::new(SchemaShape::Independent, vec![tg("t1"), tg("t1")], vec![])
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTimeGroup("t1".to_string()));
    }

    #[test]
    fn rejects_duplicate_point() {
        let err = Schema::new(
            SchemaShape::Independent,
            vec![],
            vec![
                PointSpec::new("v", DataType::Float),
                PointSpec::new("v", DataType::String),
            ],
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicatePoint("v".to_string()));
    }

    #[test]
    fn grouped_rejects_field_named_like_group() {
        let err = Schema::new(
            SchemaShape::Grouped,
            vec![tg("t1")],
            vec![PointSpec::new("t1", DataType::Float).with_time_id(tg("t1"))],
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::NameCollidesWithTimeGroup("t1".to_string()));
    }

    #[test]
    fn shared_source_id_is_allowed() {
        let s = Schema::new(
            SchemaShape::Independent,
            vec![tg("t1")],
            vec![
                PointSpec::new("a", DataType::Float).with_source_id("raw"),
                PointSpec::new("b", DataType::Float)
                    .with_source_id("raw")
                    .with_time_id(tg("t1")),
            ],
        )
        .unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn accessors() {
        let s = Schema::new(
            SchemaShape::Independent,
            vec![tg("t1"), tg("t2")],
            vec![
                PointSpec::new("a", DataType::Float).with_time_id(tg("t1")),
                PointSpec::new("b", DataType::String),
                PointSpec::new("c", DataType::Float).with_time_id(tg("t1")),
            ],
        )
        .unwrap();

        assert!(s.declares_time_group("t2"));
        assert!(!s.declares_time_group("t3"));
        assert_eq!(s.point("b").map(|p| &p.data_type), Some(&DataType::String));

        let t1 = tg("t1");
        let names: Vec<&str> = s.points_in_group(&t1).map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
