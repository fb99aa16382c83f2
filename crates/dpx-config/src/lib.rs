//! dpx-config
//!
//! Layered YAML run configuration.
//!
//! Documents are deep-merged in order (later overrides earlier), converted to
//! JSON, and hashed so a replay can be tied to the exact configuration that
//! produced it. [`RunConfig`] is the typed view the binary reads.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use dpx_schema::SchemaShape;

// ---------------------------------------------------------------------------
// Typed run configuration
// ---------------------------------------------------------------------------

/// What one `dpx` run reads:
///
/// ```yaml
/// schema:
///   path: measurements.yaml
///   shape: independent   # or grouped
/// shots:
///   path: shots.yaml     # optional
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    pub schema: SchemaSection,
    #[serde(default)]
    pub shots: Option<ShotsSection>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchemaSection {
    pub path: PathBuf,
    #[serde(default)]
    pub shape: SchemaShape,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShotsSection {
    pub path: PathBuf,
}

impl RunConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("invalid run config")
    }
}

/// JSON-pointer prefixes [`RunConfig`] consumes. Leaves outside these are
/// reported by [`report_unused_keys`].
pub const CONSUMED_POINTERS: &[&str] = &["/schema/path", "/schema/shape", "/shots/path"];

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Minimal set of unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// List config leaves nothing reads. A typo such as `/schema/shpae` shows up
/// here instead of silently falling back to a default.
///
/// `Fail` errors when unused keys exist; `Warn` always returns the report.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut leaves: Vec<String> = Vec::new();
    leaf_pointers(config_json, String::new(), &mut leaves);

    let mut unused: Vec<String> = leaves.into_iter().filter(|lp| !is_consumed(lp)).collect();
    unused.sort();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected: {:?}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers
        );
    }

    Ok(report)
}

/// `/schema/path` consumes itself and anything below it, never `/schema/pathx`.
fn is_consumed(leaf: &str) -> bool {
    CONSUMED_POINTERS.iter().any(|c| {
        leaf.strip_prefix(c)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Scalars, nulls and empty containers are leaves. Keys are escaped per
/// RFC 6901.
fn leaf_pointers(v: &Value, at: String, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, child) in map {
                let token = k.replace('~', "~0").replace('/', "~1");
                leaf_pointers(child, format!("{at}/{token}"), out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                leaf_pointers(child, format!("{at}/{i}"), out);
            }
        }
        _ if at.is_empty() => out.push("/".to_string()),
        _ => out.push(at),
    }
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    pub fn run_config(&self) -> Result<RunConfig> {
        RunConfig::from_json(&self.config_json)
    }
}

/// Read and merge YAML files in order; the last file wins on conflicts.
pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    if paths.is_empty() {
        bail!("at least one config path is required");
    }

    let docs = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {}", p.display()))
        })
        .collect::<Result<Vec<String>>>()?;

    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    // Earlier docs are base, later docs override.
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json::Map is key-sorted without the preserve_order feature, so
    // equal configs serialize identically whatever the layer order.
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "schema:\n  path: measurements.yaml\n";
    const OVERRIDE: &str = "schema:\n  shape: grouped\nshots:\n  path: shots.yaml\n";

    #[test]
    fn later_layers_override_and_merge() {
        let loaded = load_layered_yaml_from_strings(&[BASE, OVERRIDE]).unwrap();
        let rc = loaded.run_config().unwrap();
        assert_eq!(rc.schema.path, PathBuf::from("measurements.yaml"));
        assert_eq!(rc.schema.shape, SchemaShape::Grouped);
        assert_eq!(
            rc.shots.map(|s| s.path),
            Some(PathBuf::from("shots.yaml"))
        );
    }

    #[test]
    fn shape_defaults_to_independent_and_shots_optional() {
        let rc = load_layered_yaml_from_strings(&[BASE])
            .unwrap()
            .run_config()
            .unwrap();
        assert_eq!(rc.schema.shape, SchemaShape::Independent);
        assert!(rc.shots.is_none());
    }

    #[test]
    fn missing_schema_path_is_an_error() {
        let loaded = load_layered_yaml_from_strings(&["schema:\n  shape: grouped\n"]).unwrap();
        assert!(loaded.run_config().is_err());
    }

    #[test]
    fn bad_shape_is_an_error() {
        let loaded =
            load_layered_yaml_from_strings(&["schema:\n  path: a.yaml\n  shape: nested\n"]).unwrap();
        assert!(loaded.run_config().is_err());
    }

    #[test]
    fn hash_is_stable_across_equivalent_layering() {
        let a = load_layered_yaml_from_strings(&[BASE, OVERRIDE]).unwrap();
        let b = load_layered_yaml_from_strings(&[
            "shots:\n  path: shots.yaml\nschema:\n  shape: grouped\n  path: measurements.yaml\n",
        ])
        .unwrap();
        assert_eq!(a.config_hash, b.config_hash);
        assert_eq!(a.config_hash.len(), 64);
    }

    #[test]
    fn unused_keys_reported() {
        let loaded =
            load_layered_yaml_from_strings(&[BASE, "schema:\n  shpae: grouped\nextra: 1\n"]).unwrap();
        let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
        assert_eq!(
            report.unused_leaf_pointers,
            vec!["/extra".to_string(), "/schema/shpae".to_string()]
        );
        assert!(report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).is_err());
    }

    #[test]
    fn clean_config_has_no_unused_keys() {
        let loaded = load_layered_yaml_from_strings(&[BASE, OVERRIDE]).unwrap();
        let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn consumed_pointer_boundaries() {
        assert!(is_consumed("/schema/path"));
        assert!(is_consumed("/shots/path"));
        assert!(!is_consumed("/schema/pathx"));
        assert!(!is_consumed("/schema"));
    }

    #[test]
    fn leaves_are_escaped_and_indexed() {
        let v = serde_json::json!({"a/b": {"c~d": 1}, "list": [true, {}], "empty": {}});
        let mut leaves = Vec::new();
        leaf_pointers(&v, String::new(), &mut leaves);
        leaves.sort();
        assert_eq!(
            leaves,
            vec!["/a~1b/c~0d", "/empty", "/list/0", "/list/1"]
        );
    }

    #[test]
    fn load_requires_a_path() {
        let none: [&str; 0] = [];
        assert!(load_layered_yaml(&none).is_err());
    }

    #[test]
    fn load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        let over = dir.path().join("over.yaml");
        fs::write(&base, BASE).unwrap();
        fs::write(&over, OVERRIDE).unwrap();

        let loaded = load_layered_yaml(&[&base, &over]).unwrap();
        assert_eq!(loaded.run_config().unwrap().schema.shape, SchemaShape::Grouped);
    }
}
