//! # Manifest Types
//!
//! Lenient serde model of a values-secret document.
//!
//! The raw model accepts whatever the YAML contains and leaves the structural
//! rules to the validators, so that every violation is reported with a
//! specific reason instead of a generic deserialization error.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A YAML scalar coerced to its string form
///
/// Manifests are hand-written, so `version: 2.0`, `value: 1234` and
/// `value: true` all have to be accepted where a string is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Scalar(pub String);

impl Scalar {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarRepr {
    Str(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = ScalarRepr::deserialize(deserializer).map_err(|err| {
            serde::de::Error::custom(format!("expected a string, number or boolean: {err}"))
        })?;
        Ok(Scalar(match repr {
            ScalarRepr::Str(s) => s,
            ScalarRepr::Bool(b) => b.to_string(),
            ScalarRepr::Int(i) => i.to_string(),
            ScalarRepr::UInt(u) => u.to_string(),
            ScalarRepr::Float(f) => format_float(f),
        }))
    }
}

/// `2.0` must stay `"2.0"`, not `"2"`
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

/// Render any YAML scalar as a string; `None` for sequences and mappings
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() => format_float(f),
            _ => n.to_string(),
        }),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Stringify every key and value of a YAML mapping
///
/// Returns `None` when `value` is not a mapping. Nested collections are
/// rendered as inline YAML.
#[must_use]
pub fn stringify_map(value: &Value) -> Option<BTreeMap<String, String>> {
    let mapping = value.as_mapping()?;
    let mut out = BTreeMap::new();
    for (k, v) in mapping {
        let key = scalar_to_string(k).unwrap_or_else(|| render_inline(k));
        let val = scalar_to_string(v).unwrap_or_else(|| render_inline(v));
        out.insert(key, val);
    }
    Some(out)
}

fn render_inline(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_default()
}

/// Distinguish an absent key (`None`) from an explicit `null` (`Some(None)`)
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Target secret store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackingStore {
    #[default]
    Vault,
    Kubernetes,
    None,
}

impl BackingStore {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BackingStore::Vault => "vault",
            BackingStore::Kubernetes => "kubernetes",
            BackingStore::None => "none",
        }
    }
}

impl fmt::Display for BackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackingStore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vault" => Ok(BackingStore::Vault),
            "kubernetes" => Ok(BackingStore::Kubernetes),
            "none" => Ok(BackingStore::None),
            other => Err(other.to_string()),
        }
    }
}

/// Top-level manifest document as written
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawManifest {
    #[serde(default)]
    pub version: Option<Scalar>,
    #[serde(default)]
    pub backing_store: Option<Scalar>,
    #[serde(default)]
    pub secret_store_namespace: Option<Scalar>,
    #[serde(default)]
    pub vault_policies: Option<IndexMap<String, Scalar>>,
    #[serde(default)]
    pub default_labels: Option<Value>,
    #[serde(default)]
    pub default_annotations: Option<Value>,
    #[serde(default)]
    pub secrets: Option<Vec<RawSecret>>,
}

/// One secret entry as written
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSecret {
    #[serde(default)]
    pub name: Option<Scalar>,
    #[serde(default)]
    pub fields: Option<Vec<RawField>>,
    #[serde(default)]
    pub vault_mount: Option<Scalar>,
    #[serde(default, deserialize_with = "present")]
    pub vault_prefixes: Option<Option<Vec<Scalar>>>,
    #[serde(default, rename = "type")]
    pub secret_type: Option<Scalar>,
    #[serde(default, deserialize_with = "present")]
    pub target_namespaces: Option<Option<Value>>,
    #[serde(default)]
    pub labels: Option<Value>,
    #[serde(default)]
    pub annotations: Option<Value>,
}

/// One field entry as written
///
/// Source keys keep the absent/null distinction: `value: null` means
/// "a value is wanted but none is given", which is meaningful for prompting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawField {
    #[serde(default)]
    pub name: Option<Scalar>,
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Option<Scalar>>,
    #[serde(default, deserialize_with = "present")]
    pub path: Option<Option<Scalar>>,
    #[serde(default, deserialize_with = "present")]
    pub ini_file: Option<Option<Scalar>>,
    #[serde(default)]
    pub ini_section: Option<Scalar>,
    #[serde(default)]
    pub ini_key: Option<Scalar>,
    #[serde(default, rename = "onMissingValue")]
    pub on_missing_value: Option<Scalar>,
    #[serde(default)]
    pub base64: Option<Value>,
    #[serde(default, rename = "override", deserialize_with = "present")]
    pub override_: Option<Option<Value>>,
    #[serde(default, rename = "vaultPolicy")]
    pub vault_policy: Option<Scalar>,
    #[serde(default)]
    pub prompt: Option<Scalar>,
    #[serde(default)]
    pub description: Option<Scalar>,
}

impl RawField {
    /// Name used in error messages, empty when missing
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_ref().map_or("", Scalar::as_str)
    }
}
