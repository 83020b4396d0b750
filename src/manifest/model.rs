//! # Validated Model
//!
//! Typed view of a manifest produced by the validators. Every default has been
//! applied and every field carries its source kind, decided once.

use super::types::BackingStore;
use crate::policy::PolicyTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// What to do when a field has no value in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMissingValue {
    #[default]
    Error,
    Generate,
    Prompt,
}

impl OnMissingValue {
    /// Parse the manifest spelling, `None` for unrecognised values
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(OnMissingValue::Error),
            "generate" => Some(OnMissingValue::Generate),
            "prompt" => Some(OnMissingValue::Prompt),
            _ => None,
        }
    }
}

impl fmt::Display for OnMissingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OnMissingValue::Error => "error",
            OnMissingValue::Generate => "generate",
            OnMissingValue::Prompt => "prompt",
        })
    }
}

/// INI lookup coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IniRef {
    /// File as written in the manifest; `~`-expanded once resolved
    #[serde(rename = "ini_file")]
    pub file: String,
    #[serde(rename = "ini_section")]
    pub section: String,
    #[serde(rename = "ini_key")]
    pub key: String,
}

impl IniRef {
    #[must_use]
    pub fn expanded_file(&self) -> PathBuf {
        expand_path(&self.file)
    }
}

/// Where a field's value comes from
///
/// `Literal(None)` and `Path(None)` are the explicit-null forms used by
/// prompting ("prompt with no default").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    Unset,
    Literal(Option<String>),
    Path(Option<String>),
    IniRef(IniRef),
}

impl FieldSource {
    /// Manifest key naming the source kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FieldSource::Unset => "",
            FieldSource::Literal(_) => "value",
            FieldSource::Path(_) => "path",
            FieldSource::IniRef(_) => "ini_file",
        }
    }
}

/// A validated field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub source: FieldSource,
    pub on_missing_value: OnMissingValue,
    pub base64: bool,
    pub override_existing: bool,
    pub vault_policy: Option<String>,
    /// Text shown when prompting (`prompt`, falling back to `description`)
    pub prompt: Option<String>,
}

/// A validated secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    pub vault_mount: String,
    pub vault_prefixes: Vec<String>,
    pub secret_type: String,
    pub target_namespaces: Vec<String>,
    /// Own labels, or the manifest's `defaultLabels`
    pub labels: BTreeMap<String, String>,
    /// Own annotations, or the manifest's `defaultAnnotations`
    pub annotations: BTreeMap<String, String>,
}

/// A validated manifest, ready for compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSpec {
    pub version: String,
    pub backing_store: BackingStore,
    pub secret_store_namespace: String,
    pub policies: PolicyTable,
    pub secrets: Vec<SecretSpec>,
}

/// `~`-expand a manifest path
#[must_use]
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
