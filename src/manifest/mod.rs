//! # Manifest
//!
//! Loads values-secret documents.
//!
//! Loading happens in two steps: the text is parsed into a generic YAML value so
//! the version can be checked first (legacy `1.0` documents have an incompatible
//! shape), then it is converted into the lenient [`RawManifest`] model.
//!
//! ```yaml
//! version: "2.0"
//! backingStore: vault
//! vaultPolicies:
//!   basicPolicy: |
//!     length=10
//!     rule "charset" { charset = "abcdefghijklmnopqrstuvwxyz" min-chars = 1 }
//! secrets:
//!   - name: config-demo
//!     vaultPrefixes: ["hub"]
//!     fields:
//!       - name: secret
//!         onMissingValue: generate
//!         vaultPolicy: basicPolicy
//! ```

mod model;
mod types;

pub use model::{
    expand_path, FieldSource, FieldSpec, IniRef, ManifestSpec, OnMissingValue, SecretSpec,
};
pub use types::{
    scalar_to_string, stringify_map, BackingStore, RawField, RawManifest, RawSecret, Scalar,
};

use crate::constants::DEFAULT_MANIFEST_VERSION;
use crate::error::{LoaderError, ResolutionError, SpecError};
use crate::validation::validate_version;
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

/// Parse manifest text
///
/// An empty document is an empty mapping, which has no `version:` and is
/// therefore rejected as a `1.0` manifest.
///
/// # Errors
///
/// Returns [`SpecError`] when the text is not YAML, the top level is not a
/// mapping, the version is unsupported, or a key has an unusable type.
pub fn load_manifest_str(text: &str) -> Result<RawManifest, SpecError> {
    let document: Value =
        serde_yaml::from_str(text).map_err(|e| SpecError::Unparsable(e.to_string()))?;

    let document = match document {
        Value::Null => Value::Mapping(serde_yaml::Mapping::new()),
        Value::Mapping(_) => document,
        _ => {
            return Err(SpecError::Malformed(
                "top-level document must be a mapping".to_string(),
            ))
        }
    };

    validate_version(&document_version(&document))?;

    serde_yaml::from_value(document).map_err(|e| SpecError::Malformed(e.to_string()))
}

/// Read and parse a manifest file
///
/// # Errors
///
/// Returns [`ResolutionError::FileNotFound`] if `path` does not exist, and any
/// error of [`load_manifest_str`].
pub async fn load_manifest_file(path: &Path) -> Result<RawManifest, LoaderError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ResolutionError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ResolutionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), bytes = text.len(), "Read manifest");
    Ok(load_manifest_str(&text)?)
}

/// The document's `version:` as a string, `1.0` when absent
fn document_version(document: &Value) -> String {
    document
        .get("version")
        .and_then(scalar_to_string)
        .unwrap_or_else(|| DEFAULT_MANIFEST_VERSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_unsupported_version() {
        let err = load_manifest_str("").unwrap_err();
        assert_eq!(err, SpecError::UnsupportedVersion("1.0".to_string()));
    }

    #[test]
    fn test_legacy_manifest_is_rejected_before_typed_parse() {
        // v1 `secrets:` is a mapping, which the v2 model cannot hold
        let text = "secrets:\n  config-demo:\n    secret: demo123\n";
        let err = load_manifest_str(text).unwrap_err();
        assert_eq!(err, SpecError::UnsupportedVersion("1.0".to_string()));
    }

    #[test]
    fn test_float_version_is_accepted() {
        let text = "version: 2.0\nsecrets: []\n";
        let manifest = load_manifest_str(text).unwrap();
        assert_eq!(manifest.version.unwrap().as_str(), "2.0");
    }

    #[test]
    fn test_scalar_list_document_is_malformed() {
        let err = load_manifest_str("- a\n- b\n").unwrap_err();
        assert!(matches!(err, SpecError::Malformed(_)));
    }

    #[test]
    fn test_value_null_is_distinguished_from_absent() {
        let text = r#"
version: "2.0"
secrets:
  - name: s
    fields:
      - name: with-null
        value: null
        onMissingValue: prompt
      - name: without
        path: /tmp/x
"#;
        let manifest = load_manifest_str(text).unwrap();
        let fields = manifest.secrets.unwrap()[0].fields.clone().unwrap();
        assert_eq!(fields[0].value, Some(None));
        assert_eq!(fields[1].value, None);
        assert_eq!(
            fields[1].path,
            Some(Some(Scalar("/tmp/x".to_string())))
        );
    }

    #[test]
    fn test_numeric_values_are_stringified() {
        let text = r#"
version: "2.0"
secrets:
  - name: s
    fields:
      - name: port
        value: 5432
      - name: flag
        value: true
"#;
        let manifest = load_manifest_str(text).unwrap();
        let fields = manifest.secrets.unwrap()[0].fields.clone().unwrap();
        assert_eq!(fields[0].value, Some(Some(Scalar("5432".to_string()))));
        assert_eq!(fields[1].value, Some(Some(Scalar("true".to_string()))));
    }

    #[test]
    fn test_stringify_map_coerces_scalars() {
        let value: Value = serde_yaml::from_str("a: 1\nb: true\nc: text\n").unwrap();
        let map = stringify_map(&value).unwrap();
        assert_eq!(map.get("a").unwrap(), "1");
        assert_eq!(map.get("b").unwrap(), "true");
        assert_eq!(map.get("c").unwrap(), "text");

        let list: Value = serde_yaml::from_str("- a\n").unwrap();
        assert!(stringify_map(&list).is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_manifest_file(Path::new("/nonexistent/values-secret.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Resolution(ResolutionError::FileNotFound { .. })
        ));
    }
}
