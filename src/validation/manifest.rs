//! # Manifest Validation
//!
//! Top-level pass: version, backing store, secret store namespace, policy
//! table, then every secret in order and finally global duplicate names.

use super::kubernetes::validate_kubernetes_namespace;
use super::{find_dupes, validate_secret, SecretDefaults};
use crate::constants::{
    DEFAULT_MANIFEST_VERSION, DEFAULT_SECRET_STORE_NAMESPACE, SUPPORTED_MANIFEST_VERSION,
};
use crate::error::{DuplicateError, DuplicateKind, LoaderError, SpecError};
use crate::manifest::{stringify_map, BackingStore, ManifestSpec, RawManifest};
use crate::policy::PolicyTable;
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Reject anything but the supported manifest version
///
/// # Errors
///
/// Returns [`SpecError::UnsupportedVersion`] for any other version string.
pub fn validate_version(version: &str) -> Result<(), SpecError> {
    if version == SUPPORTED_MANIFEST_VERSION {
        Ok(())
    } else {
        Err(SpecError::UnsupportedVersion(version.to_string()))
    }
}

/// Resolve the effective backing store
///
/// A caller-selected store wins, but a manifest that names a different one is
/// an error. Without a caller value the manifest's choice (default `vault`)
/// is used.
///
/// # Errors
///
/// Returns [`SpecError::BackingStoreMismatch`] or
/// [`SpecError::UnsupportedBackingStore`].
pub fn resolve_backing_store(
    declared: Option<&str>,
    requested: Option<BackingStore>,
) -> Result<BackingStore, SpecError> {
    if let (Some(file), Some(caller)) = (declared, requested) {
        if file != caller.as_str() {
            return Err(SpecError::BackingStoreMismatch {
                file: file.to_string(),
                requested: caller.to_string(),
            });
        }
    }

    match (declared, requested) {
        (_, Some(caller)) => Ok(caller),
        (Some(file), None) => file
            .parse()
            .map_err(SpecError::UnsupportedBackingStore),
        (None, None) => Ok(BackingStore::default()),
    }
}

/// Validate a whole manifest and produce its typed form
///
/// # Errors
///
/// Returns the first rule violation found. Duplicate secret names are reported
/// only after every secret has validated on its own.
pub fn validate_manifest(
    raw: &RawManifest,
    requested: Option<BackingStore>,
) -> Result<ManifestSpec, LoaderError> {
    let version = raw
        .version
        .as_ref()
        .map_or(DEFAULT_MANIFEST_VERSION, |v| v.as_str())
        .to_string();
    validate_version(&version)?;

    let backing_store = resolve_backing_store(
        raw.backing_store.as_ref().map(|b| b.as_str()),
        requested,
    )?;

    let secret_store_namespace = raw
        .secret_store_namespace
        .as_ref()
        .map_or(DEFAULT_SECRET_STORE_NAMESPACE, |n| n.as_str())
        .to_string();
    validate_kubernetes_namespace(&secret_store_namespace).map_err(|e| {
        SpecError::InvalidSecretStoreNamespace {
            namespace: secret_store_namespace.clone(),
            reason: e.to_string(),
        }
    })?;

    let policies = PolicyTable::with_defaults(
        raw.vault_policies
            .iter()
            .flatten()
            .map(|(name, body)| (name.as_str(), body.as_str())),
    );

    let defaults = SecretDefaults {
        labels: default_map(raw.default_labels.as_ref(), "defaultLabels")?,
        annotations: default_map(raw.default_annotations.as_ref(), "defaultAnnotations")?,
    };

    let raw_secrets = raw.secrets.as_deref().unwrap_or_default();
    if raw_secrets.is_empty() {
        return Err(SpecError::NoSecrets.into());
    }

    let secrets = raw_secrets
        .iter()
        .enumerate()
        .map(|(i, s)| validate_secret(s, i, &policies, backing_store, &defaults))
        .collect::<Result<Vec<_>, _>>()?;

    let dupes = find_dupes(secrets.iter().map(|s| s.name.as_str()));
    if !dupes.is_empty() {
        return Err(DuplicateError {
            kind: DuplicateKind::Secret,
            names: dupes,
        }
        .into());
    }

    debug!(
        secrets = secrets.len(),
        policies = policies.len(),
        backing_store = %backing_store,
        "Manifest validated"
    );

    Ok(ManifestSpec {
        version,
        backing_store,
        secret_store_namespace,
        policies,
        secrets,
    })
}

fn default_map(
    value: Option<&Value>,
    attribute: &str,
) -> Result<BTreeMap<String, String>, SpecError> {
    match value {
        None => Ok(BTreeMap::new()),
        Some(v) => stringify_map(v)
            .ok_or_else(|| SpecError::Malformed(format!("{attribute} must be a dictionary"))),
    }
}
