//! # Secret Validation

use super::kubernetes::validate_kubernetes_namespace;
use super::{find_dupes, validate_field, SecretDefaults, ValidationContext};
use crate::constants::{DEFAULT_SECRET_TYPE, DEFAULT_VAULT_MOUNT, DEFAULT_VAULT_PREFIX};
use crate::error::{DuplicateError, DuplicateKind, LoaderError, SpecError};
use crate::manifest::{
    scalar_to_string, stringify_map, BackingStore, RawSecret, Scalar, SecretSpec,
};
use crate::policy::PolicyTable;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Validate one secret entry and all of its fields
///
/// `index` is the secret's position in `secrets`, used when it has no name.
///
/// # Errors
///
/// Returns the first [`SpecError`] found, or a [`DuplicateError`] listing the
/// field names that appear more than once.
pub fn validate_secret(
    raw: &RawSecret,
    index: usize,
    policies: &PolicyTable,
    backing_store: BackingStore,
    defaults: &SecretDefaults,
) -> Result<SecretSpec, LoaderError> {
    let name = raw
        .name
        .as_ref()
        .map(|n| n.as_str().to_string())
        .ok_or(SpecError::SecretMissingName { index })?;

    let vault_prefixes = match &raw.vault_prefixes {
        None => vec![DEFAULT_VAULT_PREFIX.to_string()],
        Some(Some(prefixes)) if !prefixes.is_empty() => {
            prefixes.iter().map(|p| p.as_str().to_string()).collect()
        }
        Some(_) => return Err(SpecError::EmptyVaultPrefixes { secret: name }.into()),
    };

    let target_namespaces = target_namespaces(raw, &name)?;
    if backing_store == BackingStore::None && target_namespaces.is_empty() {
        return Err(SpecError::EmptyTargetNamespaces {
            secret: name,
            backing_store: backing_store.to_string(),
        }
        .into());
    }

    let labels = string_map(raw.labels.as_ref(), &name, "labels")?
        .unwrap_or_else(|| defaults.labels.clone());
    let annotations = string_map(raw.annotations.as_ref(), &name, "annotations")?
        .unwrap_or_else(|| defaults.annotations.clone());

    let raw_fields = raw.fields.as_deref().unwrap_or_default();
    if raw_fields.is_empty() {
        return Err(SpecError::NoFields { secret: name }.into());
    }

    let ctx = ValidationContext {
        secret: &name,
        policies,
        backing_store,
    };
    let fields = raw_fields
        .iter()
        .enumerate()
        .map(|(i, f)| validate_field(f, i, &ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let dupes = find_dupes(fields.iter().map(|f| f.name.as_str()));
    if !dupes.is_empty() {
        return Err(DuplicateError {
            kind: DuplicateKind::Field,
            names: dupes,
        }
        .into());
    }

    Ok(SecretSpec {
        name,
        fields,
        vault_mount: raw
            .vault_mount
            .as_ref()
            .map_or_else(|| DEFAULT_VAULT_MOUNT.to_string(), |m| m.as_str().to_string()),
        vault_prefixes,
        secret_type: raw
            .secret_type
            .as_ref()
            .map_or_else(|| DEFAULT_SECRET_TYPE.to_string(), Scalar::to_string),
        target_namespaces,
        labels,
        annotations,
    })
}

fn target_namespaces(raw: &RawSecret, secret: &str) -> Result<Vec<String>, SpecError> {
    let not_list = || SpecError::TargetNamespacesNotList {
        secret: secret.to_string(),
    };

    let namespaces: Vec<String> = match &raw.target_namespaces {
        None => Vec::new(),
        Some(Some(Value::Sequence(items))) => items
            .iter()
            .map(|item| match item {
                Value::Sequence(_) | Value::Mapping(_) | Value::Null => None,
                scalar => scalar_to_string(scalar),
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(not_list)?,
        Some(_) => return Err(not_list()),
    };

    for namespace in &namespaces {
        validate_kubernetes_namespace(namespace).map_err(|e| SpecError::InvalidNamespace {
            secret: secret.to_string(),
            namespace: namespace.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(namespaces)
}

fn string_map(
    value: Option<&Value>,
    secret: &str,
    attribute: &str,
) -> Result<Option<BTreeMap<String, String>>, SpecError> {
    value
        .map(|v| {
            stringify_map(v).ok_or_else(|| SpecError::NotAMap {
                secret: secret.to_string(),
                attribute: attribute.to_string(),
            })
        })
        .transpose()
}
