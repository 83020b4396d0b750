//! # Field Validation
//!
//! Checks one field against the structural rules, first failure wins:
//!
//! 1. `name` is present
//! 2. `onMissingValue` is `error`, `generate` or `prompt`
//! 3. at most one of `value`, `path`, `ini_file`
//! 4. `ini_file` needs `ini_key`
//! 5. `base64` and `override` are booleans
//! 6. a `vaultPolicy` names a known policy
//! 7. per-mode rules for `error`, `generate` and `prompt`

use super::ValidationContext;
use crate::constants::DEFAULT_INI_SECTION;
use crate::error::SpecError;
use crate::manifest::{
    expand_path, BackingStore, FieldSource, FieldSpec, IniRef, OnMissingValue, RawField, Scalar,
};
use serde_yaml::Value;

/// Validate one field of `ctx.secret`; `index` is its position in `fields`
///
/// # Errors
///
/// Returns the first [`SpecError`] the field violates.
pub fn validate_field(
    raw: &RawField,
    index: usize,
    ctx: &ValidationContext<'_>,
) -> Result<FieldSpec, SpecError> {
    let name = raw
        .name
        .as_ref()
        .map(|n| n.as_str().to_string())
        .ok_or_else(|| SpecError::FieldMissingName {
            secret: ctx.secret.to_string(),
            index,
        })?;

    let on_missing_value = match &raw.on_missing_value {
        None => OnMissingValue::Error,
        Some(value) => OnMissingValue::parse(value.as_str()).ok_or_else(|| {
            SpecError::InvalidOnMissingValue {
                secret: ctx.secret.to_string(),
                field: name.clone(),
                value: value.to_string(),
            }
        })?,
    };

    let source = detect_source(raw, &name, ctx)?;

    let base64 = parse_bool(raw.base64.as_ref(), &name, "base64", ctx)?;
    let override_existing = parse_bool(
        raw.override_.as_ref().and_then(Option::as_ref),
        &name,
        "override",
        ctx,
    )?;

    let vault_policy = raw.vault_policy.as_ref().map(|p| p.as_str().to_string());
    if let Some(policy) = &vault_policy {
        if !ctx.policies.contains(policy) {
            return Err(SpecError::UnknownVaultPolicy {
                secret: ctx.secret.to_string(),
                field: name,
                policy: policy.clone(),
            });
        }
    }

    match on_missing_value {
        OnMissingValue::Error => check_error_mode(raw, &name, ctx)?,
        OnMissingValue::Generate => {
            check_generate_mode(&source, vault_policy.as_deref(), &name, ctx)?;
        }
        OnMissingValue::Prompt => check_prompt_mode(raw, &name, ctx)?,
    }

    Ok(FieldSpec {
        name,
        source,
        on_missing_value,
        base64,
        override_existing,
        vault_policy,
        prompt: raw
            .prompt
            .as_ref()
            .or(raw.description.as_ref())
            .map(|p| p.as_str().to_string()),
    })
}

/// Decide the source kind from which keys are present
fn detect_source(
    raw: &RawField,
    name: &str,
    ctx: &ValidationContext<'_>,
) -> Result<FieldSource, SpecError> {
    let found: Vec<&'static str> = [
        ("value", raw.value.is_some()),
        ("path", raw.path.is_some()),
        ("ini_file", raw.ini_file.is_some()),
    ]
    .into_iter()
    .filter_map(|(kind, present)| present.then_some(kind))
    .collect();

    if found.len() > 1 {
        return Err(SpecError::ConflictingKinds {
            secret: ctx.secret.to_string(),
            field: name.to_string(),
            first: found[0],
            second: found[1],
        });
    }

    let owned = |s: &Option<Option<Scalar>>| s.clone().flatten().map(Scalar::into_string);

    Ok(match found.first().copied() {
        Some("value") => FieldSource::Literal(owned(&raw.value)),
        Some("path") => FieldSource::Path(owned(&raw.path)),
        Some(_) => {
            let key = raw
                .ini_key
                .as_ref()
                .ok_or_else(|| SpecError::MissingIniKey {
                    secret: ctx.secret.to_string(),
                    field: name.to_string(),
                })?;
            FieldSource::IniRef(IniRef {
                file: owned(&raw.ini_file).unwrap_or_default(),
                section: raw
                    .ini_section
                    .as_ref()
                    .map_or_else(|| DEFAULT_INI_SECTION.to_string(), |s| s.as_str().to_string()),
                key: key.as_str().to_string(),
            })
        }
        None => FieldSource::Unset,
    })
}

/// Loose boolean: YAML bools, `0`/`1`, and the usual string spellings
fn parse_bool(
    value: Option<&Value>,
    field: &str,
    attribute: &'static str,
    ctx: &ValidationContext<'_>,
) -> Result<bool, SpecError> {
    let invalid = |shown: String| SpecError::InvalidBoolean {
        secret: ctx.secret.to_string(),
        field: field.to_string(),
        attribute,
        value: shown,
    };

    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(invalid(n.to_string())),
        },
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "y" => Ok(true),
            "false" | "no" | "off" | "0" | "n" | "" => Ok(false),
            _ => Err(invalid(s.clone())),
        },
        Some(other) => Err(invalid(format!("{other:?}"))),
    }
}

fn non_empty(value: &Option<Option<Scalar>>) -> bool {
    matches!(value, Some(Some(s)) if !s.as_str().is_empty())
}

fn check_error_mode(
    raw: &RawField,
    name: &str,
    ctx: &ValidationContext<'_>,
) -> Result<(), SpecError> {
    if !non_empty(&raw.value) && !non_empty(&raw.path) && !non_empty(&raw.ini_file) {
        return Err(SpecError::MissingValue {
            secret: ctx.secret.to_string(),
            field: name.to_string(),
        });
    }

    if let Some(Some(path)) = &raw.path {
        if !expand_path(path.as_str()).is_file() {
            return Err(SpecError::NonExistingPath {
                secret: ctx.secret.to_string(),
                field: name.to_string(),
                path: path.to_string(),
            });
        }
    }

    if let Some(Some(ini_file)) = &raw.ini_file {
        if !expand_path(ini_file.as_str()).is_file() {
            return Err(SpecError::NonExistingIniFile {
                secret: ctx.secret.to_string(),
                field: name.to_string(),
                path: ini_file.to_string(),
            });
        }
    }

    if raw.override_.is_some() {
        return Err(SpecError::OverrideWithoutGenerate {
            secret: ctx.secret.to_string(),
            field: name.to_string(),
        });
    }

    Ok(())
}

fn check_generate_mode(
    source: &FieldSource,
    vault_policy: Option<&str>,
    name: &str,
    ctx: &ValidationContext<'_>,
) -> Result<(), SpecError> {
    // `value: null` still reads as "generate this value"
    let conflicting = match source {
        FieldSource::Unset | FieldSource::Literal(None) => None,
        FieldSource::Literal(Some(_)) | FieldSource::Path(_) | FieldSource::IniRef(_) => {
            Some(source.kind())
        }
    };
    if let Some(kind) = conflicting {
        return Err(SpecError::GenerateWithSource {
            secret: ctx.secret.to_string(),
            field: name.to_string(),
            kind,
        });
    }

    if vault_policy.is_none() {
        return Err(SpecError::GenerateWithoutPolicy {
            secret: ctx.secret.to_string(),
            field: name.to_string(),
        });
    }

    if ctx.backing_store != BackingStore::Vault {
        return Err(SpecError::GenerateRequiresVault {
            secret: ctx.secret.to_string(),
            field: name.to_string(),
        });
    }

    Ok(())
}

fn check_prompt_mode(
    raw: &RawField,
    name: &str,
    ctx: &ValidationContext<'_>,
) -> Result<(), SpecError> {
    if raw.value.is_none() && raw.path.is_none() {
        return Err(SpecError::PromptWithoutSource {
            secret: ctx.secret.to_string(),
            field: name.to_string(),
        });
    }

    if raw.override_.is_some() {
        return Err(SpecError::OverrideWithoutGenerate {
            secret: ctx.secret.to_string(),
            field: name.to_string(),
        });
    }

    Ok(())
}
