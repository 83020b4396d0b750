//! # Injector
//!
//! Writes compiled secrets into a [`BackendClient`].
//!
//! All password policies are installed first. Then, per secret, fields are
//! written in declaration order: the first one with `put` (which replaces the
//! whole secret), the rest with `patch`. Every field is written once per vault
//! prefix.
//!
//! Generated fields are probed before writing unless they are marked
//! `override`, so re-running the injector never replaces a password that
//! already exists.
//!
//! Before anything is written, every field that is neither generated nor a
//! file upload is checked for a value. A compiled secret missing one is
//! rejected without touching the backend.

use crate::backend::{BackendClient, KvTarget, KvVerb, PipeProducer};
use crate::compiler::{CompiledManifest, CompiledSecret};
use crate::constants::DEFAULT_VAULT_POLICY_NAME;
use crate::error::{LoaderError, ResolutionError, SpecError};
use crate::policy::PolicyTable;
use indexmap::IndexMap;
use tracing::{debug, info};

/// Drives a [`BackendClient`] from compiled secrets
pub struct Injector<'b> {
    backend: &'b dyn BackendClient,
}

impl std::fmt::Debug for Injector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector").finish_non_exhaustive()
    }
}

impl<'b> Injector<'b> {
    pub fn new(backend: &'b dyn BackendClient) -> Self {
        Self { backend }
    }

    /// Inject the output of a previous compile
    ///
    /// # Errors
    ///
    /// Fails with `Must pass vault_policies` or `Must pass parsed_secrets`
    /// when either part is empty, otherwise as [`Injector::inject`].
    pub async fn inject_compiled(&self, compiled: &CompiledManifest) -> Result<usize, LoaderError> {
        if compiled.vault_policies.is_empty() {
            return Err(SpecError::MissingVaultPolicies.into());
        }
        if compiled.parsed_secrets.is_empty() {
            return Err(SpecError::MissingParsedSecrets.into());
        }
        self.inject(&compiled.vault_policies, &compiled.parsed_secrets)
            .await
    }

    /// Install `policies` and write every secret; returns the number of secrets written
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::MissingValue`] before any write when a field
    /// has nothing to inject, and the first [`BackendError`](crate::error::BackendError)
    /// otherwise. Secrets written before a backend failure stay written.
    pub async fn inject(
        &self,
        policies: &PolicyTable,
        secrets: &IndexMap<String, CompiledSecret>,
    ) -> Result<usize, LoaderError> {
        for secret in secrets.values() {
            check_values(secret)?;
        }

        for (name, body) in policies.iter() {
            self.backend.install_policy(name, body).await?;
        }
        debug!(policies = policies.len(), "Installed password policies");

        let mut injected = 0;
        for secret in secrets.values() {
            self.inject_secret(secret).await?;
            injected += 1;
            info!(
                secret = %secret.name,
                fields = secret.fields.len(),
                prefixes = secret.vault_prefixes.len(),
                "Injected secret"
            );
        }
        Ok(injected)
    }

    async fn inject_secret(&self, secret: &CompiledSecret) -> Result<(), LoaderError> {
        for (counter, (field, value)) in secret.fields.iter().enumerate() {
            let verb = if counter == 0 { KvVerb::Put } else { KvVerb::Patch };

            for prefix in &secret.vault_prefixes {
                let target = KvTarget {
                    mount: &secret.vault_mount,
                    prefix,
                    secret: &secret.name,
                    field,
                };

                if secret.is_generated(field) {
                    self.inject_generated(secret, &target, verb).await?;
                } else if let Some(path) = secret.paths.get(field.as_str()) {
                    self.backend
                        .kv_write_file(&target, verb, path, secret.is_base64(field))
                        .await?;
                } else {
                    let value = value.as_ref().ok_or_else(|| missing(secret, field))?;
                    self.backend.kv_write(&target, verb, value).await?;
                }
            }
        }
        Ok(())
    }

    async fn inject_generated(
        &self,
        secret: &CompiledSecret,
        target: &KvTarget<'_>,
        verb: KvVerb,
    ) -> Result<(), LoaderError> {
        if !secret.is_overridden(target.field) && self.backend.kv_field_exists(target).await? {
            debug!(%target, "Generated field already present, skipping");
            return Ok(());
        }

        let policy = secret
            .vault_policies
            .get(target.field)
            .map_or(DEFAULT_VAULT_POLICY_NAME, String::as_str);
        let producer = PipeProducer::GeneratePassword {
            policy: policy.to_string(),
            base64: secret.is_base64(target.field),
        };
        self.backend
            .kv_write_from_pipe(target, verb, &producer)
            .await?;
        Ok(())
    }
}

fn check_values(secret: &CompiledSecret) -> Result<(), ResolutionError> {
    for (field, value) in &secret.fields {
        let deferred = secret.is_generated(field) || secret.paths.contains_key(field.as_str());
        if !deferred && value.is_none() {
            return Err(missing(secret, field));
        }
    }
    Ok(())
}

fn missing(secret: &CompiledSecret, field: &str) -> ResolutionError {
    ResolutionError::MissingValue {
        secret: secret.name.clone(),
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendOp, InMemoryBackend};
    use crate::resolver::SecretValue;

    fn secret_with(fields: &[(&str, Option<&str>)]) -> CompiledSecret {
        let mut secret = CompiledSecret::new("config-demo");
        for (name, value) in fields {
            secret
                .fields
                .insert((*name).to_string(), value.map(SecretValue::from));
        }
        secret
    }

    fn one(secret: CompiledSecret) -> IndexMap<String, CompiledSecret> {
        IndexMap::from([(secret.name.clone(), secret)])
    }

    fn writes(ops: &[BackendOp]) -> Vec<String> {
        ops.iter()
            .filter(|op| !matches!(op, BackendOp::InstallPolicy { .. }))
            .map(ToString::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_first_field_puts_then_patches() {
        let backend = InMemoryBackend::new();
        let secrets = one(secret_with(&[("secret", Some("a")), ("other", Some("b"))]));

        let count = Injector::new(&backend)
            .inject(&PolicyTable::default(), &secrets)
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            writes(&backend.ops().await),
            vec!["put hub/config-demo secret", "patch hub/config-demo other"]
        );
    }

    #[tokio::test]
    async fn test_missing_value_fails_before_any_write() {
        let backend = InMemoryBackend::new();
        let secrets = one(secret_with(&[("secret", None)]));
        let policies = PolicyTable::with_defaults(std::iter::empty::<(&str, &str)>());

        let err = Injector::new(&backend)
            .inject(&policies, &secrets)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LoaderError::Resolution(ResolutionError::MissingValue { .. })
        ));
        assert!(backend.ops().await.is_empty());
    }

    #[tokio::test]
    async fn test_inject_compiled_requires_both_parts() {
        let backend = InMemoryBackend::new();
        let injector = Injector::new(&backend);

        let mut compiled = CompiledManifest {
            vault_policies: PolicyTable::default(),
            parsed_secrets: one(secret_with(&[("a", Some("1"))])),
            kubernetes_secret_objects: Vec::new(),
            secret_store_namespace: String::new(),
        };
        let err = injector.inject_compiled(&compiled).await.unwrap_err();
        assert_eq!(err.to_string(), "Must pass vault_policies");

        compiled.vault_policies = PolicyTable::with_defaults(std::iter::empty::<(&str, &str)>());
        compiled.parsed_secrets.clear();
        let err = injector.inject_compiled(&compiled).await.unwrap_err();
        assert_eq!(err.to_string(), "Must pass parsed_secrets");
    }
}
