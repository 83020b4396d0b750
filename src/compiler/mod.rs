//! # Secret Compiler
//!
//! Validates a manifest, resolves every field in declaration order and
//! produces the compiled output:
//!
//! - `vault_policies`: the policy table
//! - `parsed_secrets`: one [`CompiledSecret`] per secret, keyed by name
//! - `kubernetes_secret_objects`: rendered Secret objects
//! - `secret_store_namespace`
//!
//! With the `kubernetes` backing store each secret is rendered once into the
//! secret store namespace. Otherwise one object is rendered per target
//! namespace, which means none at all for a vault secret without
//! `targetNamespaces`.

mod kubernetes;

pub use kubernetes::render_secret;

use crate::error::LoaderError;
use crate::manifest::{BackingStore, IniRef, ManifestSpec, RawManifest, SecretSpec};
use crate::policy::PolicyTable;
use crate::resolver::{Resolved, SecretPrompter, SecretValue, ValueResolver};
use crate::validation::validate_manifest;
use indexmap::IndexMap;
use k8s_openapi::api::core::v1::Secret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Resolution output for one secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledSecret {
    pub name: String,
    /// Resolved values in declaration order; `None` for generated fields
    pub fields: IndexMap<String, Option<SecretValue>>,
    pub vault_mount: String,
    /// Field name to password policy, for generated fields
    #[serde(default)]
    pub vault_policies: IndexMap<String, String>,
    pub vault_prefixes: Vec<String>,
    #[serde(default, rename = "override")]
    pub override_fields: Vec<String>,
    #[serde(default)]
    pub generate: Vec<String>,
    #[serde(default)]
    pub paths: IndexMap<String, PathBuf>,
    #[serde(default)]
    pub base64: Vec<String>,
    #[serde(default)]
    pub ini_file: IndexMap<String, IniRef>,
    #[serde(rename = "type")]
    pub secret_type: String,
    #[serde(default)]
    pub target_namespaces: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl CompiledSecret {
    /// An empty record with default mount, prefix and type
    pub fn new(name: impl Into<String>) -> Self {
        use crate::constants::{DEFAULT_SECRET_TYPE, DEFAULT_VAULT_MOUNT, DEFAULT_VAULT_PREFIX};
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            vault_mount: DEFAULT_VAULT_MOUNT.to_string(),
            vault_policies: IndexMap::new(),
            vault_prefixes: vec![DEFAULT_VAULT_PREFIX.to_string()],
            override_fields: Vec::new(),
            generate: Vec::new(),
            paths: IndexMap::new(),
            base64: Vec::new(),
            ini_file: IndexMap::new(),
            secret_type: DEFAULT_SECRET_TYPE.to_string(),
            target_namespaces: Vec::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    fn from_spec(spec: &SecretSpec) -> Self {
        Self {
            vault_mount: spec.vault_mount.clone(),
            vault_prefixes: spec.vault_prefixes.clone(),
            secret_type: spec.secret_type.clone(),
            target_namespaces: spec.target_namespaces.clone(),
            labels: spec.labels.clone(),
            annotations: spec.annotations.clone(),
            ..Self::new(spec.name.clone())
        }
    }

    #[must_use]
    pub fn is_generated(&self, field: &str) -> bool {
        self.generate.iter().any(|f| f == field)
    }

    #[must_use]
    pub fn is_overridden(&self, field: &str) -> bool {
        self.override_fields.iter().any(|f| f == field)
    }

    #[must_use]
    pub fn is_base64(&self, field: &str) -> bool {
        self.base64.iter().any(|f| f == field)
    }
}

/// Complete compile output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledManifest {
    #[serde(default)]
    pub vault_policies: PolicyTable,
    #[serde(default)]
    pub parsed_secrets: IndexMap<String, CompiledSecret>,
    #[serde(default)]
    pub kubernetes_secret_objects: Vec<Secret>,
    #[serde(default)]
    pub secret_store_namespace: String,
}

/// Validates and resolves manifests
pub struct SecretCompiler<'p> {
    resolver: ValueResolver<'p>,
    backing_store: Option<BackingStore>,
}

impl std::fmt::Debug for SecretCompiler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCompiler")
            .field("backing_store", &self.backing_store)
            .finish_non_exhaustive()
    }
}

impl<'p> SecretCompiler<'p> {
    pub fn new(prompter: &'p mut dyn SecretPrompter) -> Self {
        Self {
            resolver: ValueResolver::new(prompter),
            backing_store: None,
        }
    }

    /// Backing store chosen by the caller; a manifest naming another one is rejected
    #[must_use]
    pub fn with_backing_store(mut self, backing_store: Option<BackingStore>) -> Self {
        self.backing_store = backing_store;
        self
    }

    /// Validate and compile `raw`
    ///
    /// # Errors
    ///
    /// Returns the first validation or resolution failure. Nothing is
    /// resolved until the whole manifest has validated.
    pub fn compile(&mut self, raw: &RawManifest) -> Result<CompiledManifest, LoaderError> {
        let spec = validate_manifest(raw, self.backing_store)?;
        self.compile_validated(&spec)
    }

    /// Compile an already validated manifest
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`](crate::error::ResolutionError) when a
    /// source cannot be read or prompting fails.
    pub fn compile_validated(&mut self, spec: &ManifestSpec) -> Result<CompiledManifest, LoaderError> {
        let mut parsed_secrets = IndexMap::new();
        let mut kubernetes_secret_objects = Vec::new();

        for secret in &spec.secrets {
            let compiled = self.compile_secret(secret)?;

            let namespaces: Vec<&str> = match spec.backing_store {
                BackingStore::Kubernetes => vec![spec.secret_store_namespace.as_str()],
                BackingStore::Vault | BackingStore::None => {
                    compiled.target_namespaces.iter().map(String::as_str).collect()
                }
            };
            kubernetes_secret_objects.extend(
                namespaces
                    .into_iter()
                    .map(|namespace| render_secret(&compiled, namespace)),
            );

            info!(
                secret = %compiled.name,
                fields = compiled.fields.len(),
                generated = compiled.generate.len(),
                "Compiled secret"
            );
            parsed_secrets.insert(compiled.name.clone(), compiled);
        }

        Ok(CompiledManifest {
            vault_policies: spec.policies.clone(),
            parsed_secrets,
            kubernetes_secret_objects,
            secret_store_namespace: spec.secret_store_namespace.clone(),
        })
    }

    fn compile_secret(&mut self, secret: &SecretSpec) -> Result<CompiledSecret, LoaderError> {
        let mut compiled = CompiledSecret::from_spec(secret);

        for field in &secret.fields {
            let name = field.name.clone();
            let value = match self.resolver.resolve(&secret.name, field)? {
                Resolved::Deferred { vault_policy } => {
                    compiled.generate.push(name.clone());
                    if field.override_existing {
                        compiled.override_fields.push(name.clone());
                    }
                    compiled.vault_policies.insert(name.clone(), vault_policy);
                    None
                }
                Resolved::Value(value) => value,
                Resolved::File { path, content } => {
                    compiled.paths.insert(name.clone(), path);
                    Some(content)
                }
                Resolved::Ini { reference, value } => {
                    compiled.ini_file.insert(name.clone(), reference);
                    value
                }
            };
            if field.base64 {
                compiled.base64.push(name.clone());
            }
            compiled.fields.insert(name, value);
        }

        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_manifest_str;
    use crate::resolver::ScriptedPrompter;

    fn compile(yaml: &str, backing_store: Option<BackingStore>) -> CompiledManifest {
        let raw = load_manifest_str(yaml).unwrap();
        let mut prompter = ScriptedPrompter::default();
        SecretCompiler::new(&mut prompter)
            .with_backing_store(backing_store)
            .compile(&raw)
            .unwrap()
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let compiled = compile(
            r#"
version: "2.0"
secrets:
  - name: s
    fields:
      - name: zulu
        value: "1"
      - name: alpha
        value: "2"
      - name: mike
        value: "3"
"#,
            None,
        );
        let names: Vec<&String> = compiled.parsed_secrets["s"].fields.keys().collect();
        assert_eq!(names, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn test_kubernetes_backing_store_renders_into_secret_store() {
        let compiled = compile(
            r#"
version: "2.0"
secretStoreNamespace: my-secrets
secrets:
  - name: s
    targetNamespaces: [a, b]
    fields:
      - name: f
        value: v
"#,
            Some(BackingStore::Kubernetes),
        );
        assert_eq!(compiled.kubernetes_secret_objects.len(), 1);
        assert_eq!(
            compiled.kubernetes_secret_objects[0].metadata.namespace.as_deref(),
            Some("my-secrets")
        );
        assert_eq!(compiled.secret_store_namespace, "my-secrets");
    }

    #[test]
    fn test_none_backing_store_renders_per_target_namespace() {
        let compiled = compile(
            r#"
version: "2.0"
backingStore: none
secrets:
  - name: s
    targetNamespaces: [a, b]
    fields:
      - name: f
        value: v
"#,
            None,
        );
        let namespaces: Vec<_> = compiled
            .kubernetes_secret_objects
            .iter()
            .map(|s| s.metadata.namespace.clone().unwrap())
            .collect();
        assert_eq!(namespaces, vec!["a", "b"]);
    }

    #[test]
    fn test_vault_without_target_namespaces_renders_nothing() {
        let compiled = compile(
            "version: \"2.0\"\nsecrets:\n  - name: s\n    fields:\n      - name: f\n        value: v\n",
            None,
        );
        assert!(compiled.kubernetes_secret_objects.is_empty());
        assert_eq!(compiled.parsed_secrets.len(), 1);
    }

    #[test]
    fn test_generated_field_lists() {
        let compiled = compile(
            r#"
version: "2.0"
secrets:
  - name: s
    fields:
      - name: password
        onMissingValue: generate
        vaultPolicy: validatedPatternDefaultPolicy
        override: true
        base64: true
"#,
            None,
        );
        let secret = &compiled.parsed_secrets["s"];
        assert_eq!(secret.fields["password"], None);
        assert!(secret.is_generated("password"));
        assert!(secret.is_overridden("password"));
        assert!(secret.is_base64("password"));
        assert_eq!(
            secret.vault_policies["password"],
            "validatedPatternDefaultPolicy"
        );
    }

    #[test]
    fn test_compiled_manifest_round_trips_through_json() {
        let compiled = compile(
            r#"
version: "2.0"
backingStore: none
secrets:
  - name: s
    targetNamespaces: [default]
    fields:
      - name: f
        value: v
        base64: true
"#,
            None,
        );
        let json = serde_json::to_string(&compiled).unwrap();
        let back: CompiledManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, compiled);
    }
}
