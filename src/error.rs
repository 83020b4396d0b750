//! # Errors
//!
//! Error taxonomy for manifest loading.
//!
//! - [`SpecError`]: the manifest breaks a structural rule. Always fatal, never retried.
//! - [`DuplicateError`]: duplicate secret or field names.
//! - [`ResolutionError`]: a declared source could not be read at resolution time,
//!   or interactive input was unavailable.
//! - [`BackendError`]: a backend command exhausted its retry budget.
//! - [`ConfigError`]: an environment setting could not be parsed.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by the loader
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Duplicate(#[from] DuplicateError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LoaderError {
    /// True when the failure happened before any backend mutation
    #[must_use]
    pub fn is_pre_injection(&self) -> bool {
        !matches!(self, LoaderError::Backend(_))
    }
}

/// Structural rule violations in the manifest
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("Could not parse manifest as YAML: {0}")]
    Unparsable(String),

    #[error("Malformed manifest: {0}")]
    Malformed(String),

    #[error("Version {0} is not supported, only version 2.0 manifests can be loaded")]
    UnsupportedVersion(String),

    #[error("Currently only the 'vault', 'kubernetes' and 'none' backingStores are supported: {0}")]
    UnsupportedBackingStore(String),

    #[error("Secrets file specifies '{file}' backend but pattern config specifies '{requested}'.")]
    BackingStoreMismatch { file: String, requested: String },

    #[error("No secrets found")]
    NoSecrets,

    #[error("Secret #{index} is missing name")]
    SecretMissingName { index: usize },

    #[error("Secret {secret} has empty vaultPrefixes")]
    EmptyVaultPrefixes { secret: String },

    #[error("Secret {secret} targetNamespaces must be a list")]
    TargetNamespacesNotList { secret: String },

    #[error("Secret {secret} targetNamespaces cannot be empty for secrets backend {backing_store}")]
    EmptyTargetNamespaces {
        secret: String,
        backing_store: String,
    },

    #[error("Secret {secret} has invalid namespace '{namespace}': {reason}")]
    InvalidNamespace {
        secret: String,
        namespace: String,
        reason: String,
    },

    #[error("secretStoreNamespace '{namespace}' is invalid: {reason}")]
    InvalidSecretStoreNamespace { namespace: String, reason: String },

    #[error("Secret {secret} {attribute} must be a dictionary")]
    NotAMap { secret: String, attribute: String },

    #[error("Secret {secret} does not have any fields")]
    NoFields { secret: String },

    #[error("Field #{index} of secret {secret} is missing name")]
    FieldMissingName { secret: String, index: usize },

    #[error("onMissingValue: {value} is invalid in field {field} of secret {secret}")]
    InvalidOnMissingValue {
        secret: String,
        field: String,
        value: String,
    },

    #[error("Both '{first}' and '{second}' cannot be used in field {field} of secret {secret}")]
    ConflictingKinds {
        secret: String,
        field: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("ini_file requires at least ini_key to be defined in field {field} of secret {secret}")]
    MissingIniKey { secret: String, field: String },

    #[error("Field {field} of secret {secret} has an invalid boolean for '{attribute}': {value}")]
    InvalidBoolean {
        secret: String,
        field: String,
        attribute: &'static str,
        value: String,
    },

    #[error("Secret {secret} field {field} has vaultPolicy set to {policy} but no such policy exists")]
    UnknownVaultPolicy {
        secret: String,
        field: String,
        policy: String,
    },

    #[error(
        "Secret {secret} field {field} has onMissingValue set to 'error' and has neither value nor path nor ini_file set"
    )]
    MissingValue { secret: String, field: String },

    #[error("Field {field} of secret {secret} has non-existing path: {path}")]
    NonExistingPath {
        secret: String,
        field: String,
        path: String,
    },

    #[error("Field {field} of secret {secret} has non-existing ini_file: {path}")]
    NonExistingIniFile {
        secret: String,
        field: String,
        path: String,
    },

    #[error(
        "'override' attribute requires 'onMissingValue' to be set to 'generate' in field {field} of secret {secret}"
    )]
    OverrideWithoutGenerate { secret: String, field: String },

    #[error("Secret {secret} field {field} has onMissingValue set to 'generate' but has a {kind} set")]
    GenerateWithSource {
        secret: String,
        field: String,
        kind: &'static str,
    },

    #[error("Secret {secret} field {field} has no vaultPolicy but onMissingValue is set to 'generate'")]
    GenerateWithoutPolicy { secret: String, field: String },

    #[error(
        "You cannot have onMissingValue set to 'generate' unless using vault backingstore for secret {secret} field {field}"
    )]
    GenerateRequiresVault { secret: String, field: String },

    #[error(
        "Secret {secret} field {field} has onMissingValue set to 'prompt' but has no value nor path fields"
    )]
    PromptWithoutSource { secret: String, field: String },

    #[error("Must pass vault_policies")]
    MissingVaultPolicies,

    #[error("Must pass parsed_secrets")]
    MissingParsedSecrets,
}

/// What kind of name was duplicated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    Secret,
    Field,
}

impl DuplicateKind {
    fn as_str(self) -> &'static str {
        match self {
            DuplicateKind::Secret => "secret",
            DuplicateKind::Field => "field",
        }
    }
}

/// Duplicate secret or field names; `names` is sorted and de-duplicated
#[derive(Debug, Error, PartialEq, Eq)]
#[error("You cannot have duplicate {} names: {names:?}", kind.as_str())]
pub struct DuplicateError {
    pub kind: DuplicateKind,
    pub names: Vec<String>,
}

/// Failures while turning a validated field into a concrete value
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("File {} not found, exiting", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not read interactive input: {0}")]
    PromptUnavailable(String),

    #[error("Field {field} of secret {secret} has no value to inject")]
    MissingValue { secret: String, field: String },
}

/// Backend command failures
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{tool} binary not found in PATH: {source}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: which::Error,
    },

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` failed after {attempts} attempt(s) (exit status {status:?}): stdout: {stdout} stderr: {stderr}")]
    CommandFailed {
        command: String,
        attempts: u32,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Backend rejected write to {path}: {reason}")]
    Rejected { path: String, reason: String },

    #[error("Failed to read upload source {}: {source}", path.display())]
    UploadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Environment settings that could not be parsed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {key} has an invalid value '{value}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Environment variable {key}: {source}")]
    BackingStore {
        key: String,
        #[source]
        source: SpecError,
    },
}
