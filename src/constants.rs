//! # Constants
//!
//! Shared constants used throughout the loader.
//!
//! These values represent the defaults of the values-secret format and can be
//! overridden via the manifest, configuration or environment variables where applicable.

/// The only manifest version the loader understands
pub const SUPPORTED_MANIFEST_VERSION: &str = "2.0";

/// Version assumed when the manifest has no top-level `version:` key
pub const DEFAULT_MANIFEST_VERSION: &str = "1.0";

/// Namespace receiving rendered Secrets when the backing store is `kubernetes`
pub const DEFAULT_SECRET_STORE_NAMESPACE: &str = "validated-patterns-secrets";

/// Default vault KV mount
pub const DEFAULT_VAULT_MOUNT: &str = "secret";

/// Default vault path prefix for every secret
pub const DEFAULT_VAULT_PREFIX: &str = "hub";

/// Default Kubernetes Secret type
pub const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Default INI section consulted by `ini_file` fields
pub const DEFAULT_INI_SECTION: &str = "default";

/// Name of the built-in password policy
pub const DEFAULT_VAULT_POLICY_NAME: &str = "validatedPatternDefaultPolicy";

/// Body of the built-in password policy
pub const DEFAULT_VAULT_POLICY_BODY: &str = concat!(
    "length=20\n",
    "rule \"charset\" { charset = \"abcdefghijklmnopqrstuvwxyz\" min-chars = 1 }\n",
    "rule \"charset\" { charset = \"ABCDEFGHIJKLMNOPQRSTUVWXYZ\" min-chars = 1 }\n",
    "rule \"charset\" { charset = \"0123456789\" min-chars = 1 }\n",
    "rule \"charset\" { charset = \"!@#%^&*\" min-chars = 1 }\n",
);

/// Built-in password policies merged under every manifest's `vaultPolicies`
pub const DEFAULT_VAULT_POLICIES: &[(&str, &str)] =
    &[(DEFAULT_VAULT_POLICY_NAME, DEFAULT_VAULT_POLICY_BODY)];

/// Default namespace of the vault pod
pub const DEFAULT_VAULT_NAMESPACE: &str = "vault";

/// Default vault pod name
pub const DEFAULT_VAULT_POD: &str = "vault-0";

/// Default CLI used to exec into the vault pod
pub const DEFAULT_EXEC_BINARY: &str = "oc";

/// Default number of attempts for backend write commands
pub const DEFAULT_COMMAND_ATTEMPTS: u32 = 3;

/// Default fixed sleep between command attempts (seconds)
pub const DEFAULT_COMMAND_RETRY_SLEEP_SECS: u64 = 3;

/// Scratch file used inside the vault pod for file uploads
pub const VAULT_UPLOAD_SCRATCH_PATH: &str = "/tmp/vcontent";
