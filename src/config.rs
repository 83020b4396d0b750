//! # Loader Configuration
//!
//! Loader-level settings loaded from environment variables.

use crate::error::{ConfigError, SpecError};
use crate::manifest::BackingStore;
use std::time::Duration;

/// Loader-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Command-line flags take precedence over both.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Namespace of the vault pod
    pub vault_namespace: String,
    /// Vault pod name
    pub vault_pod: String,
    /// CLI used to exec into the vault pod (oc, kubectl)
    pub exec_binary: String,
    /// Number of attempts for backend write commands
    pub command_attempts: u32,
    /// Fixed sleep between command attempts (seconds)
    pub command_retry_sleep_secs: u64,
    /// Backing store selected by the caller, checked against the manifest
    pub backing_store: Option<BackingStore>,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            vault_namespace: DEFAULT_VAULT_NAMESPACE.to_string(),
            vault_pod: DEFAULT_VAULT_POD.to_string(),
            exec_binary: DEFAULT_EXEC_BINARY.to_string(),
            command_attempts: DEFAULT_COMMAND_ATTEMPTS,
            command_retry_sleep_secs: DEFAULT_COMMAND_RETRY_SLEEP_SECS,
            backing_store: None,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            log_enable_color: false,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a numeric setting does not parse or
    /// `SECRETS_BACKING_STORE` names an unsupported store.
    pub fn from_env() -> Result<Self, ConfigError> {
        use crate::constants::*;
        Ok(Self {
            vault_namespace: env_var_string("VAULT_NAMESPACE", DEFAULT_VAULT_NAMESPACE),
            vault_pod: env_var_string("VAULT_POD", DEFAULT_VAULT_POD),
            exec_binary: env_var_string("EXEC_BINARY", DEFAULT_EXEC_BINARY),
            command_attempts: env_var_parsed("COMMAND_ATTEMPTS", DEFAULT_COMMAND_ATTEMPTS)?
                .max(1),
            command_retry_sleep_secs: env_var_parsed(
                "COMMAND_RETRY_SLEEP_SECS",
                DEFAULT_COMMAND_RETRY_SLEEP_SECS,
            )?,
            backing_store: env_var_backing_store("SECRETS_BACKING_STORE")?,
            log_level: env_var_string("LOG_LEVEL", "INFO"),
            log_format: env_var_string("LOG_FORMAT", "text"),
            log_enable_color: env_var_flag("LOG_ENABLE_COLOR", false),
        })
    }

    /// Get the sleep between command attempts
    #[must_use]
    pub fn command_retry_sleep_duration(&self) -> Duration {
        Duration::from_secs(self.command_retry_sleep_secs)
    }
}

/// Parse an environment variable, using `default` only when it is unset
fn env_var_parsed<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
                value,
            }),
        Err(_) => Ok(default),
    }
}

/// Optional backing store; an unknown name is rejected rather than ignored
fn env_var_backing_store(key: &str) -> Result<Option<BackingStore>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<BackingStore>()
            .map(Some)
            .map_err(|other: String| ConfigError::BackingStore {
                key: key.to_string(),
                source: SpecError::UnsupportedBackingStore(other),
            }),
        Err(_) => Ok(None),
    }
}

/// Read an on/off flag; unset or unrecognised values keep `default`
fn env_var_flag(key: &str, default: bool) -> bool {
    match std::env::var(key).map(|v| v.trim().to_ascii_lowercase()) {
        Ok(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
        Ok(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
        _ => default,
    }
}

/// Read a string setting; unset or blank values fall back to `default`
fn env_var_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
