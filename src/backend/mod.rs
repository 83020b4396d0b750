//! # Backend
//!
//! Abstract write surface of a vault-like key/value store.
//!
//! - [`VaultExecBackend`] runs `vault` inside a pod through `oc exec`/`kubectl exec`
//! - [`InMemoryBackend`] keeps everything in memory and records an operation log,
//!   used by tests and `--dry-run`
//!
//! Secret material is handed to backends as values or streams, never as part of a
//! command line, and implementations must not log it.

mod command;
mod exec;
mod memory;

pub use command::{display_command, CommandOutput, CommandRunner, RetryPolicy};
pub use exec::VaultExecBackend;
pub use memory::{BackendOp, InMemoryBackend};

use crate::error::BackendError;
use crate::resolver::SecretValue;
use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

/// KV write verb; the first field of a secret is `put`, later ones `patch`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvVerb {
    Put,
    Patch,
}

impl KvVerb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            KvVerb::Put => "put",
            KvVerb::Patch => "patch",
        }
    }
}

impl fmt::Display for KvVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one attribute of a KV secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvTarget<'a> {
    pub mount: &'a str,
    pub prefix: &'a str,
    pub secret: &'a str,
    pub field: &'a str,
}

impl KvTarget<'_> {
    /// Path below the mount: `<prefix>/<secret>`
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.prefix, self.secret)
    }
}

impl fmt::Display for KvTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}:{}", self.mount, self.prefix, self.secret, self.field)
    }
}

/// Backend-side producer whose output becomes the written value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeProducer {
    /// Generate a password from a named password policy
    GeneratePassword { policy: String, base64: bool },
}

impl PipeProducer {
    /// Shell pipeline producing the value inside the vault pod
    #[must_use]
    pub fn script(&self) -> String {
        match self {
            PipeProducer::GeneratePassword { policy, base64 } => {
                let path = format!("sys/policies/password/{policy}/generate");
                let mut script = format!("vault read -field=password {}", quote_arg(&path));
                if *base64 {
                    script.push_str(" | base64 --wrap=0");
                }
                script
            }
        }
    }
}

/// Quote one word of a remote `sh -c` script
///
/// Words made of path-like characters are left alone so the scripts stay
/// readable; anything else is single-quoted.
pub(crate) fn quote_arg(word: &str) -> Cow<'_, str> {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,%".contains(c));
    if safe {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

/// Write operations the injector needs from a backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Install or replace a password policy
    async fn install_policy(&self, name: &str, body: &str) -> Result<(), BackendError>;

    /// Write one attribute with a known value
    async fn kv_write(
        &self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        value: &SecretValue,
    ) -> Result<(), BackendError>;

    /// Whether the attribute is already set; a single, read-only attempt
    async fn kv_field_exists(&self, target: &KvTarget<'_>) -> Result<bool, BackendError>;

    /// Write one attribute from a backend-side producer
    async fn kv_write_from_pipe(
        &self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        producer: &PipeProducer,
    ) -> Result<(), BackendError>;

    /// Upload a local file as one attribute, optionally base64-encoding it on the way
    async fn kv_write_file(
        &self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        path: &Path,
        base64: bool,
    ) -> Result<(), BackendError>;
}
