//! # In-Memory Backend
//!
//! Behaves like a KV v2 mount closely enough for the injector: `put` replaces
//! the whole secret, `patch` merges into an existing one and fails when there
//! is nothing to patch. Every call is recorded in an operation log that holds
//! names and paths only.

use super::{BackendClient, KvTarget, KvVerb, PipeProducer};
use crate::error::BackendError;
use crate::resolver::SecretValue;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    InstallPolicy {
        name: String,
    },
    KvWrite {
        verb: KvVerb,
        path: String,
        field: String,
    },
    KvFieldExists {
        path: String,
        field: String,
        exists: bool,
    },
    KvWriteFromPipe {
        verb: KvVerb,
        path: String,
        field: String,
        script: String,
    },
    KvWriteFile {
        verb: KvVerb,
        path: String,
        field: String,
        source: PathBuf,
        base64: bool,
    },
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendOp::InstallPolicy { name } => write!(f, "policy {name}"),
            BackendOp::KvWrite { verb, path, field } => write!(f, "{verb} {path} {field}"),
            BackendOp::KvFieldExists {
                path,
                field,
                exists,
            } => write!(f, "exists {path} {field} -> {exists}"),
            BackendOp::KvWriteFromPipe {
                verb, path, field, ..
            } => write!(f, "{verb} {path} {field} (generated)"),
            BackendOp::KvWriteFile {
                verb,
                path,
                field,
                source,
                base64,
            } => {
                write!(f, "{verb} {path} {field} (file {}", source.display())?;
                if *base64 {
                    f.write_str(", base64")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    policies: IndexMap<String, String>,
    /// `<mount>/<prefix>/<secret>` to attributes
    secrets: IndexMap<String, IndexMap<String, SecretValue>>,
    ops: Vec<BackendOp>,
    generated: u64,
}

impl MemoryState {
    fn store(
        &mut self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        value: SecretValue,
    ) -> Result<(), BackendError> {
        let key = storage_key(target);
        match verb {
            KvVerb::Put => {
                self.secrets
                    .insert(key, IndexMap::from([(target.field.to_string(), value)]));
            }
            KvVerb::Patch => {
                let existing =
                    self.secrets
                        .get_mut(&key)
                        .ok_or_else(|| BackendError::Rejected {
                            path: key.clone(),
                            reason: "no existing secret to patch".to_string(),
                        })?;
                existing.insert(target.field.to_string(), value);
            }
        }
        Ok(())
    }
}

fn storage_key(target: &KvTarget<'_>) -> String {
    format!("{}/{}", target.mount, target.path())
}

/// Backend holding everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an attribute without recording an operation
    pub async fn seed(&self, target: &KvTarget<'_>, value: SecretValue) {
        let mut state = self.state.lock().await;
        state
            .secrets
            .entry(storage_key(target))
            .or_default()
            .insert(target.field.to_string(), value);
    }

    /// Recorded operations, oldest first
    pub async fn ops(&self) -> Vec<BackendOp> {
        self.state.lock().await.ops.clone()
    }

    /// Stored value of one attribute
    pub async fn get(&self, target: &KvTarget<'_>) -> Option<SecretValue> {
        self.state
            .lock()
            .await
            .secrets
            .get(&storage_key(target))
            .and_then(|attrs| attrs.get(target.field))
            .cloned()
    }

    /// Installed body of a password policy
    pub async fn policy(&self, name: &str) -> Option<String> {
        self.state.lock().await.policies.get(name).cloned()
    }

    /// How many passwords have been generated
    pub async fn generated_count(&self) -> u64 {
        self.state.lock().await.generated
    }
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    async fn install_policy(&self, name: &str, body: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.policies.insert(name.to_string(), body.to_string());
        state.ops.push(BackendOp::InstallPolicy {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn kv_write(
        &self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        value: &SecretValue,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.ops.push(BackendOp::KvWrite {
            verb,
            path: target.path(),
            field: target.field.to_string(),
        });
        state.store(target, verb, value.clone())
    }

    async fn kv_field_exists(&self, target: &KvTarget<'_>) -> Result<bool, BackendError> {
        let mut state = self.state.lock().await;
        let exists = state
            .secrets
            .get(&storage_key(target))
            .is_some_and(|attrs| attrs.contains_key(target.field));
        state.ops.push(BackendOp::KvFieldExists {
            path: target.path(),
            field: target.field.to_string(),
            exists,
        });
        Ok(exists)
    }

    async fn kv_write_from_pipe(
        &self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        producer: &PipeProducer,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.ops.push(BackendOp::KvWriteFromPipe {
            verb,
            path: target.path(),
            field: target.field.to_string(),
            script: producer.script(),
        });

        let PipeProducer::GeneratePassword { policy, base64 } = producer;
        if !state.policies.contains_key(policy) {
            return Err(BackendError::Rejected {
                path: storage_key(target),
                reason: format!("password policy {policy} is not installed"),
            });
        }
        state.generated += 1;
        let password = SecretValue::Text(format!("generated-{policy}-{}", state.generated));
        let value = if *base64 {
            password.to_base64()
        } else {
            password
        };
        state.store(target, verb, value)
    }

    async fn kv_write_file(
        &self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        path: &Path,
        base64: bool,
    ) -> Result<(), BackendError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|source| BackendError::UploadSource {
                path: path.to_path_buf(),
                source,
            })?;
        let value = SecretValue::from_bytes(content);
        let value = if base64 { value.to_base64() } else { value };

        let mut state = self.state.lock().await;
        state.ops.push(BackendOp::KvWriteFile {
            verb,
            path: target.path(),
            field: target.field.to_string(),
            source: path.to_path_buf(),
            base64,
        });
        state.store(target, verb, value)
    }
}
