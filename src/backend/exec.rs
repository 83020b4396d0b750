//! # Vault Exec Backend
//!
//! Drives the `vault` CLI inside the vault pod:
//!
//! ```text
//! oc exec -n <namespace> <pod> -i -- sh -c '<script>'
//! ```
//!
//! Values and file contents travel on stdin (`field=-`, `cat -`), so they
//! never show up in a process list or in error messages.

use super::command::CommandRunner;
use super::{quote_arg, BackendClient, KvTarget, KvVerb, PipeProducer};
use crate::config::LoaderConfig;
use crate::constants::VAULT_UPLOAD_SCRATCH_PATH;
use crate::error::BackendError;
use crate::resolver::SecretValue;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Backend that execs into a running vault pod
#[derive(Debug, Clone)]
pub struct VaultExecBackend {
    exec_binary: PathBuf,
    namespace: String,
    pod: String,
    runner: CommandRunner,
}

impl VaultExecBackend {
    /// Locate the exec binary on `PATH` and build a backend from `config`
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ToolNotFound`] if the exec binary is not installed.
    pub fn from_config(config: &LoaderConfig) -> Result<Self, BackendError> {
        let exec_binary =
            which::which(&config.exec_binary).map_err(|source| BackendError::ToolNotFound {
                tool: config.exec_binary.clone(),
                source,
            })?;
        debug!(exec_binary = %exec_binary.display(), "Found exec binary");

        Ok(Self::new(
            exec_binary,
            config.vault_namespace.clone(),
            config.vault_pod.clone(),
            CommandRunner::new(super::RetryPolicy::new(
                config.command_attempts,
                config.command_retry_sleep_duration(),
            )),
        ))
    }

    #[must_use]
    pub fn new(
        exec_binary: PathBuf,
        namespace: String,
        pod: String,
        runner: CommandRunner,
    ) -> Self {
        Self {
            exec_binary,
            namespace,
            pod,
            runner,
        }
    }

    /// Arguments running `script` through `sh -c` in the pod
    fn exec_args(&self, script: &str) -> Vec<String> {
        [
            "exec",
            "-n",
            self.namespace.as_str(),
            self.pod.as_str(),
            "-i",
            "--",
            "sh",
            "-c",
            script,
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }

    async fn run(&self, script: &str, stdin: Option<&[u8]>) -> Result<(), BackendError> {
        self.runner
            .run(&self.exec_binary, &self.exec_args(script), stdin)
            .await
            .map(|_| ())
    }
}

/// `vault kv <verb> -mount=<mount> <prefix>/<secret> <field>=<source>`
fn kv_command(target: &KvTarget<'_>, verb: KvVerb, source: &str) -> String {
    format!(
        "vault kv {verb} {} {} {}",
        quote_arg(&format!("-mount={}", target.mount)),
        quote_arg(&target.path()),
        quote_arg(&format!("{}={source}", target.field)),
    )
}

fn policy_command(name: &str) -> String {
    format!(
        "vault write {} policy=-",
        quote_arg(&format!("sys/policies/password/{name}"))
    )
}

fn exists_command(target: &KvTarget<'_>) -> String {
    format!(
        "vault kv get {} {} {}",
        quote_arg(&format!("-mount={}", target.mount)),
        quote_arg(&format!("-field={}", target.field)),
        quote_arg(&target.path()),
    )
}

fn upload_command(target: &KvTarget<'_>, verb: KvVerb, base64: bool) -> String {
    let encode = if base64 { " | base64 --wrap=0" } else { "" };
    let scratch = VAULT_UPLOAD_SCRATCH_PATH;
    format!(
        "cat -{encode} > {scratch}; {}; rm -f {scratch}",
        kv_command(target, verb, &format!("@{scratch}"))
    )
}

#[async_trait]
impl BackendClient for VaultExecBackend {
    async fn install_policy(&self, name: &str, body: &str) -> Result<(), BackendError> {
        debug!(policy = name, "Installing password policy");
        self.run(&policy_command(name), Some(body.as_bytes())).await
    }

    async fn kv_write(
        &self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        value: &SecretValue,
    ) -> Result<(), BackendError> {
        debug!(%target, %verb, "Writing field");
        self.run(&kv_command(target, verb, "-"), Some(value.as_bytes()))
            .await
    }

    async fn kv_field_exists(&self, target: &KvTarget<'_>) -> Result<bool, BackendError> {
        let output = self
            .runner
            .run_once(&self.exec_binary, &self.exec_args(&exists_command(target)), None)
            .await?;
        debug!(%target, exists = output.success(), "Probed field");
        Ok(output.success())
    }

    async fn kv_write_from_pipe(
        &self,
        target: &KvTarget<'_>,
        verb: KvVerb,
        producer: &PipeProducer,
    ) -> Result<(), BackendError> {
        debug!(%target, %verb, "Writing generated field");
        let script = format!("{} | {}", producer.script(), kv_command(target, verb, "-"));
        self.run(&script, None).await
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
        debug!(%target, %verb, file = %path.display(), bytes = content.len(), "Uploading file");
        self.run(&upload_command(target, verb, base64), Some(&content))
            .await
    }
}
