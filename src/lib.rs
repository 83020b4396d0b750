//! # Secret Manifest Loader
//!
//! Compiles values-secret manifests and injects them into a secret store.
//!
//! The pipeline runs in three stages:
//!
//! 1. **Validation** ([`validation`]): structural rules over the manifest,
//!    its secrets and their fields. Nothing is read or prompted yet.
//! 2. **Compilation** ([`compiler`]): every field is resolved in declaration
//!    order (literal, file, INI lookup, prompt, or deferred generation) into
//!    [`compiler::CompiledSecret`] records and rendered Kubernetes Secrets.
//! 3. **Injection** ([`injector`]): compiled records are written into a
//!    [`backend::BackendClient`], installing password policies first.
//!
//! ```no_run
//! use secret_manifest_loader::prelude::*;
//!
//! # async fn run() -> Result<(), LoaderError> {
//! let raw = load_manifest_file(std::path::Path::new("values-secret.yaml")).await?;
//! let mut prompter = TerminalPrompter;
//! let compiled = SecretCompiler::new(&mut prompter).compile(&raw)?;
//!
//! let backend = InMemoryBackend::new();
//! let count = Injector::new(&backend).inject_compiled(&compiled).await?;
//! println!("{count} secrets injected");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod error;
pub mod injector;
pub mod logging;
pub mod manifest;
pub mod policy;
pub mod prelude;
pub mod resolver;
pub mod validation;
