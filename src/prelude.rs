//! Commonly used types, for `use secret_manifest_loader::prelude::*`.

pub use crate::backend::{
    BackendClient, BackendOp, InMemoryBackend, KvTarget, KvVerb, PipeProducer, VaultExecBackend,
};
pub use crate::compiler::{CompiledManifest, CompiledSecret, SecretCompiler};
pub use crate::config::LoaderConfig;
pub use crate::error::{
    BackendError, ConfigError, DuplicateError, LoaderError, ResolutionError, SpecError,
};
pub use crate::injector::Injector;
pub use crate::manifest::{load_manifest_file, load_manifest_str, BackingStore, RawManifest};
pub use crate::policy::PolicyTable;
pub use crate::resolver::{ScriptedPrompter, SecretPrompter, SecretValue, TerminalPrompter};
pub use crate::validation::validate_manifest;
