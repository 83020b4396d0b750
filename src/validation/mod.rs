//! # Validation
//!
//! Static checks run before anything is resolved or written.
//!
//! Validation is fail-fast: the first violation aborts the run with a message
//! naming the offending secret or field. Nothing here reads file contents or
//! prompts; paths are only checked for existence.

mod field;
mod kubernetes;
mod manifest;
mod secret;

pub use field::validate_field;
pub use kubernetes::validate_kubernetes_namespace;
pub use manifest::{resolve_backing_store, validate_manifest, validate_version};
pub use secret::validate_secret;

use crate::manifest::BackingStore;
use crate::policy::PolicyTable;
use std::collections::{BTreeMap, BTreeSet};

/// What a field needs to know about its surroundings
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Owning secret's name
    pub secret: &'a str,
    pub policies: &'a PolicyTable,
    pub backing_store: BackingStore,
}

/// Manifest-level fallbacks for secrets without their own labels/annotations
#[derive(Debug, Clone, Default)]
pub struct SecretDefaults {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

/// Names appearing more than once, sorted and de-duplicated
pub fn find_dupes<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = BTreeSet::new();
    let mut dupes = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            dupes.insert(name);
        }
    }
    dupes.into_iter().map(str::to_string).collect()
}
