//! # Kubernetes Name Validation
//!
//! Namespaces that rendered Secret objects are placed in must be RFC 1123
//! labels: 1-63 lowercase alphanumerics or hyphens, alphanumeric at both ends.

use anyhow::{ensure, Result};
use regex::Regex;
use std::sync::LazyLock;

const MAX_LABEL_LEN: usize = 63;

static RFC1123_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("RFC 1123 label pattern is valid")
});

/// Check that `namespace` can be used as a Secret's `metadata.namespace`
///
/// # Errors
///
/// Returns the reason the name is rejected.
pub fn validate_kubernetes_namespace(namespace: &str) -> Result<()> {
    ensure!(!namespace.is_empty(), "namespace cannot be empty");
    ensure!(
        namespace.len() <= MAX_LABEL_LEN,
        "namespace is {} characters long, the limit is {MAX_LABEL_LEN}",
        namespace.len()
    );
    ensure!(
        RFC1123_LABEL.is_match(namespace),
        "only lowercase alphanumerics and '-' are allowed, starting and ending with an alphanumeric"
    );
    Ok(())
}
