//! # Logging
//!
//! Tracing subscriber setup for the loader.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! log level applied to this crate. Logs always go to stderr so that compiled
//! output on stdout stays machine-readable.

use crate::config::LoaderConfig;
use tracing_subscriber::EnvFilter;

/// Build the filter for `config`
///
/// Falls back to `secret_manifest_loader=info` when neither `RUST_LOG` nor
/// the configured level parses.
#[must_use]
pub fn env_filter(config: &LoaderConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "secret_manifest_loader={}",
                config.log_level.to_lowercase()
            ))
        })
        .unwrap_or_else(|_| "secret_manifest_loader=info".into())
}

/// Install the global subscriber; does nothing if one is already installed
pub fn init_logging(config: &LoaderConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr);

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.log_enable_color).try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
