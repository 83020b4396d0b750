//! # INI Lookup
//!
//! Minimal INI reader for credential files such as `~/.aws/credentials`.
//!
//! - `[section]` headers; keys before the first header are ignored
//! - `key = value` and `key: value`, whitespace trimmed
//! - `#` and `;` comment lines
//! - option names are case-insensitive, section names are not
//! - indented lines continue the previous value
//! - keys in `[DEFAULT]` are visible from every section

use crate::error::ResolutionError;
use indexmap::IndexMap;
use std::path::Path;

const DEFAULT_SECTION: &str = "DEFAULT";

/// A parsed INI document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: IndexMap<String, IndexMap<String, String>>,
}

impl IniDocument {
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut sections: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            // Continuation of a multi-line value
            if raw_line.starts_with([' ', '\t']) {
                if let (Some(section), Some(key)) = (&current, &last_key) {
                    if let Some(value) = sections
                        .get_mut(section)
                        .and_then(|options| options.get_mut(key))
                    {
                        if !value.is_empty() {
                            value.push('\n');
                        }
                        value.push_str(line);
                        continue;
                    }
                }
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                last_key = None;
                continue;
            }

            let Some(section) = &current else {
                continue;
            };

            let split = line.find(['=', ':']).map(|idx| line.split_at(idx));
            if let Some((key, value)) = split {
                let key = key.trim().to_lowercase();
                let value = value[1..].trim().to_string();
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.clone(), value);
                last_key = Some(key);
            }
        }

        Self { sections }
    }

    /// Read and parse an INI file
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] when the file is missing or unreadable.
    pub fn from_file(path: &Path) -> Result<Self, ResolutionError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResolutionError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ResolutionError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Ok(Self::parse(&content))
    }

    /// Look up `key` in `section`; `None` when either is missing
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.sections
            .get(section)?
            .get(&key)
            .or_else(|| {
                self.sections
                    .get(DEFAULT_SECTION)
                    .and_then(|defaults| defaults.get(&key))
            })
            .map(String::as_str)
    }
}
