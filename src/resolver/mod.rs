//! # Value Resolution
//!
//! Turns a validated field into a concrete value.
//!
//! | source      | `error`            | `prompt`                 | `generate`     |
//! |-------------|--------------------|--------------------------|----------------|
//! | `value`/unset | literal (unescaped) | masked prompt, default shown | deferred |
//! | `path`      | file content       | prompt for path, then read | -            |
//! | `ini_file`  | INI lookup         | INI lookup               | -              |
//!
//! File content is decoded as UTF-8 when possible and kept as raw bytes
//! otherwise. The `base64` transform runs after resolution.

mod ini;
mod prompt;

pub use ini::IniDocument;
pub use prompt::{ScriptedPrompter, SecretPrompter, TerminalPrompter};

use crate::constants::DEFAULT_VAULT_POLICY_NAME;
use crate::error::ResolutionError;
use crate::manifest::{expand_path, FieldSource, FieldSpec, IniRef, OnMissingValue};
use crate::policy::unescape;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use prompt::{path_prompt_text, value_prompt_text};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A resolved secret value
///
/// Serialises as a plain string for text and as a byte list for binary
/// content, so compiled output can be read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretValue {
    Text(String),
    Binary(Vec<u8>),
}

impl SecretValue {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SecretValue::Text(s) => s.as_bytes(),
            SecretValue::Binary(b) => b,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SecretValue::Text(s) => Some(s),
            SecretValue::Binary(_) => None,
        }
    }

    /// Base64-encode the raw bytes; the result is always text
    #[must_use]
    pub fn to_base64(&self) -> SecretValue {
        SecretValue::Text(STANDARD.encode(self.as_bytes()))
    }

    /// Decode file content, falling back to raw bytes for non-UTF-8 data
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => SecretValue::Text(text),
            Err(err) => SecretValue::Binary(err.into_bytes()),
        }
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        SecretValue::Text(value.to_string())
    }
}

/// Outcome of resolving one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Literal or prompted value
    Value(Option<SecretValue>),
    /// File content read from `path`
    File { path: PathBuf, content: SecretValue },
    /// INI lookup; `value` is `None` when the section or key is missing
    Ini {
        reference: IniRef,
        value: Option<SecretValue>,
    },
    /// Generated by the backend at injection time
    Deferred { vault_policy: String },
}

/// Resolves fields, prompting through a [`SecretPrompter`] when asked to
pub struct ValueResolver<'p> {
    prompter: &'p mut dyn SecretPrompter,
}

impl std::fmt::Debug for ValueResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueResolver").finish_non_exhaustive()
    }
}

impl<'p> ValueResolver<'p> {
    pub fn new(prompter: &'p mut dyn SecretPrompter) -> Self {
        Self { prompter }
    }

    /// Resolve `field` of secret `secret`
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] when a file vanished since validation, a
    /// prompted path does not exist, or prompting is unavailable.
    pub fn resolve(&mut self, secret: &str, field: &FieldSpec) -> Result<Resolved, ResolutionError> {
        let resolved = match (&field.source, field.on_missing_value) {
            (FieldSource::Unset | FieldSource::Literal(_), OnMissingValue::Generate) => {
                return Ok(Resolved::Deferred {
                    vault_policy: field
                        .vault_policy
                        .clone()
                        .unwrap_or_else(|| DEFAULT_VAULT_POLICY_NAME.to_string()),
                });
            }
            (FieldSource::IniRef(reference), _) => {
                let mut reference = reference.clone();
                reference.file = reference.expanded_file().display().to_string();
                let value = IniDocument::from_file(Path::new(&reference.file))?
                    .get(&reference.section, &reference.key)
                    .map(SecretValue::from);
                Resolved::Ini { reference, value }
            }
            (FieldSource::Path(path), OnMissingValue::Prompt) => {
                let path = self.prompt_for_path(secret, field, path.as_deref())?;
                let content = read_content(&path)?;
                Resolved::File { path, content }
            }
            (FieldSource::Path(path), _) => {
                let path = expand_path(path.as_deref().unwrap_or_default());
                let content = read_content(&path)?;
                Resolved::File { path, content }
            }
            (FieldSource::Literal(default), OnMissingValue::Prompt) => {
                Resolved::Value(Some(self.prompt_for_value(secret, field, default.as_deref())?))
            }
            (FieldSource::Unset, OnMissingValue::Prompt) => {
                Resolved::Value(Some(self.prompt_for_value(secret, field, None)?))
            }
            (FieldSource::Literal(value), _) => {
                Resolved::Value(value.as_deref().map(|v| SecretValue::Text(unescape(v))))
            }
            (FieldSource::Unset, _) => Resolved::Value(None),
        };

        debug!(
            secret,
            field = %field.name,
            kind = field.source.kind(),
            base64 = field.base64,
            "Resolved field"
        );

        Ok(if field.base64 {
            encode(resolved)
        } else {
            resolved
        })
    }

    fn prompt_for_value(
        &mut self,
        secret: &str,
        field: &FieldSpec,
        default: Option<&str>,
    ) -> Result<SecretValue, ResolutionError> {
        let text = value_prompt_text(secret, &field.name, field.prompt.as_deref(), default);
        let mut answer = self.prompter.prompt(&text)?;
        if answer.is_empty() {
            return Ok(SecretValue::Text(default.unwrap_or_default().to_string()));
        }
        // Move the buffer out instead of copying it
        Ok(SecretValue::Text(std::mem::take(&mut *answer)))
    }

    fn prompt_for_path(
        &mut self,
        secret: &str,
        field: &FieldSpec,
        default: Option<&str>,
    ) -> Result<PathBuf, ResolutionError> {
        let default = default.unwrap_or_default();
        let text = path_prompt_text(secret, &field.name, field.prompt.as_deref(), default);
        let answer = self.prompter.prompt(&text)?;
        let chosen = if answer.is_empty() { default } else { answer.as_str() };

        let path = expand_path(chosen);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ResolutionError::FileNotFound {
                path: PathBuf::from(chosen),
            })
        }
    }
}

fn read_content(path: &Path) -> Result<SecretValue, ResolutionError> {
    let bytes = std::fs::read(path).map_err(|source| {
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
    Ok(SecretValue::from_bytes(bytes))
}

fn encode(resolved: Resolved) -> Resolved {
    match resolved {
        Resolved::Value(value) => Resolved::Value(value.as_ref().map(SecretValue::to_base64)),
        Resolved::File { path, content } => Resolved::File {
            path,
            content: content.to_base64(),
        },
        Resolved::Ini { reference, value } => Resolved::Ini {
            reference,
            value: value.as_ref().map(SecretValue::to_base64),
        },
        deferred @ Resolved::Deferred { .. } => deferred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn spec(source: FieldSource, on_missing_value: OnMissingValue) -> FieldSpec {
        FieldSpec {
            name: "secret".to_string(),
            source,
            on_missing_value,
            base64: false,
            override_existing: false,
            vault_policy: None,
            prompt: None,
        }
    }

    fn resolve(field: &FieldSpec, answers: &[&str]) -> (Result<Resolved, ResolutionError>, Vec<String>) {
        let mut prompter = ScriptedPrompter::new(answers.iter().copied());
        let result = ValueResolver::new(&mut prompter).resolve("config-demo", field);
        (result, prompter.asked().to_vec())
    }

    #[test]
    fn test_literal_value_is_unescaped() {
        let field = spec(
            FieldSource::Literal(Some("line1\\nline2".to_string())),
            OnMissingValue::Error,
        );
        let (result, asked) = resolve(&field, &[]);
        assert_eq!(
            result.unwrap(),
            Resolved::Value(Some(SecretValue::Text("line1\nline2".to_string())))
        );
        assert!(asked.is_empty());
    }

    #[test]
    fn test_base64_round_trip() {
        let mut field = spec(
            FieldSource::Literal(Some("demo123".to_string())),
            OnMissingValue::Error,
        );
        field.base64 = true;
        let (result, _) = resolve(&field, &[]);
        let Resolved::Value(Some(SecretValue::Text(encoded))) = result.unwrap() else {
            panic!("expected an encoded text value");
        };
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"demo123");
    }

    #[test]
    fn test_generate_is_deferred() {
        let mut field = spec(FieldSource::Unset, OnMissingValue::Generate);
        field.vault_policy = Some("basicPolicy".to_string());
        field.base64 = true;
        let (result, _) = resolve(&field, &[]);
        assert_eq!(
            result.unwrap(),
            Resolved::Deferred {
                vault_policy: "basicPolicy".to_string()
            }
        );
    }

    #[test]
    fn test_prompt_uses_answer_or_default() {
        let field = spec(
            FieldSource::Literal(Some("changeme".to_string())),
            OnMissingValue::Prompt,
        );
        let (result, asked) = resolve(&field, &["s3cr3t"]);
        assert_eq!(
            result.unwrap(),
            Resolved::Value(Some(SecretValue::from("s3cr3t")))
        );
        assert_eq!(asked, vec!["Type secret for config-demo/secret [changeme]: ".to_string()]);

        let (result, _) = resolve(&field, &[""]);
        assert_eq!(
            result.unwrap(),
            Resolved::Value(Some(SecretValue::from("changeme")))
        );
    }

    #[test]
    fn test_prompt_without_input_fails() {
        let field = spec(FieldSource::Literal(None), OnMissingValue::Prompt);
        let (result, _) = resolve(&field, &[]);
        assert!(matches!(
            result.unwrap_err(),
            ResolutionError::PromptUnavailable(_)
        ));
    }

    #[test]
    fn test_text_file_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "-----BEGIN CERTIFICATE-----").unwrap();
        let field = spec(
            FieldSource::Path(Some(file.path().display().to_string())),
            OnMissingValue::Error,
        );
        let (result, _) = resolve(&field, &[]);
        match result.unwrap() {
            Resolved::File { path, content } => {
                assert_eq!(path, file.path());
                assert_eq!(content, SecretValue::from("-----BEGIN CERTIFICATE-----"));
            }
            other => panic!("expected file content, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_file_content_and_base64() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0x00, 0x01]).unwrap();
        let mut field = spec(
            FieldSource::Path(Some(file.path().display().to_string())),
            OnMissingValue::Error,
        );
        let (result, _) = resolve(&field, &[]);
        let Resolved::File { content, .. } = result.unwrap() else {
            panic!("expected file content");
        };
        assert_eq!(content, SecretValue::Binary(vec![0xff, 0xfe, 0x00, 0x01]));

        field.base64 = true;
        let (result, _) = resolve(&field, &[]);
        let Resolved::File { content, .. } = result.unwrap() else {
            panic!("expected file content");
        };
        assert_eq!(content, SecretValue::from("//4AAQ=="));
    }

    #[test]
    fn test_prompted_path_falls_back_to_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let default = file.path().display().to_string();
        let field = spec(FieldSource::Path(Some(default.clone())), OnMissingValue::Prompt);
        let (result, asked) = resolve(&field, &[""]);
        assert!(matches!(result.unwrap(), Resolved::File { .. }));
        assert_eq!(
            asked,
            vec![format!("Type path for file config-demo/secret [{default}]: ")]
        );
    }

    #[test]
    fn test_prompted_path_must_exist() {
        let field = spec(FieldSource::Path(None), OnMissingValue::Prompt);
        let (result, _) = resolve(&field, &["/nonexistent/ca.crt"]);
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "File /nonexistent/ca.crt not found, exiting");
    }

    #[test]
    fn test_ini_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[default]\naws_access_key_id = A123456789012345678A").unwrap();
        let reference = IniRef {
            file: file.path().display().to_string(),
            section: "default".to_string(),
            key: "aws_access_key_id".to_string(),
        };
        let field = spec(FieldSource::IniRef(reference.clone()), OnMissingValue::Error);
        let (result, _) = resolve(&field, &[]);
        assert_eq!(
            result.unwrap(),
            Resolved::Ini {
                reference: reference.clone(),
                value: Some(SecretValue::from("A123456789012345678A")),
            }
        );

        let missing = spec(
            FieldSource::IniRef(IniRef {
                key: "nonexisting".to_string(),
                ..reference
            }),
            OnMissingValue::Error,
        );
        let (result, _) = resolve(&missing, &[]);
        assert!(matches!(result.unwrap(), Resolved::Ini { value: None, .. }));
    }
}
