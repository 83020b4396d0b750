//! # Secret Prompting
//!
//! Interactive input behind the [`SecretPrompter`] capability, so the resolver
//! never talks to a terminal directly.

use crate::error::ResolutionError;
use std::collections::VecDeque;
use zeroize::Zeroizing;

/// Source of interactively entered values
pub trait SecretPrompter {
    /// Show `text` and return the entered line, wiped from memory on drop
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::PromptUnavailable`] when there is no
    /// interactive source (closed stdin, no terminal, exhausted script).
    fn prompt(&mut self, text: &str) -> Result<Zeroizing<String>, ResolutionError>;
}

/// Reads masked input from the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl SecretPrompter for TerminalPrompter {
    fn prompt(&mut self, text: &str) -> Result<Zeroizing<String>, ResolutionError> {
        let mut answer = Zeroizing::new(
            rpassword::prompt_password(text)
                .map_err(|e| ResolutionError::PromptUnavailable(e.to_string()))?,
        );
        let len = answer.trim_end_matches(['\r', '\n']).len();
        answer.truncate(len);
        Ok(answer)
    }
}

/// Answers prompts from a fixed script, for tests and non-interactive runs
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Prompt texts shown so far, in order
    #[must_use]
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl SecretPrompter for ScriptedPrompter {
    fn prompt(&mut self, text: &str) -> Result<Zeroizing<String>, ResolutionError> {
        self.asked.push(text.to_string());
        self.answers
            .pop_front()
            .map(Zeroizing::new)
            .ok_or_else(|| ResolutionError::PromptUnavailable("EOF".to_string()))
    }
}

/// Prompt text for a value
pub(crate) fn value_prompt_text(
    secret: &str,
    field: &str,
    custom: Option<&str>,
    default: Option<&str>,
) -> String {
    let mut text = custom.map_or_else(|| format!("Type secret for {secret}/{field}"), str::to_string);
    if let Some(default) = default {
        text.push_str(&format!(" [{default}]"));
    }
    text.push_str(": ");
    text
}

/// Prompt text for a file path; the default is always shown, possibly empty
pub(crate) fn path_prompt_text(
    secret: &str,
    field: &str,
    custom: Option<&str>,
    default: &str,
) -> String {
    let base = custom.map_or_else(
        || format!("Type path for file {secret}/{field}"),
        str::to_string,
    );
    format!("{base} [{default}]: ")
}
