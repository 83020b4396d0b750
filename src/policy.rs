//! # Vault Password Policies
//!
//! The policy table maps policy names to vault password-policy bodies. It is
//! seeded from [`DEFAULT_VAULT_POLICIES`](crate::constants::DEFAULT_VAULT_POLICIES)
//! and overlaid with the manifest's `vaultPolicies`, so a manifest can redefine
//! the built-in policy under its own name.

use crate::constants::DEFAULT_VAULT_POLICIES;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name to policy-body table, read-only once built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyTable(IndexMap<String, String>);

impl PolicyTable {
    /// Build a table from a set of built-in policies and user overrides
    ///
    /// User bodies go through [`unescape`] so that escaped newlines written in
    /// flow scalars end up as real newlines.
    pub fn new<'a, I>(builtin: &[(&str, &str)], user: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut policies: IndexMap<String, String> = builtin
            .iter()
            .map(|(name, body)| ((*name).to_string(), (*body).to_string()))
            .collect();
        for (name, body) in user {
            policies.insert(name.to_string(), unescape(body));
        }
        Self(policies)
    }

    /// Built-in defaults overlaid with `user`
    pub fn with_defaults<'a, I>(user: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::new(DEFAULT_VAULT_POLICIES, user)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Policies in insertion order, built-ins first
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Decode backslash escapes in a manifest literal
///
/// Handles `\n`, `\t`, `\r`, `\\`, `\"`, `\'`, `\0`, `\xHH` and `\uXXXX`.
/// Unknown or truncated escapes are kept verbatim.
#[must_use]
pub fn unescape(input: &str) -> String {
    if !input.contains('\\') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => push_and_skip(&mut out, &mut chars, '\n'),
            Some('t') => push_and_skip(&mut out, &mut chars, '\t'),
            Some('r') => push_and_skip(&mut out, &mut chars, '\r'),
            Some('0') => push_and_skip(&mut out, &mut chars, '\0'),
            Some('\\') => push_and_skip(&mut out, &mut chars, '\\'),
            Some('"') => push_and_skip(&mut out, &mut chars, '"'),
            Some('\'') => push_and_skip(&mut out, &mut chars, '\''),
            Some(marker @ ('x' | 'u')) => {
                let width = if marker == 'x' { 2 } else { 4 };
                let digits: String = chars.clone().skip(1).take(width).collect();
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..=width {
                            chars.next();
                        }
                    }
                    None => out.push('\\'),
                }
            }
            _ => out.push('\\'),
        }
    }
    out
}

fn push_and_skip(
    out: &mut String,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    decoded: char,
) {
    out.push(decoded);
    chars.next();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_VAULT_POLICY_BODY, DEFAULT_VAULT_POLICY_NAME};

    #[test]
    fn test_default_table_contains_builtin_policy() {
        let table = PolicyTable::with_defaults(std::iter::empty());
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(DEFAULT_VAULT_POLICY_NAME),
            Some(DEFAULT_VAULT_POLICY_BODY)
        );
        assert!(DEFAULT_VAULT_POLICY_BODY.starts_with("length=20\n"));
    }

    #[test]
    fn test_user_policy_overrides_builtin() {
        let table =
            PolicyTable::with_defaults([(DEFAULT_VAULT_POLICY_NAME, "length=8")]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(DEFAULT_VAULT_POLICY_NAME), Some("length=8"));
    }

    #[test]
    fn test_user_policy_bodies_are_unescaped() {
        let table = PolicyTable::with_defaults([("basicPolicy", "length=10\\nrule")]);
        assert_eq!(table.get("basicPolicy"), Some("length=10\nrule"));
        let names: Vec<&str> = table.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec![DEFAULT_VAULT_POLICY_NAME, "basicPolicy"]);
    }

    #[test]
    fn test_isolated_table_without_builtins() {
        let table = PolicyTable::new(&[], [("only", "length=5")]);
        assert!(!table.contains(DEFAULT_VAULT_POLICY_NAME));
        assert!(table.contains("only"));
    }

    #[test]
    fn test_unescape_common_sequences() {
        assert_eq!(unescape(r"a\nb\tc"), "a\nb\tc");
        assert_eq!(unescape(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(unescape(r"back\\slash"), "back\\slash");
        assert_eq!(unescape(r"\x41é"), "Aé");
    }

    #[test]
    fn test_unescape_keeps_unknown_and_truncated_escapes() {
        assert_eq!(unescape(r"\q"), r"\q");
        assert_eq!(unescape(r"\x4"), r"\x4");
        assert_eq!(unescape("trailing\\"), "trailing\\");
        assert_eq!(unescape("plain"), "plain");
    }
}
