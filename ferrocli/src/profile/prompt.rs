//! Prompt pattern definition.

use regex::bytes::Regex;

use super::Mode;

/// A prompt pattern and the mode it identifies.
///
/// Several modes often share a terminator (`#` for both privileged and
/// config on Cisco-like CLIs); `not_contains` disambiguates them.
#[derive(Debug, Clone)]
pub struct PromptPattern {
    /// Mode this prompt belongs to.
    pub mode: Mode,

    /// Regex matched against the last line of output.
    pub pattern: Regex,

    /// Strings that must NOT be in the prompt line for this pattern to match.
    pub not_contains: Vec<String>,
}

impl PromptPattern {
    /// Create a prompt pattern for a mode.
    pub fn new(mode: Mode, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            mode,
            pattern: Regex::new(pattern)?,
            not_contains: vec![],
        })
    }

    /// Add a not_contains string.
    pub fn with_not_contains(mut self, text: impl Into<String>) -> Self {
        self.not_contains.push(text.into());
        self
    }

    /// Whether a `not_contains` string rules this pattern out for `line`.
    pub fn excludes(&self, line: &str) -> bool {
        self.not_contains.iter().any(|nc| line.contains(nc.as_str()))
    }

    /// The pattern source text.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}
