//! Result type for command execution.

use std::fmt;
use std::time::Duration;

use crate::profile::Mode;

/// Outcome of one command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// The command that was executed.
    pub command: String,

    /// Cleaned output: no echo line, no trailing prompt, no pager
    /// artefacts, `\n` line endings.
    pub text: String,

    /// Everything received for the command, after escape stripping.
    pub raw: String,

    /// The prompt that ended the command.
    pub prompt: String,

    /// Mode the device was left in.
    pub mode: Mode,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// Number of pager screens dismissed.
    pub continuations: usize,

    /// Failure substring found in the output, if any.
    pub failure_message: Option<String>,
}

impl CommandResult {
    /// Whether at least one pager screen was dismissed.
    pub fn continuation_handled(&self) -> bool {
        self.continuations > 0
    }

    /// Check if no failure substring was found.
    pub fn is_success(&self) -> bool {
        self.failure_message.is_none()
    }

    /// Get the output lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    /// Check if the output contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.text.contains(pattern)
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
