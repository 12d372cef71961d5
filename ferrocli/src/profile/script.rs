//! Multi-round prompt scripts used by login and lifecycle operations.

use std::time::Duration;

use regex::bytes::Regex;

use super::Mode;

/// An expected confirmation and the answer to give it.
///
/// ```rust
/// use ferrocli::profile::PendingPrompt;
///
/// let confirm = PendingPrompt::new(r"(?i)are you sure\? \(y/n\)", "y").unwrap();
/// assert_eq!(confirm.response, "y");
/// ```
#[derive(Debug, Clone)]
pub struct PendingPrompt {
    /// Pattern matched at the end of the output.
    pub pattern: Regex,

    /// Text sent back (followed by the line terminator unless `raw`).
    pub response: String,

    /// Keep the response out of logs.
    pub hidden: bool,

    /// Send the response without a line terminator (single-key prompts).
    pub raw: bool,
}

impl PendingPrompt {
    /// Create a confirmation answered with `response` + line terminator.
    pub fn new(pattern: &str, response: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            response: response.into(),
            hidden: false,
            raw: false,
        })
    }

    /// Create a confirmation whose answer is secret.
    pub fn hidden(pattern: &str, response: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self::new(pattern, response)?.with_hidden(true))
    }

    /// Mark the response hidden.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Send the response as a bare keystroke.
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// What may be logged for the response.
    pub fn loggable_response(&self) -> &str {
        if self.hidden { "********" } else { &self.response }
    }
}

/// Login dialect.
#[derive(Debug, Clone)]
pub struct LoginScript {
    /// Username prompt.
    pub username_prompt: Regex,

    /// Password prompt.
    pub password_prompt: Regex,

    /// Patterns that mean the credentials were rejected.
    pub access_denied: Vec<Regex>,

    /// Rejections that no retry can fix. Login fails on the first one.
    pub fatal: Vec<Regex>,

    /// Transient banners after which the device should simply be waited on
    /// again ("connection refused, retry", terminal server line busy).
    pub retry_banners: Vec<Regex>,

    /// Dialogs answered during login (setup wizards and the like).
    pub dialogs: Vec<PendingPrompt>,

    /// Retries allowed after a credential rejection.
    pub max_auth_retries: u32,

    /// How many times an idle console is woken with a bare line terminator.
    pub max_nudges: u32,
}

impl Default for LoginScript {
    fn default() -> Self {
        Self {
            username_prompt: Regex::new(r"(?i)(user ?name|login|user)\s*:").unwrap(),
            password_prompt: Regex::new(r"(?i)password\s*:").unwrap(),
            access_denied: vec![
                Regex::new(r"(?i)access denied|authentication failed|login incorrect|% bad passwords?")
                    .unwrap(),
            ],
            fatal: vec![],
            retry_banners: vec![Regex::new(r"(?i)connection refused").unwrap()],
            dialogs: vec![],
            max_auth_retries: 1,
            max_nudges: 3,
        }
    }
}

impl LoginScript {
    /// Add an access-denied pattern.
    pub fn with_access_denied(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.access_denied.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Add a pattern that fails the login without retrying.
    pub fn with_fatal(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.fatal.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Add a retry banner pattern.
    pub fn with_retry_banner(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.retry_banners.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Add a login dialog answer.
    pub fn with_dialog(mut self, dialog: PendingPrompt) -> Self {
        self.dialogs.push(dialog);
        self
    }

    /// Set the number of retries after a credential rejection.
    pub fn with_max_auth_retries(mut self, retries: u32) -> Self {
        self.max_auth_retries = retries;
        self
    }
}

/// Commands that move between modes.
#[derive(Debug, Clone, Default)]
pub struct ModeCommands {
    /// User → Privileged.
    pub enable: Option<String>,

    /// Password prompt that may follow `enable`.
    pub enable_prompt: Option<Regex>,

    /// User → Privileged by logging in again (ASA `login`). Used instead of
    /// `enable` when no enable secret was given.
    pub login_enable: Option<String>,

    /// Privileged → Config.
    pub configure: Option<String>,

    /// Config → Privileged.
    pub exit_config: Option<String>,

    /// Privileged → User.
    pub disable: Option<String>,
}

impl ModeCommands {
    /// Command that moves from `from` one step toward `to`.
    pub fn step(&self, from: Mode, to: Mode) -> Option<&str> {
        match (from, to) {
            (Mode::User, Mode::Privileged) => self.enable.as_deref(),
            (Mode::Privileged, Mode::Config) => self.configure.as_deref(),
            (Mode::Config, Mode::Privileged) => self.exit_config.as_deref(),
            (Mode::Privileged, Mode::User) => self.disable.as_deref(),
            _ => None,
        }
    }
}

/// Output pager.
#[derive(Debug, Clone)]
pub struct Pager {
    /// Pattern of the continuation prompt (`--More--`).
    pub continuation: Regex,

    /// Keystroke that shows the next page. Sent without a line terminator.
    pub dismiss: String,
}

impl Pager {
    /// Create a pager definition.
    pub fn new(continuation: &str, dismiss: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            continuation: Regex::new(continuation)?,
            dismiss: dismiss.into(),
        })
    }
}

/// A save-style lifecycle script: one command, some confirmations, prompt.
#[derive(Debug, Clone)]
pub struct LifecycleScript {
    /// Command that starts the operation.
    pub command: String,

    /// Confirmations that may appear before the prompt returns.
    pub confirmations: Vec<PendingPrompt>,

    /// Mode the command must be issued from.
    pub required_mode: Mode,

    /// Upper bound on answered confirmations.
    pub max_rounds: usize,
}

impl LifecycleScript {
    /// Script issued from privileged mode with no confirmations.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            confirmations: vec![],
            required_mode: Mode::Privileged,
            max_rounds: 4,
        }
    }

    /// Add an expected confirmation.
    pub fn with_confirmation(mut self, prompt: PendingPrompt) -> Self {
        self.confirmations.push(prompt);
        self
    }

    /// Set the mode the command is issued from.
    pub fn with_required_mode(mut self, mode: Mode) -> Self {
        self.required_mode = mode;
        self
    }
}

/// Reload script. After a confirmation is sent the device may drop the
/// connection at any moment.
#[derive(Debug, Clone)]
pub struct ReloadScript {
    /// Reload command (saving first where the device supports it).
    pub command: String,

    /// Reload command that discards unsaved changes.
    pub without_save_command: Option<String>,

    /// Confirmations that may appear.
    pub confirmations: Vec<PendingPrompt>,

    /// Mode the command must be issued from.
    pub required_mode: Mode,

    /// Upper bound on answered confirmations.
    pub max_rounds: usize,

    /// How long to wait for the disconnect once confirmed.
    pub disconnect_grace: Duration,
}

impl ReloadScript {
    /// Script issued from privileged mode with no confirmations.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            without_save_command: None,
            confirmations: vec![],
            required_mode: Mode::Privileged,
            max_rounds: 4,
            disconnect_grace: Duration::from_secs(10),
        }
    }

    /// Set the reload-without-saving command.
    pub fn with_without_save(mut self, command: impl Into<String>) -> Self {
        self.without_save_command = Some(command.into());
        self
    }

    /// Add an expected confirmation.
    pub fn with_confirmation(mut self, prompt: PendingPrompt) -> Self {
        self.confirmations.push(prompt);
        self
    }

    /// Set the disconnect grace period.
    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }
}

/// How to leave the device.
#[derive(Debug, Clone)]
pub struct ExitScript {
    /// Leave config mode first.
    pub leave_config: bool,

    /// Commands sent without waiting for a prompt, in order. When the
    /// session runs through a terminal server these must free the remote
    /// port (an `exit` back to the login banner rather than a bare close).
    pub commands: Vec<String>,

    /// Commands that turn paging back on, run before `commands` with the
    /// prompt awaited after each. Issued from the profile's paging mode.
    pub restore_paging: Vec<String>,

    /// How long to drain output after the last command.
    pub drain: Duration,
}

impl Default for ExitScript {
    fn default() -> Self {
        Self {
            leave_config: true,
            commands: vec!["exit".to_string()],
            restore_paging: vec![],
            drain: Duration::from_millis(500),
        }
    }
}

impl ExitScript {
    /// Exit script sending the given commands.
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add a paging-restore command.
    pub fn with_restore_paging(mut self, command: impl Into<String>) -> Self {
        self.restore_paging.push(command.into());
        self
    }
}
