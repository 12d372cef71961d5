//! Device profile: everything the session needs to know about a dialect.

use std::collections::HashMap;
use std::time::Duration;

use regex::bytes::Regex;

use super::Mode;
use super::prompt::PromptPattern;
use super::script::{ExitScript, LifecycleScript, LoginScript, ModeCommands, Pager, ReloadScript};
use crate::error::ProfileError;

/// Timing defaults for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Overall deadline for one command.
    pub command: Duration,

    /// Overall deadline for login.
    pub login: Duration,

    /// Upper bound on a single `read_available` poll.
    pub poll_interval: Duration,

    /// Quiet window before trusting a prompt followed by whitespace.
    pub quiescence: Duration,

    /// Deadline for `save_config`.
    pub save: Duration,

    /// Deadline for `reload_device` up to the confirmation.
    pub reload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(30),
            login: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            quiescence: Duration::from_millis(200),
            save: Duration::from_secs(120),
            reload: Duration::from_secs(60),
        }
    }
}

/// Immutable description of one device family's CLI dialect.
///
/// Profiles are plain data: the session is a single implementation
/// parameterized by whichever profile it is given.
///
/// # Example
///
/// ```rust
/// use ferrocli::profile::{DeviceProfile, Mode, Pager, PromptPattern};
///
/// let profile = DeviceProfile::new("lab")
///     .with_prompt(PromptPattern::new(Mode::User, r"device>").unwrap())
///     .with_prompt(PromptPattern::new(Mode::Privileged, r"device#").unwrap())
///     .with_enable("enable")
///     .with_pager(Pager::new(r"--More--", " ").unwrap());
///
/// profile.validate().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    /// Profile identifier (e.g., "adtran_aos").
    pub name: String,

    /// Prompt patterns, most specific first.
    pub prompts: Vec<PromptPattern>,

    /// Login dialect.
    pub login: LoginScript,

    /// Mode transition commands.
    pub transitions: ModeCommands,

    /// Output pager, if the device pages.
    pub pager: Option<Pager>,

    /// Commands that turn paging off. Failures are tolerated.
    pub paging_disable: Vec<String>,

    /// Mode the paging commands must be issued from. When set, the session
    /// walks there first and skips paging control if it cannot.
    pub paging_mode: Option<Mode>,

    /// Commands run right after login, before paging control.
    pub setup_commands: Vec<String>,

    /// Save-configuration script.
    pub save: Option<LifecycleScript>,

    /// Reload script.
    pub reload: Option<ReloadScript>,

    /// Graceful exit script.
    pub exit: ExitScript,

    /// Substrings that mark a command as failed.
    pub failed_when_contains: Vec<String>,

    /// Line terminator override. The transport's own is used otherwise.
    pub line_terminator: Option<String>,

    /// Timing defaults.
    pub timeouts: Timeouts,

    /// Pager pages tolerated per command.
    pub max_continuations: usize,
}

impl DeviceProfile {
    /// Create a profile with minimal required fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompts: vec![],
            login: LoginScript::default(),
            transitions: ModeCommands::default(),
            pager: None,
            paging_disable: vec![],
            paging_mode: None,
            setup_commands: vec![],
            save: None,
            reload: None,
            exit: ExitScript::default(),
            failed_when_contains: vec![],
            line_terminator: None,
            timeouts: Timeouts::default(),
            max_continuations: 500,
        }
    }

    /// Add a prompt pattern. Declaration order breaks ties.
    pub fn with_prompt(mut self, prompt: PromptPattern) -> Self {
        self.prompts.push(prompt);
        self
    }

    /// Replace the login script.
    pub fn with_login(mut self, login: LoginScript) -> Self {
        self.login = login;
        self
    }

    /// Set the User → Privileged command.
    pub fn with_enable(mut self, command: impl Into<String>) -> Self {
        self.transitions.enable = Some(command.into());
        self
    }

    /// Set the password prompt that may follow the enable command.
    pub fn with_enable_prompt(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.transitions.enable_prompt = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Reach privileged mode by logging in again with `command` when no
    /// enable secret is configured.
    pub fn with_login_enable(mut self, command: impl Into<String>) -> Self {
        self.transitions.login_enable = Some(command.into());
        self
    }

    /// Set the Privileged → User command.
    pub fn with_disable(mut self, command: impl Into<String>) -> Self {
        self.transitions.disable = Some(command.into());
        self
    }

    /// Set the Privileged → Config command.
    pub fn with_configure(mut self, command: impl Into<String>) -> Self {
        self.transitions.configure = Some(command.into());
        self
    }

    /// Set the Config → Privileged command.
    pub fn with_exit_config(mut self, command: impl Into<String>) -> Self {
        self.transitions.exit_config = Some(command.into());
        self
    }

    /// Set the output pager.
    pub fn with_pager(mut self, pager: Pager) -> Self {
        self.pager = Some(pager);
        self
    }

    /// Add a paging-disable command.
    pub fn with_paging_disable(mut self, command: impl Into<String>) -> Self {
        self.paging_disable.push(command.into());
        self
    }

    /// Set the mode paging control runs in.
    pub fn with_paging_mode(mut self, mode: Mode) -> Self {
        self.paging_mode = Some(mode);
        self
    }

    /// Add a setup command.
    pub fn with_setup_command(mut self, command: impl Into<String>) -> Self {
        self.setup_commands.push(command.into());
        self
    }

    /// Set the save script.
    pub fn with_save(mut self, script: LifecycleScript) -> Self {
        self.save = Some(script);
        self
    }

    /// Set the reload script.
    pub fn with_reload(mut self, script: ReloadScript) -> Self {
        self.reload = Some(script);
        self
    }

    /// Set the exit script.
    pub fn with_exit(mut self, script: ExitScript) -> Self {
        self.exit = script;
        self
    }

    /// Add a failure substring.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Override the line terminator.
    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = Some(terminator.into());
        self
    }

    /// Set timing defaults.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the per-command pager limit.
    pub fn with_max_continuations(mut self, max: usize) -> Self {
        self.max_continuations = max;
        self
    }

    /// Find the first failure substring present in `output`.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|pattern| output.contains(pattern.as_str()))
            .map(String::as_str)
    }

    /// Modes this profile declares prompts for.
    pub fn modes(&self) -> impl Iterator<Item = Mode> + '_ {
        self.prompts.iter().map(|p| p.mode)
    }

    /// Check the profile for mistakes that would make mode detection
    /// ambiguous or the session loop unbounded.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.prompts.is_empty() {
            return Err(ProfileError::InvalidDefinition {
                message: format!("profile '{}' declares no prompts", self.name),
            });
        }

        let mut seen: HashMap<&str, Mode> = HashMap::new();
        for prompt in &self.prompts {
            if prompt.mode == Mode::Unauthenticated {
                return Err(ProfileError::InvalidDefinition {
                    message: format!(
                        "prompt '{}' targets the unauthenticated mode",
                        prompt.as_str()
                    ),
                });
            }
            match seen.get(prompt.as_str()) {
                Some(&first) if first != prompt.mode => {
                    return Err(ProfileError::AmbiguousPrompt {
                        pattern: prompt.as_str().to_string(),
                        first,
                        second: prompt.mode,
                    });
                }
                _ => {
                    seen.insert(prompt.as_str(), prompt.mode);
                }
            }
        }

        if let Some(pager) = &self.pager {
            if pager.dismiss.is_empty() {
                return Err(ProfileError::InvalidDefinition {
                    message: "pager dismiss keystroke is empty".to_string(),
                });
            }
        }

        if self.paging_mode == Some(Mode::Unauthenticated) {
            return Err(ProfileError::InvalidDefinition {
                message: "paging mode cannot be the unauthenticated mode".to_string(),
            });
        }

        if self.max_continuations == 0 {
            return Err(ProfileError::InvalidDefinition {
                message: "max_continuations must be at least 1".to_string(),
            });
        }

        if self.timeouts.poll_interval.is_zero() {
            return Err(ProfileError::InvalidDefinition {
                message: "poll interval must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}
