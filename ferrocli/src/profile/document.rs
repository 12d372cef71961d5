//! Serde form of a device profile.
//!
//! Loading the document (YAML, TOML, JSON, ...) is the caller's business;
//! this module only turns the parsed structure into a validated
//! [`DeviceProfile`]. Durations are given in milliseconds.
//!
//! ```rust
//! use ferrocli::profile::{DeviceProfile, ProfileDocument};
//!
//! let doc: ProfileDocument = serde_json::from_str(r#"{
//!     "name": "lab",
//!     "prompts": [
//!         { "mode": "user", "pattern": "device>" },
//!         { "mode": "privileged", "pattern": "device#" }
//!     ],
//!     "enable": "enable",
//!     "pager": { "continuation": "--More--", "dismiss": " " }
//! }"#).unwrap();
//!
//! let profile = DeviceProfile::try_from(doc).unwrap();
//! assert_eq!(profile.prompts.len(), 2);
//! ```

use std::time::Duration;

use regex::bytes::Regex;
use serde::Deserialize;

use super::definition::{DeviceProfile, Timeouts};
use super::script::{ExitScript, LifecycleScript, LoginScript, Pager, PendingPrompt, ReloadScript};
use super::{Mode, PromptPattern};
use crate::error::ProfileError;

/// Top-level profile document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileDocument {
    pub name: String,
    pub prompts: Vec<PromptDocument>,
    #[serde(default)]
    pub login: Option<LoginDocument>,
    #[serde(default)]
    pub enable: Option<String>,
    #[serde(default)]
    pub enable_prompt: Option<String>,
    #[serde(default)]
    pub login_enable: Option<String>,
    #[serde(default)]
    pub disable: Option<String>,
    #[serde(default)]
    pub configure: Option<String>,
    #[serde(default)]
    pub exit_config: Option<String>,
    #[serde(default)]
    pub pager: Option<PagerDocument>,
    #[serde(default)]
    pub paging_disable: Vec<String>,
    #[serde(default)]
    pub paging_mode: Option<Mode>,
    #[serde(default)]
    pub setup_commands: Vec<String>,
    #[serde(default)]
    pub save: Option<ScriptDocument>,
    #[serde(default)]
    pub reload: Option<ReloadDocument>,
    #[serde(default)]
    pub exit: Option<ExitDocument>,
    #[serde(default)]
    pub failed_when_contains: Vec<String>,
    #[serde(default)]
    pub line_terminator: Option<String>,
    #[serde(default)]
    pub timeouts: TimeoutsDocument,
    #[serde(default)]
    pub max_continuations: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptDocument {
    pub mode: Mode,
    pub pattern: String,
    #[serde(default)]
    pub not_contains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmationDocument {
    pub pattern: String,
    pub response: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub raw: bool,
}

/// Login overrides. Lists replace the defaults when non-empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginDocument {
    #[serde(default)]
    pub username_prompt: Option<String>,
    #[serde(default)]
    pub password_prompt: Option<String>,
    #[serde(default)]
    pub access_denied: Vec<String>,
    #[serde(default)]
    pub fatal: Vec<String>,
    #[serde(default)]
    pub retry_banners: Vec<String>,
    #[serde(default)]
    pub dialogs: Vec<ConfirmationDocument>,
    #[serde(default)]
    pub max_auth_retries: Option<u32>,
    #[serde(default)]
    pub max_nudges: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PagerDocument {
    pub continuation: String,
    pub dismiss: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptDocument {
    pub command: String,
    #[serde(default)]
    pub confirmations: Vec<ConfirmationDocument>,
    #[serde(default)]
    pub required_mode: Option<Mode>,
    #[serde(default)]
    pub max_rounds: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadDocument {
    pub command: String,
    #[serde(default)]
    pub without_save_command: Option<String>,
    #[serde(default)]
    pub confirmations: Vec<ConfirmationDocument>,
    #[serde(default)]
    pub required_mode: Option<Mode>,
    #[serde(default)]
    pub max_rounds: Option<usize>,
    #[serde(default)]
    pub disconnect_grace_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExitDocument {
    pub commands: Vec<String>,
    #[serde(default)]
    pub leave_config: Option<bool>,
    #[serde(default)]
    pub restore_paging: Vec<String>,
    #[serde(default)]
    pub drain_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsDocument {
    #[serde(default)]
    pub command_ms: Option<u64>,
    #[serde(default)]
    pub login_ms: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub quiescence_ms: Option<u64>,
    #[serde(default)]
    pub save_ms: Option<u64>,
    #[serde(default)]
    pub reload_ms: Option<u64>,
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ProfileError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(ProfileError::from))
        .collect()
}

fn confirmations(docs: Vec<ConfirmationDocument>) -> Result<Vec<PendingPrompt>, ProfileError> {
    docs.into_iter()
        .map(|doc| -> Result<PendingPrompt, ProfileError> {
            Ok(PendingPrompt::new(&doc.pattern, doc.response)?
                .with_hidden(doc.hidden)
                .with_raw(doc.raw))
        })
        .collect()
}

impl TimeoutsDocument {
    fn resolve(&self) -> Timeouts {
        let d = Timeouts::default();
        Timeouts {
            command: millis(self.command_ms, d.command),
            login: millis(self.login_ms, d.login),
            poll_interval: millis(self.poll_interval_ms, d.poll_interval),
            quiescence: millis(self.quiescence_ms, d.quiescence),
            save: millis(self.save_ms, d.save),
            reload: millis(self.reload_ms, d.reload),
        }
    }
}

impl LoginDocument {
    fn resolve(self) -> Result<LoginScript, ProfileError> {
        let mut login = LoginScript::default();
        if let Some(p) = self.username_prompt {
            login.username_prompt = Regex::new(&p)?;
        }
        if let Some(p) = self.password_prompt {
            login.password_prompt = Regex::new(&p)?;
        }
        if !self.access_denied.is_empty() {
            login.access_denied = compile_all(&self.access_denied)?;
        }
        login.fatal = compile_all(&self.fatal)?;
        if !self.retry_banners.is_empty() {
            login.retry_banners = compile_all(&self.retry_banners)?;
        }
        login.dialogs = confirmations(self.dialogs)?;
        if let Some(n) = self.max_auth_retries {
            login.max_auth_retries = n;
        }
        if let Some(n) = self.max_nudges {
            login.max_nudges = n;
        }
        Ok(login)
    }
}

impl TryFrom<ProfileDocument> for DeviceProfile {
    type Error = ProfileError;

    fn try_from(doc: ProfileDocument) -> Result<Self, Self::Error> {
        let mut profile = DeviceProfile::new(doc.name);

        for prompt in doc.prompts {
            let mut pattern = PromptPattern::new(prompt.mode, &prompt.pattern)?;
            pattern.not_contains = prompt.not_contains;
            profile = profile.with_prompt(pattern);
        }

        if let Some(login) = doc.login {
            profile.login = login.resolve()?;
        }

        profile.transitions.enable = doc.enable;
        profile.transitions.login_enable = doc.login_enable;
        profile.transitions.disable = doc.disable;
        profile.transitions.configure = doc.configure;
        profile.transitions.exit_config = doc.exit_config;
        if let Some(p) = doc.enable_prompt {
            profile = profile.with_enable_prompt(&p)?;
        }

        if let Some(pager) = doc.pager {
            profile.pager = Some(Pager::new(&pager.continuation, pager.dismiss)?);
        }
        profile.paging_disable = doc.paging_disable;
        profile.paging_mode = doc.paging_mode;
        profile.setup_commands = doc.setup_commands;

        if let Some(save) = doc.save {
            let mut script = LifecycleScript::new(save.command);
            script.confirmations = confirmations(save.confirmations)?;
            if let Some(mode) = save.required_mode {
                script.required_mode = mode;
            }
            if let Some(n) = save.max_rounds {
                script.max_rounds = n;
            }
            profile.save = Some(script);
        }

        if let Some(reload) = doc.reload {
            let mut script = ReloadScript::new(reload.command);
            script.without_save_command = reload.without_save_command;
            script.confirmations = confirmations(reload.confirmations)?;
            if let Some(mode) = reload.required_mode {
                script.required_mode = mode;
            }
            if let Some(n) = reload.max_rounds {
                script.max_rounds = n;
            }
            script.disconnect_grace = millis(reload.disconnect_grace_ms, script.disconnect_grace);
            profile.reload = Some(script);
        }

        if let Some(exit) = doc.exit {
            let mut script = ExitScript::new(exit.commands);
            if let Some(leave) = exit.leave_config {
                script.leave_config = leave;
            }
            script.restore_paging = exit.restore_paging;
            script.drain = millis(exit.drain_ms, script.drain);
            profile.exit = script;
        }

        profile.failed_when_contains = doc.failed_when_contains;
        profile.line_terminator = doc.line_terminator;
        profile.timeouts = doc.timeouts.resolve();
        if let Some(max) = doc.max_continuations {
            profile.max_continuations = max;
        }

        profile.validate()?;
        Ok(profile)
    }
}
