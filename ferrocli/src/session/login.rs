//! Console login.

use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use secrecy::SecretString;
use tokio::time::Instant;

use super::{Session, Stop};
use crate::channel::{Channel, match_at_end};
use crate::error::{Error, ProtocolError, Result};
use crate::profile::LoginScript;

/// Idle time after which a silent console is nudged with a line terminator.
const NUDGE_AFTER: Duration = Duration::from_secs(2);

/// Login credentials.
///
/// The enable secret falls back to the login password when not set.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
    enable_secret: Option<SecretString>,
}

impl Credentials {
    /// Username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            enable_secret: None,
        }
    }

    /// Set a separate enable secret.
    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// The username.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &SecretString {
        &self.password
    }

    pub(crate) fn enable_secret(&self) -> &SecretString {
        self.enable_secret.as_ref().unwrap_or(&self.password)
    }

    pub(crate) fn has_enable_secret(&self) -> bool {
        self.enable_secret.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("enable_secret", &self.enable_secret.is_some())
            .finish_non_exhaustive()
    }
}

/// What the device is asking for at the end of the login output.
enum Request {
    Username,
    Password,
    Dialog(usize),
}

impl<C: Channel> Session<C> {
    /// Answer login prompts until a shell prompt shows up.
    pub(crate) async fn authenticate(&mut self) -> Result<()> {
        let profile = self.profile.clone();
        let script = &profile.login;
        let budget = self.timeouts.login;
        let deadline = Instant::now() + budget;

        let mut attempts: u32 = 1;
        let mut credentials_sent = false;
        let mut denied_scanned = 0;
        let mut nudges = 0;
        let mut last_rx = Instant::now();
        self.buffer.clear();

        loop {
            if self.cancel.take() {
                return Err(Error::Cancelled);
            }
            let now = Instant::now();

            let mut settle = None;
            if let Some(prompt) = self.matcher.match_prompt(self.buffer.tail()) {
                match self.prompt_settled(&prompt, last_rx, now) {
                    Some(left) if !left.is_zero() => settle = Some(left),
                    _ => {
                        let base = self.buffer.tail_start();
                        let mut prompt = prompt;
                        prompt.line_start += base;
                        prompt.start += base;
                        prompt.end += base;
                        self.finish("", now, &prompt, 0);
                        info!(
                            "{}: logged in as '{}' ({} mode)",
                            profile.name, self.credentials.username, self.mode
                        );
                        return Ok(());
                    }
                }
            }

            let fresh = self.buffer.as_slice().get(denied_scanned..).unwrap_or_default();
            if let Some(fatal) = script.fatal.iter().find_map(|p| p.find(fresh)) {
                let reason = String::from_utf8_lossy(fatal.as_bytes()).trim().to_string();
                return Err(self.auth_error(attempts, reason));
            }
            if let Some(denied) = script.access_denied.iter().find_map(|p| p.find(fresh)) {
                let reason = String::from_utf8_lossy(denied.as_bytes()).trim().to_string();
                denied_scanned = self.buffer.len();
                if attempts > script.max_auth_retries {
                    return Err(self.auth_error(attempts, reason));
                }
                warn!(
                    "{}: login attempt {} rejected ({}), retrying",
                    profile.name, attempts, reason
                );
                attempts += 1;
                credentials_sent = false;
                continue;
            }

            if let Some(request) = self.login_request(script) {
                match request {
                    Request::Dialog(i) => {
                        let dialog = &script.dialogs[i];
                        debug!(
                            "{}: answering login dialog with '{}'",
                            profile.name,
                            dialog.loggable_response()
                        );
                        if dialog.raw {
                            self.send_raw(&dialog.response).await?;
                        } else {
                            self.send_line(&dialog.response).await?;
                        }
                    }
                    Request::Username => {
                        if credentials_sent {
                            attempts = self.count_silent_rejection(attempts, script.max_auth_retries)?;
                        }
                        debug!("{}: sending username", profile.name);
                        let username = self.credentials.username.clone();
                        self.send_line(&username).await?;
                    }
                    Request::Password => {
                        if credentials_sent {
                            attempts = self.count_silent_rejection(attempts, script.max_auth_retries)?;
                        }
                        debug!("{}: sending password", profile.name);
                        let password = self.credentials.password().clone();
                        self.send_secret(&password).await?;
                        credentials_sent = true;
                    }
                }
                self.buffer.clear();
                denied_scanned = 0;
                last_rx = Instant::now();
                continue;
            }

            // A banner with no prompt after it: the line is busy and the
            // device will print something else later.
            let fresh = self.buffer.as_slice().get(denied_scanned..).unwrap_or_default();
            if script.retry_banners.iter().any(|p| p.is_match(fresh)) {
                debug!("{}: retry banner, waiting again", profile.name);
                self.buffer.clear();
                denied_scanned = 0;
            }

            if now >= deadline {
                return Err(Error::Timeout(budget));
            }

            if now.saturating_duration_since(last_rx) >= NUDGE_AFTER && nudges < script.max_nudges {
                nudges += 1;
                debug!("{}: console idle, nudge {}", profile.name, nudges);
                self.send_line("").await?;
                last_rx = now;
            }

            let mut wait = self.timeouts.poll_interval.min(deadline - now);
            if let Some(left) = settle {
                wait = wait.min(left);
            }
            match self.read_chunk(wait).await {
                Ok(true) => last_rx = Instant::now(),
                Ok(false) => {}
                Err(Error::Transport(e)) if credentials_sent && e.is_disconnect() => {
                    // Devices commonly hang up after refusing a login.
                    return Err(self.auth_error(attempts, "connection closed after password".into()));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reach privileged mode by logging in again from the user prompt
    /// (`login` on the ASA), answering the username and password prompts
    /// with the login credentials.
    pub(crate) async fn login_enable(&mut self, command: &str) -> Result<()> {
        const MAX_ROUNDS: usize = 10;

        let profile = self.profile.clone();
        let patterns = [&profile.login.username_prompt, &profile.login.password_prompt];
        let timeout = self.timeouts.command;
        let started = Instant::now();
        let deadline = started + timeout;
        self.buffer.clear();
        self.send_line(command).await?;

        let mut rounds = 0;
        let mut continuations = 0;
        loop {
            let collected = self.collect(command, deadline, timeout, &patterns).await?;
            continuations += collected.continuations;
            let index = match collected.stop {
                Stop::Prompt(prompt) => {
                    self.finish(command, started, &prompt, continuations);
                    return Ok(());
                }
                Stop::Pattern(index) => index,
            };

            rounds += 1;
            if rounds > MAX_ROUNDS {
                return Err(ProtocolError::ConfirmationLimit {
                    command: command.to_string(),
                    limit: MAX_ROUNDS,
                }
                .into());
            }
            self.buffer.mark();
            if index == 0 {
                debug!("{}: '{}' asks for the username", profile.name, command);
                let username = self.credentials.username.clone();
                self.send_line(&username).await?;
            } else {
                debug!("{}: '{}' asks for the password", profile.name, command);
                let password = self.credentials.password().clone();
                self.send_secret(&password).await?;
            }
        }
    }

    fn login_request(&self, script: &LoginScript) -> Option<Request> {
        let tail = self.buffer.tail();
        if let Some(i) = script
            .dialogs
            .iter()
            .position(|d| match_at_end(&d.pattern, tail).is_some())
        {
            return Some(Request::Dialog(i));
        }
        if match_at_end(&script.password_prompt, tail).is_some() {
            return Some(Request::Password);
        }
        if match_at_end(&script.username_prompt, tail).is_some() {
            return Some(Request::Username);
        }
        None
    }

    /// A device that re-asks for credentials without an access-denied
    /// message has still refused them.
    fn count_silent_rejection(&self, attempts: u32, max_retries: u32) -> Result<u32> {
        if attempts > max_retries {
            return Err(self.auth_error(attempts, "credentials requested again".into()));
        }
        Ok(attempts + 1)
    }

    fn auth_error(&self, attempts: u32, reason: String) -> Error {
        Error::Authentication {
            user: self.credentials.username.clone(),
            attempts,
            reason,
        }
    }
}
