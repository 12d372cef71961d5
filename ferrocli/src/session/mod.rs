//! Session state machine.
//!
//! A [`Session`] owns one [`Channel`] and drives it with a
//! [`DeviceProfile`]: it logs in, runs commands until the profile's prompt
//! reappears at the end of the output, walks between modes and performs the
//! lifecycle operations in [`lifecycle`].
//!
//! Every read is a bounded poll. The session keeps its own deadline across
//! polls, checks the [`CancelToken`] between them and never returns output
//! before a prompt matched at the very end of what arrived.

mod builder;
mod cancel;
pub mod lifecycle;
mod login;
mod normalize;
mod result;

pub use builder::{Protocol, SessionBuilder};
pub use cancel::CancelToken;
pub use lifecycle::ReloadOutcome;
pub use login::Credentials;
pub use result::CommandResult;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use crate::channel::{
    Channel, MatchOutcome, PatternBuffer, PromptMatch, PromptMatcher, QuiescencePolicy,
    match_at_end,
};
use crate::error::{Error, ProtocolError, Result, SessionError};
use crate::profile::{DeviceProfile, Mode, Timeouts};
use crate::transport::Transport;

use normalize::clean_output;

/// Whether the session can take another command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// At a known prompt.
    Ready,

    /// A command was interrupted (timeout or cancel); call
    /// [`Session::resync`] before reuse.
    ResyncRequired,

    /// The device stopped behaving like its profile says.
    Unusable,

    /// The channel is gone.
    Closed,
}

/// What the session is waiting on within the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a prompt, or between operations.
    Idle,

    /// A pager screen was dismissed and more output is due.
    AwaitingContinuation,

    /// A confirmation was answered during a lifecycle operation.
    AwaitingConfirmation,
}

/// How a read loop ended.
#[derive(Debug)]
pub(crate) enum Stop {
    /// A profile prompt ended the output.
    Prompt(PromptMatch),

    /// One of the caller's patterns ended the output (index into them).
    Pattern(usize),
}

#[derive(Debug)]
pub(crate) struct Collected {
    pub(crate) stop: Stop,
    pub(crate) continuations: usize,
}

/// An interactive CLI session with one device.
///
/// # Example
///
/// ```rust,no_run
/// use ferrocli::session::SessionBuilder;
/// use ferrocli::Mode;
///
/// # async fn example() -> Result<(), ferrocli::Error> {
/// let mut session = SessionBuilder::new("192.0.2.10")
///     .username("admin")
///     .password("secret")
///     .profile("adtran_aos")
///     .connect()
///     .await?;
///
/// session.enter_mode(Mode::Privileged).await?;
/// let result = session.execute("show version").await?;
/// println!("{}", result.text);
///
/// session.graceful_exit().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Channel> {
    channel: Option<C>,
    profile: Arc<DeviceProfile>,
    matcher: PromptMatcher,
    buffer: PatternBuffer,
    credentials: Credentials,
    mode: Mode,
    phase: Phase,
    health: Health,
    last_prompt: String,
    timeouts: Timeouts,
    policy: QuiescencePolicy,
    cancel: CancelToken,
    terminator: String,
}

impl<C: Channel> Session<C> {
    fn new(
        channel: C,
        profile: Arc<DeviceProfile>,
        credentials: Credentials,
        cancel: CancelToken,
    ) -> Self {
        let terminator = profile
            .line_terminator
            .clone()
            .unwrap_or_else(|| channel.line_terminator().to_string());
        let timeouts = profile.timeouts;
        Self {
            channel: Some(channel),
            matcher: PromptMatcher::from_profile(&profile),
            buffer: PatternBuffer::default(),
            credentials,
            mode: Mode::Unauthenticated,
            phase: Phase::Idle,
            health: Health::Ready,
            last_prompt: String::new(),
            policy: QuiescencePolicy::new(timeouts.quiescence),
            timeouts,
            cancel,
            terminator,
            profile,
        }
    }

    /// Log in over an open channel, run setup commands and turn paging off.
    ///
    /// The channel is closed when login fails.
    pub async fn login(
        channel: C,
        profile: Arc<DeviceProfile>,
        credentials: Credentials,
    ) -> Result<Self> {
        Self::login_with_cancel(channel, profile, credentials, CancelToken::new()).await
    }

    /// [`login`](Self::login) with a caller-held cancellation token.
    pub async fn login_with_cancel(
        channel: C,
        profile: Arc<DeviceProfile>,
        credentials: Credentials,
        cancel: CancelToken,
    ) -> Result<Self> {
        profile.validate()?;
        let mut session = Self::new(channel, profile, credentials, cancel);

        if let Err(e) = session.authenticate().await {
            session.shutdown().await;
            return Err(e);
        }
        if let Err(e) = session.prepare().await {
            session.shutdown().await;
            return Err(e);
        }

        info!(
            "{}: session ready in {} mode",
            session.profile.name, session.mode
        );
        Ok(session)
    }

    /// Open `transport` and log in.
    pub async fn open<T>(
        transport: T,
        profile: Arc<DeviceProfile>,
        credentials: Credentials,
    ) -> Result<Self>
    where
        T: Transport<Channel = C>,
    {
        let channel = transport.open().await?;
        Self::login(channel, profile, credentials).await
    }

    /// Setup commands, then paging control. Rejections and timeouts here
    /// only cost readability of later output, so they are logged.
    async fn prepare(&mut self) -> Result<()> {
        let profile = self.profile.clone();
        for command in &profile.setup_commands {
            let result = self.prepare_command(command).await;
            self.tolerate(command, result).await?;
        }
        self.disable_paging().await
    }

    /// Run the paging-disable sequence from the profile's paging mode.
    ///
    /// The sequence may walk through config sections, so it stops at the
    /// first rejected step and returns to the paging mode.
    async fn disable_paging(&mut self) -> Result<()> {
        let profile = self.profile.clone();
        if profile.paging_disable.is_empty() {
            return Ok(());
        }

        let home = profile.paging_mode.unwrap_or(self.mode);
        if self.mode != home {
            let result = self.walk_to(home).await;
            if !self.tolerate(&format!("{} mode", home), result).await? {
                warn!("{}: paging left on", profile.name);
                return Ok(());
            }
        }

        for command in &profile.paging_disable {
            let result = self.prepare_command(command).await;
            if !self.tolerate(command, result).await? {
                if self.mode != home {
                    let result = self.walk_to(home).await;
                    self.tolerate(&format!("{} mode", home), result).await?;
                }
                break;
            }
        }
        Ok(())
    }

    async fn prepare_command(&mut self, command: &str) -> Result<()> {
        let timeout = self.timeouts.command;
        let result = self.run_command(command, timeout).await?;
        match result.failure_message {
            Some(message) => Err(ProtocolError::CommandFailed {
                command: command.to_string(),
                message,
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Sort a preparation step's error into ones login survives and ones
    /// it does not. Returns whether the step succeeded.
    async fn tolerate(&mut self, what: &str, result: Result<()>) -> Result<bool> {
        let Err(e) = result else {
            return Ok(true);
        };
        match e {
            Error::Timeout(_)
            | Error::Cancelled
            | Error::Protocol(ProtocolError::ConfirmationLimit { .. }) => {
                warn!("{}: '{}' did not complete: {}", self.profile.name, what, e);
                self.health = Health::ResyncRequired;
                self.resync().await?;
            }
            Error::ModeTransition { .. }
            | Error::Protocol(
                ProtocolError::CommandFailed { .. } | ProtocolError::Unsupported { .. },
            ) => {
                warn!("{}: '{}' failed: {}", self.profile.name, what, e);
            }
            e => return Err(e),
        }
        Ok(false)
    }

    // --- accessors -------------------------------------------------------

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current health.
    pub fn health(&self) -> Health {
        self.health
    }

    /// The last prompt seen, trimmed.
    pub fn last_prompt(&self) -> &str {
        &self.last_prompt
    }

    /// The profile driving this session.
    pub fn profile(&self) -> &Arc<DeviceProfile> {
        &self.profile
    }

    /// Active timeouts.
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Replace the active timeouts. The quiescence policy window follows.
    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
        self.policy.window = timeouts.quiescence;
    }

    /// Prompt acceptance policy.
    pub fn quiescence_policy(&self) -> &QuiescencePolicy {
        &self.policy
    }

    /// Replace the prompt acceptance policy.
    pub fn set_quiescence_policy(&mut self, policy: QuiescencePolicy) {
        self.policy = policy;
    }

    /// Token that cancels the running operation.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whether the channel is still open.
    pub fn is_open(&self) -> bool {
        self.channel.as_ref().is_some_and(|c| c.is_open())
    }

    // --- commands --------------------------------------------------------

    /// Run a command and return its cleaned output.
    pub async fn execute(&mut self, command: &str) -> Result<CommandResult> {
        let timeout = self.timeouts.command;
        self.execute_with_timeout(command, timeout).await
    }

    /// Run a command with an explicit deadline.
    pub async fn execute_with_timeout(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandResult> {
        self.ensure_ready()?;
        let result = self.run_command(command, timeout).await;
        self.settle(result)
    }

    /// Run a command that must leave the device in `mode`.
    pub async fn execute_expecting(&mut self, command: &str, mode: Mode) -> Result<CommandResult> {
        let result = self.execute(command).await?;
        if result.mode != mode {
            return self.settle(Err(ProtocolError::UnexpectedMode {
                command: command.to_string(),
                expected: mode,
                actual: result.mode,
            }
            .into()));
        }
        Ok(result)
    }

    /// Run commands in order, stopping at the first error.
    pub async fn execute_all<S: AsRef<str>>(&mut self, commands: &[S]) -> Result<Vec<CommandResult>> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.execute(command.as_ref()).await?);
        }
        Ok(results)
    }

    /// Enter config mode, run `commands`, then return to the mode the
    /// session was in.
    pub async fn send_config<S: AsRef<str>>(&mut self, commands: &[S]) -> Result<Vec<CommandResult>> {
        let previous = self.mode;
        self.enter_mode(Mode::Config).await?;
        let results = self.execute_all(commands).await?;
        self.enter_mode(previous).await?;
        Ok(results)
    }

    async fn run_command(&mut self, command: &str, timeout: Duration) -> Result<CommandResult> {
        let started = Instant::now();
        self.buffer.clear();
        debug!("{}: executing '{}'", self.profile.name, command);
        self.send_line(command).await?;

        match self.collect(command, started + timeout, timeout, &[]).await? {
            Collected {
                stop: Stop::Prompt(prompt),
                continuations,
            } => Ok(self.finish(command, started, &prompt, continuations)),
            Collected {
                stop: Stop::Pattern(_),
                ..
            } => unreachable!("no patterns were given"),
        }
    }

    // --- modes -----------------------------------------------------------

    /// Move to `target`, one mode at a time.
    pub async fn enter_mode(&mut self, target: Mode) -> Result<()> {
        self.ensure_ready()?;
        let result = self.walk_to(target).await;
        self.settle(result)
    }

    /// Drop exactly one mode and return the new one.
    pub async fn exit_mode(&mut self) -> Result<Mode> {
        self.ensure_ready()?;
        let Some(target) = self.mode.down() else {
            return Err(Error::ModeTransition {
                target: Mode::Unauthenticated,
                reached: self.mode,
            });
        };
        let result = self.step(target).await;
        self.settle(result).map(|_| self.mode)
    }

    pub(crate) async fn walk_to(&mut self, target: Mode) -> Result<()> {
        if target == Mode::Unauthenticated {
            return Err(Error::ModeTransition {
                target,
                reached: self.mode,
            });
        }
        while self.mode != target {
            let next = if target > self.mode {
                self.mode.up()
            } else {
                self.mode.down()
            };
            let Some(next) = next else {
                return Err(Error::ModeTransition {
                    target,
                    reached: self.mode,
                });
            };
            self.step(next).await?;
        }
        Ok(())
    }

    async fn step(&mut self, to: Mode) -> Result<()> {
        let from = self.mode;
        let command = self
            .profile
            .transitions
            .step(from, to)
            .map(str::to_string)
            .ok_or_else(|| ProtocolError::Unsupported {
                profile: self.profile.name.clone(),
                what: format!("a command from {} to {} mode", from, to),
            })?;

        debug!("{}: {} -> {} with '{}'", self.profile.name, from, to, command);
        if from == Mode::User && to == Mode::Privileged {
            match self.profile.transitions.login_enable.clone() {
                Some(login) if !self.credentials.has_enable_secret() => {
                    self.login_enable(&login).await?;
                }
                _ => self.enable(&command).await?,
            }
        } else {
            let timeout = self.timeouts.command;
            self.run_command(&command, timeout).await?;
        }

        if self.mode != to {
            return Err(Error::ModeTransition {
                target: to,
                reached: self.mode,
            });
        }
        Ok(())
    }

    /// Enable, answering the password prompt with the enable secret.
    /// TACACS-backed devices sometimes reject a correct secret once, so a
    /// failed attempt is repeated.
    async fn enable(&mut self, command: &str) -> Result<()> {
        const ATTEMPTS: u32 = 2;
        const MAX_REPROMPTS: usize = 3;

        let profile = self.profile.clone();
        let patterns: Vec<&Regex> = profile.transitions.enable_prompt.iter().collect();
        let timeout = self.timeouts.command;

        for attempt in 1..=ATTEMPTS {
            let started = Instant::now();
            let deadline = started + timeout;
            self.buffer.clear();
            self.send_line(command).await?;

            let mut secret_sent = false;
            let mut reprompts = 0;
            let mut continuations = 0;
            loop {
                let collected = self.collect(command, deadline, timeout, &patterns).await?;
                continuations += collected.continuations;
                match collected.stop {
                    Stop::Prompt(prompt) => {
                        self.finish(command, started, &prompt, continuations);
                        break;
                    }
                    Stop::Pattern(_) if !secret_sent => {
                        self.buffer.mark();
                        let secret = self.credentials.enable_secret().clone();
                        self.send_secret(&secret).await?;
                        secret_sent = true;
                    }
                    Stop::Pattern(_) => {
                        // Secret refused and asked again: back out to the prompt.
                        reprompts += 1;
                        if reprompts > MAX_REPROMPTS {
                            return Err(ProtocolError::ConfirmationLimit {
                                command: command.to_string(),
                                limit: MAX_REPROMPTS,
                            }
                            .into());
                        }
                        self.buffer.mark();
                        self.send_line("").await?;
                    }
                }
            }

            if self.mode == Mode::Privileged {
                return Ok(());
            }
            if attempt < ATTEMPTS {
                warn!(
                    "{}: enable left the device in {} mode, retrying",
                    profile.name, self.mode
                );
            }
        }
        Ok(())
    }

    // --- recovery and teardown ------------------------------------------

    /// Send a bare line terminator and re-match the prompt after an
    /// interrupted command.
    pub async fn resync(&mut self) -> Result<()> {
        match self.health {
            Health::Closed => return Err(SessionError::Closed.into()),
            Health::Unusable => return Err(SessionError::Unusable.into()),
            Health::Ready | Health::ResyncRequired => {}
        }

        let policy = self.policy;
        // Late output from the interrupted command may carry a stale prompt
        // ahead of ours; only a prompt followed by silence counts.
        self.policy.settle_exact = true;
        let timeout = self.timeouts.command;
        let result = self.run_command("", timeout).await;
        self.policy = policy;

        match self.settle(result) {
            Ok(_) => {
                debug!("{}: resynced at '{}'", self.profile.name, self.last_prompt);
                self.health = Health::Ready;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Close the channel. Closing twice is fine.
    pub async fn close(&mut self) -> Result<()> {
        self.health = Health::Closed;
        self.phase = Phase::Idle;
        if let Some(mut channel) = self.channel.take() {
            debug!("{}: closing channel", self.profile.name);
            channel.close().await?;
        }
        Ok(())
    }

    /// Close without surfacing errors; used on failure paths.
    pub(crate) async fn shutdown(&mut self) {
        if let Err(e) = self.close().await {
            debug!("{}: close failed: {}", self.profile.name, e);
        }
    }

    // --- plumbing --------------------------------------------------------

    fn ensure_ready(&self) -> Result<()> {
        if self.channel.is_none() {
            return Err(SessionError::Closed.into());
        }
        match self.health {
            Health::Ready => Ok(()),
            Health::ResyncRequired => Err(SessionError::ResyncRequired.into()),
            Health::Unusable => Err(SessionError::Unusable.into()),
            Health::Closed => Err(SessionError::Closed.into()),
        }
    }

    /// Record what an operation's failure means for the session.
    pub(crate) fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        let Err(e) = &result else {
            return result;
        };
        match e {
            Error::Timeout(_) | Error::Cancelled => {
                self.health = Health::ResyncRequired;
            }
            Error::Protocol(
                ProtocolError::PaginationLimit { .. }
                | ProtocolError::ConfirmationLimit { .. }
                | ProtocolError::UnexpectedMode { .. },
            ) => {
                warn!("{}: session unusable: {}", self.profile.name, e);
                self.health = Health::Unusable;
            }
            Error::Transport(_) | Error::Authentication { .. } => {
                warn!("{}: closing session: {}", self.profile.name, e);
                self.health = Health::Closed;
                self.channel = None;
            }
            _ => {}
        }
        self.phase = Phase::Idle;
        result
    }

    fn channel_mut(&mut self) -> Result<&mut C> {
        self.channel
            .as_mut()
            .ok_or_else(|| SessionError::Closed.into())
    }

    /// Send `line` followed by the line terminator.
    pub(crate) async fn send_line(&mut self, line: &str) -> Result<()> {
        trace!("{}: -> {:?}", self.profile.name, line);
        let mut data = String::with_capacity(line.len() + self.terminator.len());
        data.push_str(line);
        data.push_str(&self.terminator);
        self.channel_mut()?.send(data.as_bytes()).await?;
        Ok(())
    }

    /// Send a secret followed by the line terminator, never logging it.
    pub(crate) async fn send_secret(&mut self, secret: &SecretString) -> Result<()> {
        trace!("{}: -> ********", self.profile.name);
        let mut data = String::from(secret.expose_secret());
        data.push_str(&self.terminator);
        self.channel_mut()?.send(data.as_bytes()).await?;
        Ok(())
    }

    /// Send keystrokes without a line terminator.
    pub(crate) async fn send_raw(&mut self, keys: &str) -> Result<()> {
        trace!("{}: -> raw {:?}", self.profile.name, keys);
        self.channel_mut()?.send(keys.as_bytes()).await?;
        Ok(())
    }

    /// One bounded poll. Returns whether bytes arrived.
    pub(crate) async fn read_chunk(&mut self, wait: Duration) -> Result<bool> {
        let data = self.channel_mut()?.read_available(wait).await?;
        if data.is_empty() {
            return Ok(false);
        }
        trace!(
            "{}: <- {:?}",
            self.profile.name,
            String::from_utf8_lossy(&data)
        );
        self.buffer.extend(&data);
        Ok(true)
    }

    /// Whether a prompt match may be trusted given when bytes last arrived.
    fn prompt_settled(&self, prompt: &PromptMatch, last_rx: Instant, now: Instant) -> Option<Duration> {
        if !self.policy.needs_settle(prompt) {
            return None;
        }
        let quiet = now.saturating_duration_since(last_rx);
        Some(self.policy.window.saturating_sub(quiet))
    }

    /// Read until a prompt or one of `patterns` ends the output.
    ///
    /// Pager screens are dismissed along the way. `patterns` are checked
    /// first since they are only given where they are more specific than a
    /// prompt (confirmations, password requests).
    pub(crate) async fn collect(
        &mut self,
        command: &str,
        deadline: Instant,
        budget: Duration,
        patterns: &[&Regex],
    ) -> Result<Collected> {
        let mut continuations = 0;
        let mut last_rx = Instant::now();

        loop {
            if self.cancel.take() {
                debug!("{}: '{}' cancelled", self.profile.name, command);
                return Err(Error::Cancelled);
            }
            let now = Instant::now();
            let base = self.buffer.tail_start();

            if let Some(index) = patterns
                .iter()
                .position(|p| match_at_end(p, self.buffer.tail()).is_some())
            {
                return Ok(Collected {
                    stop: Stop::Pattern(index),
                    continuations,
                });
            }

            let mut settle = None;
            match self.matcher.evaluate(self.buffer.tail()) {
                MatchOutcome::Prompt(mut prompt) => {
                    match self.prompt_settled(&prompt, last_rx, now) {
                        Some(left) if !left.is_zero() => settle = Some(left),
                        _ => {
                            prompt.line_start += base;
                            prompt.start += base;
                            prompt.end += base;
                            self.phase = Phase::Idle;
                            return Ok(Collected {
                                stop: Stop::Prompt(prompt),
                                continuations,
                            });
                        }
                    }
                }
                MatchOutcome::Continuation { line_start, .. } => {
                    continuations += 1;
                    if continuations > self.profile.max_continuations {
                        return Err(ProtocolError::PaginationLimit {
                            command: command.to_string(),
                            limit: self.profile.max_continuations,
                        }
                        .into());
                    }
                    trace!("{}: pager screen {}", self.profile.name, continuations);
                    self.phase = Phase::AwaitingContinuation;
                    self.buffer.truncate(base + line_start);
                    let dismiss = self
                        .profile
                        .pager
                        .as_ref()
                        .map(|p| p.dismiss.clone())
                        .unwrap_or_default();
                    self.send_raw(&dismiss).await?;
                    last_rx = Instant::now();
                    continue;
                }
                MatchOutcome::Pending => {}
            }

            if now >= deadline {
                debug!(
                    "{}: '{}' timed out, buffer tail {:?}",
                    self.profile.name,
                    command,
                    String::from_utf8_lossy(self.buffer.tail())
                );
                return Err(Error::Timeout(budget));
            }

            let mut wait = self.timeouts.poll_interval.min(deadline - now);
            if let Some(left) = settle {
                wait = wait.min(left);
            }
            if self.read_chunk(wait).await? {
                last_rx = Instant::now();
            }
        }
    }

    /// Turn the buffer into a result and record the prompt.
    pub(crate) fn finish(
        &mut self,
        command: &str,
        started: Instant,
        prompt: &PromptMatch,
        continuations: usize,
    ) -> CommandResult {
        let data = self.buffer.take();
        let body = String::from_utf8_lossy(&data[..prompt.line_start]);
        let prompt_text = String::from_utf8_lossy(&data[prompt.start..prompt.end])
            .trim()
            .to_string();
        let text = clean_output(&body, command);

        if self.mode != prompt.mode {
            debug!("{}: now in {} mode", self.profile.name, prompt.mode);
        }
        self.mode = prompt.mode;
        self.last_prompt = prompt_text.clone();
        self.phase = Phase::Idle;

        let failure_message = self.profile.detect_failure(&text).map(str::to_string);
        if let Some(failure) = &failure_message {
            warn!("{}: '{}' failed: {}", self.profile.name, command, failure);
        }

        CommandResult {
            command: command.to_string(),
            text,
            raw: String::from_utf8_lossy(&data).into_owned(),
            prompt: prompt_text,
            mode: prompt.mode,
            elapsed: started.elapsed(),
            continuations,
            failure_message,
        }
    }
}

impl<C: Channel> Drop for Session<C> {
    fn drop(&mut self) {
        if self.channel.as_ref().is_some_and(|c| c.is_open()) {
            warn!(
                "{}: session dropped without close(), releasing channel",
                self.profile.name
            );
        }
    }
}

#[cfg(test)]
mod tests;
