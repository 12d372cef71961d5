//! Lifecycle operations: save, reload, graceful exit.
//!
//! These are multi-round dialogs. After the command goes out the session
//! answers whichever declared confirmation shows up, as often as the script
//! allows, until the prompt returns. A reload may instead end with the
//! device hanging up, which is the expected outcome once it was confirmed.

use std::time::Duration;

use log::{debug, info, warn};
use regex::bytes::Regex;
use tokio::time::Instant;

use super::{Collected, CommandResult, Health, Phase, Session, Stop};
use crate::channel::Channel;
use crate::error::{Error, ProtocolError, Result};
use crate::profile::{Mode, PendingPrompt};

/// How a reload ended.
#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    /// The device went away after the reload was confirmed. The session is
    /// closed.
    Rebooting,

    /// The device came back to its prompt: the reload was scheduled,
    /// declined or rejected. Check the result text.
    Returned(CommandResult),
}

impl ReloadOutcome {
    /// Whether the device is rebooting.
    pub fn is_rebooting(&self) -> bool {
        matches!(self, ReloadOutcome::Rebooting)
    }
}

impl<C: Channel> Session<C> {
    /// Persist the running configuration.
    ///
    /// The session moves to the script's mode for the save and back to the
    /// mode it was in afterwards.
    pub async fn save_config(&mut self) -> Result<CommandResult> {
        self.ensure_ready()?;
        let result = self.run_save().await;
        self.settle(result)
    }

    async fn run_save(&mut self) -> Result<CommandResult> {
        let profile = self.profile.clone();
        let script = profile.save.as_ref().ok_or_else(|| ProtocolError::Unsupported {
            profile: profile.name.clone(),
            what: "a save command".to_string(),
        })?;

        let previous = self.mode;
        self.walk_to(script.required_mode).await?;

        info!("{}: saving configuration", profile.name);
        let budget = self.timeouts.save;
        let started = Instant::now();
        let deadline = started + budget;
        self.buffer.clear();
        self.send_line(&script.command).await?;

        let patterns: Vec<&Regex> = script.confirmations.iter().map(|c| &c.pattern).collect();
        let mut rounds = 0;
        let mut continuations = 0;
        let result = loop {
            let collected = self
                .collect(&script.command, deadline, budget, &patterns)
                .await?;
            continuations += collected.continuations;
            match collected.stop {
                Stop::Prompt(prompt) => {
                    break self.finish(&script.command, started, &prompt, continuations);
                }
                Stop::Pattern(index) => {
                    rounds += 1;
                    self.confirm(
                        &script.command,
                        &script.confirmations[index],
                        rounds,
                        script.max_rounds,
                    )
                    .await?;
                }
            }
        };

        self.walk_to(previous).await?;

        if let Some(message) = &result.failure_message {
            return Err(ProtocolError::CommandFailed {
                command: script.command.clone(),
                message: message.clone(),
            }
            .into());
        }
        Ok(result)
    }

    /// Reload the device, saving first where the profile's reload command
    /// does so.
    pub async fn reload_device(&mut self) -> Result<ReloadOutcome> {
        self.reload(false).await
    }

    /// Reload the device, discarding unsaved changes.
    pub async fn reload_device_without_saving(&mut self) -> Result<ReloadOutcome> {
        self.reload(true).await
    }

    async fn reload(&mut self, discard: bool) -> Result<ReloadOutcome> {
        self.ensure_ready()?;
        let result = self.run_reload(discard).await;
        if let Ok(ReloadOutcome::Rebooting) = &result {
            info!("{}: device is rebooting, closing session", self.profile.name);
            self.shutdown().await;
            self.mode = Mode::Unauthenticated;
        }
        self.settle(result)
    }

    async fn run_reload(&mut self, discard: bool) -> Result<ReloadOutcome> {
        let profile = self.profile.clone();
        let script = profile.reload.as_ref().ok_or_else(|| ProtocolError::Unsupported {
            profile: profile.name.clone(),
            what: "a reload command".to_string(),
        })?;
        let command = if discard {
            script
                .without_save_command
                .as_deref()
                .ok_or_else(|| ProtocolError::Unsupported {
                    profile: profile.name.clone(),
                    what: "a reload-without-saving command".to_string(),
                })?
        } else {
            script.command.as_str()
        };

        self.walk_to(script.required_mode).await?;

        info!("{}: reloading with '{}'", profile.name, command);
        let budget = self.timeouts.reload;
        let started = Instant::now();
        let deadline = started + budget;
        self.buffer.clear();
        self.send_line(command).await?;

        let patterns: Vec<&Regex> = script.confirmations.iter().map(|c| &c.pattern).collect();
        // Without declared confirmations the command itself commits.
        let mut confirmed = script.confirmations.is_empty();
        let mut rounds = 0;
        let mut continuations = 0;

        loop {
            let (round_deadline, round_budget) = if confirmed {
                (Instant::now() + script.disconnect_grace, script.disconnect_grace)
            } else {
                (deadline, budget)
            };

            match self
                .collect(command, round_deadline, round_budget, &patterns)
                .await
            {
                Ok(Collected { stop, continuations: n }) => {
                    continuations += n;
                    match stop {
                        Stop::Prompt(prompt) => {
                            let result = self.finish(command, started, &prompt, continuations);
                            info!("{}: reload returned to the prompt", profile.name);
                            return Ok(ReloadOutcome::Returned(result));
                        }
                        Stop::Pattern(index) => {
                            rounds += 1;
                            self.confirm(command, &script.confirmations[index], rounds, script.max_rounds)
                                .await?;
                            confirmed = true;
                        }
                    }
                }
                Err(Error::Transport(e)) if confirmed && e.is_disconnect() => {
                    debug!("{}: disconnected after confirmation", profile.name);
                    return Ok(ReloadOutcome::Rebooting);
                }
                Err(Error::Timeout(_)) if confirmed => {
                    debug!(
                        "{}: silent for {:?} after confirmation",
                        profile.name, script.disconnect_grace
                    );
                    return Ok(ReloadOutcome::Rebooting);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Answer one confirmation.
    async fn confirm(
        &mut self,
        command: &str,
        prompt: &PendingPrompt,
        round: usize,
        max_rounds: usize,
    ) -> Result<()> {
        if round > max_rounds {
            return Err(ProtocolError::ConfirmationLimit {
                command: command.to_string(),
                limit: max_rounds,
            }
            .into());
        }
        debug!(
            "{}: confirming '{}' with '{}'",
            self.profile.name,
            command,
            prompt.loggable_response()
        );
        self.phase = Phase::AwaitingConfirmation;
        self.buffer.mark();
        if prompt.raw {
            self.send_raw(&prompt.response).await
        } else {
            self.send_line(&prompt.response).await
        }
    }

    /// Leave the device cleanly and close the channel.
    ///
    /// Config mode is left first when the profile asks for it, then paging
    /// is turned back on where the profile restores it. The exit
    /// commands go out without waiting for a prompt, since the last one
    /// usually ends the session; on a terminal server they also free the
    /// console port. Errors along the way are logged, the channel is
    /// closed regardless.
    pub async fn graceful_exit(&mut self) -> Result<()> {
        if self.channel.is_none() {
            self.health = Health::Closed;
            return Ok(());
        }
        let profile = self.profile.clone();
        let script = &profile.exit;

        if script.leave_config && self.mode == Mode::Config && self.health == Health::Ready {
            if let Err(e) = self.walk_to(Mode::Privileged).await {
                warn!("{}: could not leave config mode: {}", profile.name, e);
            }
        }

        if !script.restore_paging.is_empty() && self.health == Health::Ready {
            self.restore_paging(&script.restore_paging).await;
        }

        for command in &script.commands {
            debug!("{}: exit with '{}'", profile.name, command);
            if let Err(e) = self.send_line(command).await {
                debug!("{}: exit command not sent: {}", profile.name, e);
                break;
            }
        }

        self.drain(script.drain).await;
        self.close().await
    }

    /// Run the paging-restore commands from the paging mode, stopping at
    /// the first one that fails.
    async fn restore_paging(&mut self, commands: &[String]) {
        let name = self.profile.name.clone();
        if let Some(mode) = self.profile.paging_mode {
            if let Err(e) = self.walk_to(mode).await {
                warn!("{}: paging not restored, cannot reach {} mode: {}", name, mode, e);
                return;
            }
        }

        let timeout = self.timeouts.command;
        for command in commands {
            match self.run_command(command, timeout).await {
                Ok(result) => {
                    if let Some(failure) = result.failure_message {
                        warn!("{}: '{}' rejected ({})", name, command, failure);
                        break;
                    }
                }
                Err(e) => {
                    warn!("{}: paging not restored: {}", name, e);
                    break;
                }
            }
        }
    }

    /// Read and discard output for `period`, stopping early on disconnect.
    async fn drain(&mut self, period: Duration) {
        let deadline = Instant::now() + period;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = self.timeouts.poll_interval.min(deadline - now);
            if self.read_chunk(wait).await.is_err() {
                break;
            }
        }
        self.buffer.clear();
    }
}
