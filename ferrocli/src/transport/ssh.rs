//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{ChannelMsg, Disconnect};
use secrecy::ExposeSecret;

use super::Transport;
use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::channel::Channel;
use crate::error::TransportError;

/// Opens an interactive PTY shell over SSH.
#[derive(Debug, Clone)]
pub struct SshTransport {
    config: SshConfig,
}

impl SshTransport {
    /// Create a transport for the given configuration.
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Connect, authenticate and start a shell.
    pub async fn connect(config: SshConfig) -> Result<SshChannel, TransportError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("Connecting to {}:{} over SSH", config.host, config.port);
        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // check_server_key leaves the detailed reason behind; prefer it
            // over the generic russh::Error::UnknownKey.
            host_key_error
                .lock()
                .ok()
                .and_then(|mut stored| stored.take())
                .unwrap_or(TransportError::Ssh(e))
        })?;

        Self::authenticate(&mut session, &config).await?;

        let channel = session.channel_open_session().await?;
        channel
            .request_pty(
                true,
                "vt100",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await?;
        channel
            .request_shell(true)
            .await
            .map_err(|_| TransportError::ShellRequestFailed)?;

        debug!("SSH shell open on {}:{}", config.host, config.port);
        Ok(SshChannel {
            session,
            channel,
            open: true,
        })
    }

    async fn authenticate(
        session: &mut Handle<SshHandler>,
        config: &SshConfig,
    ) -> Result<(), TransportError> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Best RSA hash algorithm the server supports
                let hash_alg = session.best_supported_rsa_hash().await?.flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await?
                    .success()
            }
        };

        // Appliances with their own console login often accept `none` and
        // prompt inside the shell, so only explicit credentials are fatal.
        if !success && !matches!(config.auth, AuthMethod::None) {
            return Err(TransportError::AuthenticationRejected {
                user: config.username.clone(),
            });
        }

        Ok(())
    }
}

impl Transport for SshTransport {
    type Channel = SshChannel;

    async fn open(self) -> Result<SshChannel, TransportError> {
        Self::connect(self.config).await
    }
}

/// Interactive shell channel on an SSH connection.
pub struct SshChannel {
    session: Handle<SshHandler>,
    channel: russh::Channel<Msg>,
    open: bool,
}

impl Channel for SshChannel {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.channel.data(data).await.map_err(|e| {
            self.open = false;
            TransportError::Ssh(e)
        })
    }

    async fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }

        let msg = match tokio::time::timeout(timeout, self.channel.wait()).await {
            Err(_) => return Ok(vec![]),
            Ok(msg) => msg,
        };

        match msg {
            Some(ChannelMsg::Data { data }) => Ok(data.to_vec()),
            Some(ChannelMsg::ExtendedData { data, .. }) => Ok(data.to_vec()),
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                trace!("Remote shell exited with status {}", exit_status);
                Ok(vec![])
            }
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                debug!("SSH channel closed by peer");
                self.open = false;
                Err(TransportError::Disconnected)
            }
            Some(other) => {
                trace!("Ignoring channel message {:?}", other);
                Ok(vec![])
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let _ = self.channel.eof().await;
        if let Err(e) = self
            .session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!("SSH disconnect failed: {}", e);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open && !self.session.is_closed()
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// `Ok(false)` means the host is not listed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = match &self.known_hosts_path {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut stored) = self.host_key_error.lock() {
            *stored = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,
            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },
            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };
        Ok(accepted)
    }
}
