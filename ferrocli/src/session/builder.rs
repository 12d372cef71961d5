//! Builder for connecting sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::{CancelToken, Credentials, Session};
use crate::error::{Result, SessionError};
use crate::profile::{DeviceProfile, ProfileRegistry, Timeouts};
use crate::transport::{
    AnyChannel, AuthMethod, HostKeyVerification, SshConfig, SshTransport, TelnetConfig,
    TelnetTransport,
};

/// Wire protocol to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Ssh,
    Telnet,
}

impl Protocol {
    /// Standard port for the protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ssh => 22,
            Protocol::Telnet => 23,
        }
    }
}

/// Builder for connecting a [`Session`] over SSH or Telnet.
///
/// # Example
///
/// ```rust,no_run
/// use ferrocli::session::{Protocol, SessionBuilder};
///
/// # async fn example() -> Result<(), ferrocli::Error> {
/// let mut session = SessionBuilder::new("ts1.example.net")
///     .protocol(Protocol::Telnet)
///     .port(2005)
///     .username("admin")
///     .password("secret")
///     .enable_secret("enable-secret")
///     .profile("audiocodes")
///     .connect()
///     .await?;
/// # session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SessionBuilder {
    host: String,
    port: Option<u16>,
    protocol: Protocol,
    username: Option<String>,
    password: Option<SecretString>,
    enable_secret: Option<SecretString>,
    private_key: Option<(PathBuf, Option<SecretString>)>,
    profile_name: Option<String>,
    custom_profile: Option<DeviceProfile>,
    timeouts: Option<Timeouts>,
    connect_timeout: Duration,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    cancel: CancelToken,
}

impl SessionBuilder {
    /// Create a new builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            protocol: Protocol::default(),
            username: None,
            password: None,
            enable_secret: None,
            private_key: None,
            profile_name: None,
            custom_profile: None,
            timeouts: None,
            connect_timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            cancel: CancelToken::new(),
        }
    }

    /// Set the protocol (default: SSH).
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the port (default: the protocol's standard port).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password, used for SSH authentication and the console login.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set a separate enable secret.
    pub fn enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Use private key authentication for SSH.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.private_key = Some((key_path.into(), None));
        self
    }

    /// Use an encrypted private key for SSH.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.private_key = Some((
            key_path.into(),
            Some(SecretString::from(passphrase.into())),
        ));
        self
    }

    /// Use a registered profile (e.g., "adtran_aos").
    pub fn profile(mut self, name: impl Into<String>) -> Self {
        self.profile_name = Some(name.into());
        self
    }

    /// Use a custom profile.
    pub fn custom_profile(mut self, profile: DeviceProfile) -> Self {
        self.custom_profile = Some(profile);
        self
    }

    /// Override the profile's timeouts.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set terminal dimensions (SSH only).
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set host key verification (SSH only).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Set the known_hosts file (SSH only).
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Token that can cancel login and later operations.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Connect and log in.
    pub async fn connect(self) -> Result<Session<AnyChannel>> {
        let profile = self.resolve_profile()?;
        let credentials = self.credentials()?;

        let channel: AnyChannel = match self.protocol {
            Protocol::Ssh => SshTransport::connect(self.ssh_config(credentials.username()))
                .await?
                .into(),
            Protocol::Telnet => TelnetTransport::connect(self.telnet_config()).await?.into(),
        };

        Session::login_with_cancel(channel, profile, credentials, self.cancel).await
    }

    fn resolve_profile(&self) -> Result<Arc<DeviceProfile>> {
        let profile = match (&self.custom_profile, &self.profile_name) {
            (Some(custom), _) => Arc::new(custom.clone()),
            (None, Some(name)) => ProfileRegistry::lookup(name)?,
            (None, None) => {
                return Err(SessionError::InvalidConfig {
                    message: "a profile must be specified".to_string(),
                }
                .into());
            }
        };

        Ok(match self.timeouts {
            Some(timeouts) => {
                let mut profile = (*profile).clone();
                profile.timeouts = timeouts;
                Arc::new(profile)
            }
            None => profile,
        })
    }

    fn credentials(&self) -> Result<Credentials> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| SessionError::InvalidConfig {
                message: "username is required".to_string(),
            })?;
        let password = self
            .password
            .as_ref()
            .map(|p| p.expose_secret())
            .unwrap_or_default();
        let mut credentials = Credentials::new(username, password);
        if let Some(secret) = &self.enable_secret {
            credentials = credentials.with_enable_secret(secret.expose_secret());
        }
        Ok(credentials)
    }

    fn ssh_config(&self, username: &str) -> SshConfig {
        let auth = match (&self.private_key, &self.password) {
            (Some((path, passphrase)), _) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: passphrase.clone(),
            },
            (None, Some(password)) => AuthMethod::Password(password.clone()),
            (None, None) => AuthMethod::None,
        };

        SshConfig {
            port: self.port.unwrap_or(Protocol::Ssh.default_port()),
            timeout: self.connect_timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification.clone(),
            known_hosts_path: self.known_hosts_path.clone(),
            ..SshConfig::new(self.host.clone(), username, auth)
        }
    }

    fn telnet_config(&self) -> TelnetConfig {
        TelnetConfig {
            port: self.port.unwrap_or(Protocol::Telnet.default_port()),
            timeout: self.connect_timeout,
            ..TelnetConfig::new(self.host.clone())
        }
    }
}
