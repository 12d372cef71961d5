//! Transport connection settings.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// How the SSH layer authenticates.
///
/// Appliances that run their own login dialog inside the shell are reached
/// with [`AuthMethod::None`]; the session then answers the console prompts.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// No SSH-level authentication.
    None,

    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}

/// SSH connection configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Username for SSH authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,

    /// Connect timeout; also the SSH inactivity timeout.
    pub timeout: Duration,

    /// Terminal width for the PTY.
    pub terminal_width: u32,

    /// Terminal height for the PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// known_hosts file; the user's default when unset.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// Configuration with defaults for everything but host and user.
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            auth,
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

/// Telnet connection configuration.
#[derive(Debug, Clone)]
pub struct TelnetConfig {
    /// Target host (hostname or IP address). Terminal servers are addressed
    /// by host and the port mapped to the console line.
    pub host: String,

    /// TCP port (default: 23).
    pub port: u16,

    /// Connect timeout.
    pub timeout: Duration,
}

impl TelnetConfig {
    /// Configuration for `host` on the standard port.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 23,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the TCP port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_defaults() {
        let config = SshConfig::new("10.0.0.1", "admin", AuthMethod::None);
        assert_eq!(config.port, 22);
        assert_eq!(config.terminal_width, 511);
        assert!(matches!(
            config.host_key_verification,
            HostKeyVerification::AcceptNew
        ));
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let config = SshConfig::new(
            "10.0.0.1",
            "admin",
            AuthMethod::Password(SecretString::from("hunter2")),
        );
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_telnet_port() {
        let config = TelnetConfig::new("ts1").with_port(2005);
        assert_eq!(config.port, 2005);
    }
}
