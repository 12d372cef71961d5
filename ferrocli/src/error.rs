//! Error types for ferrocli.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::profile::Mode;

/// Main error type for ferrocli operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Socket or channel failure. Never retried automatically.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Bad credentials or an access-denied banner during login.
    #[error("Authentication failed for user '{user}' after {attempts} attempt(s): {reason}")]
    Authentication {
        user: String,
        attempts: u32,
        reason: String,
    },

    /// No terminating prompt matched before the deadline.
    #[error("No prompt matched within {0:?}")]
    Timeout(Duration),

    /// The device did not behave the way its profile describes.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A mode change landed somewhere other than the requested mode.
    #[error("Failed to enter mode '{target}' (device is in '{reached}')")]
    ModeTransition { target: Mode, reached: Mode },

    /// Invalid device profile.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Session state does not allow the operation.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// The operation was cancelled between polls.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Transport layer errors (socket, SSH, Telnet).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// SSH-level authentication was rejected
    #[error("SSH authentication rejected for user '{user}'")]
    AuthenticationRejected { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key not present in known_hosts (strict mode)
    #[error("Unknown host key for {host}:{port}")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Failed to open a PTY shell on the SSH connection
    #[error("Failed to open shell channel")]
    ShellRequestFailed,

    /// The peer closed the connection
    #[error("Connection disconnected")]
    Disconnected,

    /// Write attempted on a channel that is already closed
    #[error("Channel closed")]
    Closed,

    /// Connecting timed out
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether this error means the peer went away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Disconnected | TransportError::Closed => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Device/profile mismatches. Not recoverable by retrying.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Pager kept asking for more input
    #[error("Pagination limit of {limit} continuations exceeded for '{command}'")]
    PaginationLimit { command: String, limit: usize },

    /// Command completed in a mode the caller did not expect
    #[error("Command '{command}' ended in mode '{actual}', expected '{expected}'")]
    UnexpectedMode {
        command: String,
        expected: Mode,
        actual: Mode,
    },

    /// Confirmation prompts kept coming
    #[error("Too many confirmation prompts ({limit}) for '{command}'")]
    ConfirmationLimit { command: String, limit: usize },

    /// A failure substring appeared in lifecycle output
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Profile lacks what the operation needs
    #[error("Profile '{profile}' does not define {what}")]
    Unsupported { profile: String, what: String },
}

/// Device profile definition errors.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Two modes share one prompt pattern
    #[error("Prompt pattern '{pattern}' is declared for both '{first}' and '{second}'")]
    AmbiguousPrompt {
        pattern: String,
        first: Mode,
        second: Mode,
    },

    /// Invalid profile definition
    #[error("Invalid profile definition: {message}")]
    InvalidDefinition { message: String },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Unknown profile name
    #[error("Unknown profile: {name}")]
    UnknownProfile { name: String },

    /// Profile already registered
    #[error("Profile already registered: {name}")]
    AlreadyRegistered { name: String },
}

/// Session state errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session closed - open a new one
    #[error("Session is closed")]
    Closed,

    /// A previous command was interrupted; call `resync()` first
    #[error("Session requires resync before reuse")]
    ResyncRequired,

    /// A previous protocol error left the session unusable
    #[error("Session is unusable after a protocol error")]
    Unusable,

    /// Missing builder input
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias using ferrocli's Error.
pub type Result<T> = std::result::Result<T, Error>;
