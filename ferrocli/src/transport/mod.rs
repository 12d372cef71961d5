//! Concrete transports behind the [`Channel`](crate::channel::Channel) trait.
//!
//! SSH goes through russh with a PTY shell; Telnet is a thin IAC filter over
//! a TCP stream.

pub mod config;
mod ssh;
mod telnet;

pub use config::{AuthMethod, HostKeyVerification, SshConfig, TelnetConfig};
pub use ssh::{SshChannel, SshTransport};
pub use telnet::{TelnetChannel, TelnetTransport};

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::channel::Channel;
use crate::error::TransportError;

/// Something that can open a [`Channel`] to a device.
pub trait Transport: Send {
    /// The channel this transport produces.
    type Channel: Channel;

    /// Connect and return a channel ready for the console dialog.
    fn open(self) -> impl Future<Output = Result<Self::Channel, TransportError>> + Send;
}

/// Either built-in channel, for callers choosing the protocol at runtime.
pub enum AnyChannel {
    Ssh(SshChannel),
    Telnet(TelnetChannel<TcpStream>),
}

impl Channel for AnyChannel {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            AnyChannel::Ssh(c) => c.send(data).await,
            AnyChannel::Telnet(c) => c.send(data).await,
        }
    }

    async fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        match self {
            AnyChannel::Ssh(c) => c.read_available(timeout).await,
            AnyChannel::Telnet(c) => c.read_available(timeout).await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self {
            AnyChannel::Ssh(c) => c.close().await,
            AnyChannel::Telnet(c) => c.close().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            AnyChannel::Ssh(c) => c.is_open(),
            AnyChannel::Telnet(c) => c.is_open(),
        }
    }

    fn line_terminator(&self) -> &str {
        match self {
            AnyChannel::Ssh(c) => c.line_terminator(),
            AnyChannel::Telnet(c) => c.line_terminator(),
        }
    }
}

impl From<SshChannel> for AnyChannel {
    fn from(channel: SshChannel) -> Self {
        AnyChannel::Ssh(channel)
    }
}

impl From<TelnetChannel<TcpStream>> for AnyChannel {
    fn from(channel: TelnetChannel<TcpStream>) -> Self {
        AnyChannel::Telnet(channel)
    }
}
