//! Telnet transport.
//!
//! Only enough of RFC 854 to reach a console: the server may echo and
//! suppress go-ahead, every other option is refused, subnegotiations are
//! skipped. Negotiation bytes never reach the session.

use std::collections::HashSet;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Transport;
use super::config::TelnetConfig;
use crate::channel::Channel;
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Incremental IAC parser. State survives across reads so a command split
/// between two TCP segments is still recognised.
#[derive(Debug)]
struct Negotiator {
    state: State,
    answered: HashSet<(u8, u8)>,
}

impl Negotiator {
    fn new() -> Self {
        Self {
            state: State::Data,
            answered: HashSet::new(),
        }
    }

    /// Split `input` into console data and the replies owed to the server.
    fn decode(&mut self, input: &[u8], data: &mut BytesMut, replies: &mut BytesMut) {
        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, b) => {
                    data.put_u8(b);
                    State::Data
                }
                (State::Iac, IAC) => {
                    data.put_u8(IAC);
                    State::Data
                }
                (State::Iac, WILL | WONT | DO | DONT) => State::Negotiate(byte),
                (State::Iac, SB) => State::Sub,
                (State::Iac, _) => State::Data,
                (State::Negotiate(verb), option) => {
                    self.answer(verb, option, replies);
                    State::Data
                }
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
            };
        }
    }

    fn answer(&mut self, verb: u8, option: u8, replies: &mut BytesMut) {
        let reply = match (verb, option) {
            (WILL, OPT_ECHO | OPT_SGA) => DO,
            (WILL, _) => DONT,
            (DO, _) => WONT,
            // WONT and DONT need no acknowledgement from a client that
            // never enabled anything on its own.
            _ => return,
        };
        if self.answered.insert((verb, option)) {
            trace!("telnet: answering {} {} with {}", verb, option, reply);
            replies.put_slice(&[IAC, reply, option]);
        }
    }
}

/// Escape IAC bytes in outgoing data.
fn escape(data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len());
    for &byte in data {
        if byte == IAC {
            out.put_u8(IAC);
        }
        out.put_u8(byte);
    }
    out.freeze()
}

/// Telnet console over any byte stream.
pub struct TelnetChannel<S> {
    stream: S,
    negotiator: Negotiator,
    read_buf: Vec<u8>,
    open: bool,
}

impl<S> TelnetChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            negotiator: Negotiator::new(),
            read_buf: vec![0u8; 4096],
            open: true,
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let result = async {
            self.stream.write_all(data).await?;
            self.stream.flush().await
        }
        .await;
        result.map_err(|e| {
            self.open = false;
            TransportError::Io(e)
        })
    }
}

impl<S> Channel for TelnetChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.write(&escape(data)).await
    }

    async fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }

        let n = match tokio::time::timeout(timeout, self.stream.read(&mut self.read_buf)).await {
            Err(_) => return Ok(vec![]),
            Ok(Ok(0)) => {
                debug!("telnet: connection closed by peer");
                self.open = false;
                return Err(TransportError::Disconnected);
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                self.open = false;
                return Err(TransportError::Io(e));
            }
        };

        let mut data = BytesMut::with_capacity(n);
        let mut replies = BytesMut::new();
        self.negotiator
            .decode(&self.read_buf[..n], &mut data, &mut replies);
        if !replies.is_empty() {
            self.write(&replies).await?;
        }
        Ok(data.to_vec())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        if let Err(e) = self.stream.shutdown().await {
            debug!("telnet: shutdown failed: {}", e);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn line_terminator(&self) -> &str {
        "\r\n"
    }
}

/// Opens a Telnet console over TCP.
#[derive(Debug, Clone)]
pub struct TelnetTransport {
    config: TelnetConfig,
}

impl TelnetTransport {
    /// Create a transport for the given configuration.
    pub fn new(config: TelnetConfig) -> Self {
        Self { config }
    }

    /// Connect to the configured host and port.
    pub async fn connect(config: TelnetConfig) -> Result<TelnetChannel<TcpStream>, TransportError> {
        debug!("Connecting to {}:{} over telnet", config.host, config.port);
        let stream = tokio::time::timeout(
            config.timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;
        stream.set_nodelay(true)?;
        Ok(TelnetChannel::new(stream))
    }
}

impl Transport for TelnetTransport {
    type Channel = TelnetChannel<TcpStream>;

    async fn open(self) -> Result<Self::Channel, TransportError> {
        Self::connect(self.config).await
    }
}
