//! Scripted in-memory channel for session tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::Channel;
use crate::error::TransportError;

enum Reply {
    Data(Vec<Vec<u8>>),
    Disconnect,
}

struct Exchange {
    expect: String,
    reply: Reply,
}

/// A channel that answers expected sends with canned output.
///
/// Sends are compared with their line terminator stripped. A send that does
/// not match the next scripted exchange is recorded and otherwise ignored,
/// which looks like a silent device.
pub(crate) struct ScriptedChannel {
    pending: VecDeque<Vec<u8>>,
    exchanges: VecDeque<Exchange>,
    sent: Arc<Mutex<Vec<String>>>,
    disconnect: bool,
    open: bool,
    terminator: &'static str,
    idle: Option<Vec<u8>>,
}

impl ScriptedChannel {
    pub(crate) fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            exchanges: VecDeque::new(),
            sent: Arc::new(Mutex::new(vec![])),
            disconnect: false,
            open: true,
            terminator: "\n",
            idle: None,
        }
    }

    /// Output available before anything is sent (banner, first prompt).
    pub(crate) fn output(mut self, data: &str) -> Self {
        self.pending.push_back(data.as_bytes().to_vec());
        self
    }

    /// Reply to `expect` with `reply` in one read.
    pub(crate) fn on(self, expect: &str, reply: &str) -> Self {
        self.on_chunks(expect, &[reply])
    }

    /// Reply to `expect` with one read per chunk.
    pub(crate) fn on_chunks(mut self, expect: &str, chunks: &[&str]) -> Self {
        self.exchanges.push_back(Exchange {
            expect: expect.to_string(),
            reply: Reply::Data(chunks.iter().map(|c| c.as_bytes().to_vec()).collect()),
        });
        self
    }

    /// Drop the connection once `expect` is sent.
    pub(crate) fn disconnect_on(mut self, expect: &str) -> Self {
        self.exchanges.push_back(Exchange {
            expect: expect.to_string(),
            reply: Reply::Disconnect,
        });
        self
    }

    /// Output repeated on every read that would otherwise be idle, after
    /// the read's timeout has passed.
    pub(crate) fn idle_output(mut self, data: &str) -> Self {
        self.idle = Some(data.as_bytes().to_vec());
        self
    }

    pub(crate) fn terminator(mut self, terminator: &'static str) -> Self {
        self.terminator = terminator;
        self
    }

    /// Handle on everything sent so far, terminators stripped.
    pub(crate) fn sent_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }
}

impl Channel for ScriptedChannel {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let text = String::from_utf8_lossy(data);
        let text = text.strip_suffix(self.terminator).unwrap_or(&text).to_string();
        self.sent.lock().unwrap().push(text.clone());

        if self.exchanges.front().is_some_and(|e| e.expect == text) {
            let exchange = self.exchanges.pop_front().unwrap();
            match exchange.reply {
                Reply::Data(chunks) => self.pending.extend(chunks),
                Reply::Disconnect => self.disconnect = true,
            }
        }
        Ok(())
    }

    async fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(chunk);
        }
        if self.disconnect {
            self.open = false;
            return Err(TransportError::Disconnected);
        }
        tokio::time::sleep(timeout).await;
        Ok(self.idle.clone().unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn line_terminator(&self) -> &str {
        self.terminator
    }
}
