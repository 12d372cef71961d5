//! Channel layer: byte transport contract, output buffering and prompt
//! detection.
//!
//! A [`Channel`] only moves bytes. Deciding when the device is done talking
//! is the job of [`PromptMatcher`] over a [`PatternBuffer`].

mod buffer;
#[cfg(test)]
pub(crate) mod mock;
mod patterns;

pub use buffer::PatternBuffer;
pub use patterns::{MatchOutcome, PromptMatch, PromptMatcher, QuiescencePolicy, TailMatch, match_at_end};

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// Ordered byte stream to a device console.
///
/// Implementations deliver every byte exactly once and in order. Telnet
/// option negotiation and SSH framing stay below this trait.
pub trait Channel: Send {
    /// Write bytes as-is. Fails when the channel is closed.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Bytes that arrived within `timeout`.
    ///
    /// An empty vector means nothing arrived; that is a normal polling
    /// outcome. A peer that went away is [`TransportError::Disconnected`].
    fn read_available(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Close the channel. Closing twice is not an error.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the channel can still carry data.
    fn is_open(&self) -> bool;

    /// What ends a line on this transport.
    fn line_terminator(&self) -> &str {
        "\n"
    }
}
