//! Prompt and pager detection over a growing output buffer.
//!
//! Matching is anchored to the end of what has arrived so far: a prompt
//! string echoed in the middle of legitimate output never ends a command.
//! Only the last line is examined, after trailing whitespace.

use std::time::Duration;

use memchr::memrchr;
use regex::bytes::Regex;

use crate::profile::{DeviceProfile, Mode, PromptPattern};

/// A prompt that matched at the end of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMatch {
    /// Mode the matched prompt belongs to.
    pub mode: Mode,

    /// Start of the line holding the prompt.
    pub line_start: usize,

    /// Start of the regex match.
    pub start: usize,

    /// End of the regex match.
    pub end: usize,

    /// True when nothing, not even whitespace, follows the match.
    pub exact: bool,

    /// Declaration index of the winning pattern.
    pub index: usize,
}

impl PromptMatch {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// What the matcher decided about the current buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The device is waiting for the next command.
    Prompt(PromptMatch),

    /// The device paused output behind a pager.
    /// `line_start..end` covers the whole pager line.
    Continuation { line_start: usize, end: usize },

    /// Keep reading.
    Pending,
}

/// Data-driven matcher over a profile's prompt patterns.
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    prompts: Vec<PromptPattern>,
    continuation: Option<Regex>,
}

impl PromptMatcher {
    /// Create a matcher from ordered prompt patterns and an optional pager
    /// pattern. Earlier prompts win ties.
    pub fn new(prompts: Vec<PromptPattern>, continuation: Option<Regex>) -> Self {
        Self {
            prompts,
            continuation,
        }
    }

    /// Build the matcher for a profile.
    pub fn from_profile(profile: &DeviceProfile) -> Self {
        Self::new(
            profile.prompts.clone(),
            profile.pager.as_ref().map(|p| p.continuation.clone()),
        )
    }

    /// Evaluate the buffer.
    ///
    /// Both a prompt and the pager can match the same last line when the
    /// pager text ends in a prompt terminator (`<--- More --->`). The match
    /// starting first covers the other one and wins; on equal starts the
    /// pager wins.
    pub fn evaluate(&self, data: &[u8]) -> MatchOutcome {
        let pager = self
            .continuation
            .as_ref()
            .and_then(|pattern| match_at_end(pattern, data));

        match (self.match_prompt(data), pager) {
            (Some(prompt), Some(pager)) if prompt.start < pager.start => MatchOutcome::Prompt(prompt),
            (Some(prompt), None) => MatchOutcome::Prompt(prompt),
            (_, Some(pager)) => MatchOutcome::Continuation {
                line_start: pager.line_start,
                end: data.len(),
            },
            (None, None) => MatchOutcome::Pending,
        }
    }

    /// Find the prompt ending the buffer, if any.
    ///
    /// Ties between patterns go to the longest match, then to the one
    /// declared first.
    pub fn match_prompt(&self, data: &[u8]) -> Option<PromptMatch> {
        let line = LastLine::of(data)?;
        let text = String::from_utf8_lossy(&data[line.start..line.content_end]);

        let mut best: Option<PromptMatch> = None;
        for (index, prompt) in self.prompts.iter().enumerate() {
            if prompt.excludes(&text) {
                continue;
            }
            let Some((start, end)) = line.find(&prompt.pattern, data) else {
                continue;
            };
            let candidate = PromptMatch {
                mode: prompt.mode,
                line_start: line.start,
                start,
                end,
                exact: end == data.len(),
                index,
            };
            best = match best {
                Some(current) if current.len() >= candidate.len() => Some(current),
                _ => Some(candidate),
            };
        }
        best
    }

    /// Find a pager prompt ending the buffer, returning the pager line span.
    pub fn match_continuation(&self, data: &[u8]) -> Option<(usize, usize)> {
        let pattern = self.continuation.as_ref()?;
        match_at_end(pattern, data).map(|m| (m.line_start, data.len()))
    }

    /// The prompt patterns, in declaration order.
    pub fn prompts(&self) -> &[PromptPattern] {
        &self.prompts
    }
}

/// A match of a single pattern at the end of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailMatch {
    /// Start of the line holding the match.
    pub line_start: usize,

    /// Start of the regex match.
    pub start: usize,

    /// End of the regex match.
    pub end: usize,
}

/// Match `pattern` against the last line of `data`, accepting it only when
/// nothing but whitespace follows. Used for login and confirmation prompts.
pub fn match_at_end(pattern: &Regex, data: &[u8]) -> Option<TailMatch> {
    let line = LastLine::of(data)?;
    line.find(pattern, data).map(|(start, end)| TailMatch {
        line_start: line.start,
        start,
        end,
    })
}

/// The last non-blank line of a buffer.
struct LastLine {
    start: usize,
    content_end: usize,
}

impl LastLine {
    fn of(data: &[u8]) -> Option<Self> {
        let content_end = data
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map(|i| i + 1)?;
        let start = memrchr(b'\n', &data[..content_end]).map_or(0, |i| i + 1);
        Some(Self { start, content_end })
    }

    /// Find a match of `pattern` in this line that reaches the end of the
    /// line's content. Offsets are relative to `data`.
    fn find(&self, pattern: &Regex, data: &[u8]) -> Option<(usize, usize)> {
        let line = &data[self.start..];
        pattern
            .find_iter(line)
            .map(|m| (self.start + m.start(), self.start + m.end()))
            .filter(|&(_, end)| end >= self.content_end)
            .min_by_key(|&(start, _)| start)
    }
}

/// When a matched prompt may be trusted.
///
/// A prompt that ends the buffer byte-for-byte is accepted at once. One
/// followed by stray whitespace is only accepted after `window` passes with
/// no new bytes, since the device may still be talking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuiescencePolicy {
    /// Quiet time required before accepting an inexact match.
    pub window: Duration,

    /// Require the quiet window even for exact matches. Useful for devices
    /// that print their prompt, then a late log line.
    pub settle_exact: bool,
}

impl QuiescencePolicy {
    /// Policy with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            settle_exact: false,
        }
    }

    /// Whether the match must wait for the quiet window.
    pub fn needs_settle(&self, m: &PromptMatch) -> bool {
        self.settle_exact || !m.exact
    }
}

impl Default for QuiescencePolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}
