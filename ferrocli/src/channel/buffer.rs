//! Pattern buffer with tail-search optimization.
//!
//! Only the last N bytes of the buffer are searched for prompt patterns,
//! rather than the entire output. For large outputs (full routing tables,
//! long call logs) this is critical for performance.
//!
//! Incoming bytes go through a `vte` parser so escape sequences are dropped
//! and backspaces erase the previous byte, the way a terminal would show
//! them. Nothing else of the terminal is emulated.
//!
//! A floor separates settled output (already acted on: a dismissed pager
//! line, an answered confirmation) from fresh output. Bytes below the floor
//! are neither searched nor erased by backspaces.

use std::fmt;

/// Buffer for accumulating output and searching its tail for patterns.
pub struct PatternBuffer {
    /// The accumulated, cleaned output.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    /// Start of the unsettled region.
    floor: usize,

    /// Escape-sequence state carried across reads.
    parser: vte::Parser,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    ///
    /// # Arguments
    ///
    /// * `search_depth` - Number of bytes from the end to search for patterns.
    ///   Default recommendation is 1000 bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            floor: 0,
            parser: vte::Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping escape sequences.
    ///
    /// A sequence split across two calls is still recognised.
    pub fn extend(&mut self, data: &[u8]) {
        let mut sink = Sink {
            out: &mut self.buffer,
            floor: self.floor,
        };
        self.parser.advance(&mut sink, data);
    }

    /// Byte offset in the buffer where the searchable tail starts.
    pub fn tail_start(&self) -> usize {
        self.buffer
            .len()
            .saturating_sub(self.search_depth)
            .max(self.floor)
    }

    /// The searchable tail of the buffer.
    pub fn tail(&self) -> &[u8] {
        &self.buffer[self.tail_start()..]
    }

    /// Drop everything from `at` to the end of the buffer and settle what
    /// remains.
    pub fn truncate(&mut self, at: usize) {
        self.buffer.truncate(at);
        self.floor = self.buffer.len();
    }

    /// Settle everything received so far.
    pub fn mark(&mut self) {
        self.floor = self.buffer.len();
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.floor = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and any half-parsed escape sequence.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.floor = 0;
        self.parser = vte::Parser::new();
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .field("floor", &self.floor)
            .finish()
    }
}

/// vte performer writing printable text into the buffer.
struct Sink<'a> {
    out: &'a mut Vec<u8>,
    floor: usize,
}

impl vte::Perform for Sink<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | b'\r' | b'\t' => self.out.push(byte),
            // backspace
            0x08 => {
                if self.out.len() > self.floor && self.out.last() != Some(&b'\n') {
                    self.out.pop();
                }
            }
            _ => {}
        }
    }
}
