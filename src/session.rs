//! In-flight write requests
//!
//! A `WriteSession` lives while one `write` call is inside the terminal
//! monitor. It hands out wire bytes one at a time, splitting every bare
//! `\n` into `\r` then `\n`, and counts source bytes the device has
//! accepted. The injected `\r` never counts as a source byte.

/// One byte headed for the data register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireByte {
    pub byte: u8,
    /// Whether transmitting this byte finishes a byte of the caller's buffer
    pub completes_source: bool,
}

/// State of a single write call
#[derive(Debug, Clone)]
pub struct WriteSession {
    data: Box<[u8]>,
    /// Index of the next source byte to put on the wire
    next: usize,
    /// Source bytes the device has finished displaying
    acknowledged: usize,
    /// A `\r` went out for `data[next]` and its `\n` is still owed
    owes_line_feed: bool,
}

impl WriteSession {
    /// Start a session for `data`
    ///
    /// The bytes are copied: the interrupt side reads them after `write`
    /// releases the lock to wait, so the session cannot borrow the caller's
    /// buffer across that wait.
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.into(),
            next: 0,
            acknowledged: 0,
            owes_line_feed: false,
        }
    }

    /// Source bytes the device has accepted
    #[cfg(test)]
    fn acknowledged(&self) -> usize {
        self.acknowledged
    }

    /// Next byte to transmit, or `None` once every source byte is out
    pub fn next_wire_byte(&mut self) -> Option<WireByte> {
        let byte = *self.data.get(self.next)?;
        if byte == b'\n' && !self.owes_line_feed {
            self.owes_line_feed = true;
            return Some(WireByte {
                byte: b'\r',
                completes_source: false,
            });
        }
        self.owes_line_feed = false;
        self.next += 1;
        Some(WireByte {
            byte,
            completes_source: true,
        })
    }

    /// Record that the device finished a source byte
    pub fn acknowledge(&mut self) {
        debug_assert!(self.acknowledged < self.next);
        self.acknowledged += 1;
    }

    /// Check if every source byte has been accepted by the device
    pub fn is_complete(&self) -> bool {
        self.acknowledged == self.data.len()
    }
}
