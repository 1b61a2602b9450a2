//! Echo pipeline
//!
//! Turns raw keystrokes into the bytes that should appear on screen as a
//! side effect of typing. Newlines are displayed as `\r` followed by `\n`
//! and an erase is displayed as `\b`, `' '`, `\b`; the trailing bytes of
//! those sequences are owed fragments that go out before anything else
//! queued.

use crate::ring::RingBuffer;

/// Audible bell
pub const BELL: u8 = 0x07;
/// Backspace
pub const BACKSPACE: u8 = 0x08;
/// Delete, treated the same as backspace
pub const DELETE: u8 = 0x7f;

/// Check if a raw keystroke asks to erase the previous character
pub fn is_erase(byte: u8) -> bool {
    byte == BACKSPACE || byte == DELETE
}

/// Check if a raw keystroke ends a line
pub fn is_newline(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// What the echo decision did with a keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoOutcome {
    /// The keystroke was queued for display
    Echoed,
    /// An erase sequence was queued
    Erased,
    /// Only the reserved slot was left, so a bell was queued instead
    Bell,
    /// No room at all
    Dropped,
    /// Erase at column 0, nothing to do
    Ignored,
}

/// Display bytes still owed after the head of a multi-byte sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fragment {
    LineFeed,
    EraseSpace,
    EraseBackspace,
}

/// Echo ring plus the on-screen column it drives
#[derive(Debug, Clone)]
pub struct EchoEngine {
    ring: RingBuffer<u8>,
    /// Column the cursor will be in once everything queued is displayed
    column: usize,
    owed: Option<Fragment>,
}

impl EchoEngine {
    /// Create an engine with an echo ring of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
            column: 0,
            owed: None,
        }
    }

    /// Current screen column
    pub fn column(&self) -> usize {
        self.column
    }

    /// Check if anything, fragment or queued byte, is waiting to be displayed
    #[cfg(test)]
    fn has_pending(&self) -> bool {
        self.owed.is_some() || !self.ring.is_empty()
    }

    /// Decide what a raw keystroke puts on screen
    ///
    /// One slot is always kept back so that a full ring can still ring the bell.
    pub fn echo_keystroke(&mut self, raw: u8) -> EchoOutcome {
        if is_erase(raw) {
            if self.column == 0 {
                return EchoOutcome::Ignored;
            }
            if self.ring.push(BACKSPACE).is_err() {
                return EchoOutcome::Dropped;
            }
            self.column -= 1;
            return EchoOutcome::Erased;
        }

        match self.ring.free() {
            0 => EchoOutcome::Dropped,
            1 => {
                let _ = self.ring.push(BELL);
                EchoOutcome::Bell
            },
            _ => {
                let _ = self.ring.push(raw);
                if is_newline(raw) {
                    self.column = 0;
                } else {
                    self.column += 1;
                }
                EchoOutcome::Echoed
            },
        }
    }

    /// Queue a bell if there is any room at all
    pub fn ring_bell(&mut self) -> bool {
        self.ring.push(BELL).is_ok()
    }

    /// Next owed half of a newline or erase sequence, if any
    pub fn next_fragment(&mut self) -> Option<u8> {
        match self.owed.take()? {
            Fragment::LineFeed => Some(b'\n'),
            Fragment::EraseSpace => {
                self.owed = Some(Fragment::EraseBackspace);
                Some(b' ')
            },
            Fragment::EraseBackspace => Some(BACKSPACE),
        }
    }

    /// Start displaying the oldest queued byte
    pub fn next_queued(&mut self) -> Option<u8> {
        let byte = self.ring.pop()?;
        Some(match byte {
            b'\r' | b'\n' => {
                self.owed = Some(Fragment::LineFeed);
                b'\r'
            },
            BACKSPACE => {
                self.owed = Some(Fragment::EraseSpace);
                BACKSPACE
            },
            other => other,
        })
    }

    /// Next byte to display: owed fragments first, then the ring
    pub fn next_byte(&mut self) -> Option<u8> {
        self.next_fragment().or_else(|| self.next_queued())
    }

    /// Track the column for a byte an application wrote to the screen
    pub fn note_written(&mut self, byte: u8) {
        match byte {
            b'\r' | b'\n' => self.column = 0,
            BACKSPACE => self.column = self.column.saturating_sub(1),
            BELL => {},
            _ => self.column += 1,
        }
    }

    /// Forget everything queued and return to column 0
    pub fn reset(&mut self) {
        self.ring.clear();
        self.column = 0;
        self.owed = None;
    }
}
