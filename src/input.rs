//! Line assembly for readers
//!
//! Keystrokes land here after the echo decision. `\r` has already been
//! normalized to `\n` by the caller. A line is complete once its `\n` is
//! stored, and a complete line can no longer be edited.

use crate::ring::RingBuffer;

/// Result of storing one keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Stored in the middle of a line
    Stored,
    /// Stored a `\n`, completing a line
    LineCompleted,
    /// No room; the keystroke was lost
    Full,
}

/// The ring emptied before a line terminator was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Underrun {
    /// Bytes copied before the ring ran dry
    pub copied: usize,
}

/// Input ring with a count of complete lines
#[derive(Debug, Clone)]
pub struct InputAssembler {
    ring: RingBuffer<u8>,
    lines: usize,
}

impl InputAssembler {
    /// Create an assembler buffering at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
            lines: 0,
        }
    }

    /// Maximum number of buffered bytes
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Bytes currently buffered
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of complete lines a reader may consume
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Check if a reader can make progress
    pub fn has_line(&self) -> bool {
        self.lines > 0
    }

    /// Store one normalized keystroke
    pub fn push(&mut self, byte: u8) -> InputOutcome {
        if self.ring.push(byte).is_err() {
            return InputOutcome::Full;
        }
        if byte == b'\n' {
            self.lines += 1;
            InputOutcome::LineCompleted
        } else {
            InputOutcome::Stored
        }
    }

    /// Remove the last byte of the line being typed
    ///
    /// Returns `false` if there is nothing on the current line to remove.
    pub fn erase(&mut self) -> bool {
        match self.ring.back() {
            Some(b'\n') | None => false,
            Some(_) => self.ring.pop_back().is_some(),
        }
    }

    /// Consume up to `max` bytes of the oldest complete line
    ///
    /// Stops after copying a `\n`. When `max` runs out first, the rest of the
    /// line stays available to the next call.
    pub fn take_line(&mut self, max: usize) -> Result<Vec<u8>, Underrun> {
        let mut out = Vec::with_capacity(max.min(self.ring.len()));
        while out.len() < max {
            let Some(byte) = self.ring.pop() else {
                return Err(Underrun { copied: out.len() });
            };
            out.push(byte);
            if byte == b'\n' {
                self.lines -= 1;
                break;
            }
        }
        Ok(out)
    }

    /// Drop all buffered input
    pub fn reset(&mut self) {
        self.ring.clear();
        self.lines = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(input: &mut InputAssembler, bytes: &[u8]) {
        for b in bytes {
            if crate::echo::is_erase(*b) {
                input.erase();
            } else {
                input.push(*b);
            }
        }
    }

    #[test]
    fn test_input_line_counting() {
        let mut input = InputAssembler::new(16);
        assert_eq!(input.push(b'a'), InputOutcome::Stored);
        assert!(!input.has_line());
        assert_eq!(input.push(b'\n'), InputOutcome::LineCompleted);
        assert_eq!(input.lines(), 1);
        assert_eq!(input.take_line(10).unwrap(), b"a\n");
        assert_eq!(input.lines(), 0);
        assert!(input.is_empty());
    }

    #[test]
    fn test_input_erase_stops_at_line_boundary() {
        let mut input = InputAssembler::new(16);
        feed(&mut input, b"ab\n");
        assert!(!input.erase());
        feed(&mut input, b"c");
        assert!(input.erase());
        assert!(!input.erase());
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn test_input_erase_on_empty() {
        let mut input = InputAssembler::new(4);
        assert!(!input.erase());
        assert_eq!(input.len(), 0);
    }

    #[test]
    fn test_input_partial_read_keeps_line() {
        let mut input = InputAssembler::new(16);
        feed(&mut input, b"hello\n");
        assert_eq!(input.take_line(2).unwrap(), b"he");
        assert!(input.has_line());
        assert_eq!(input.take_line(10).unwrap(), b"llo\n");
        assert!(!input.has_line());
    }

    #[test]
    fn test_input_reads_one_line_at_a_time() {
        let mut input = InputAssembler::new(16);
        feed(&mut input, b"x\ny\nz");
        assert_eq!(input.lines(), 2);
        assert_eq!(input.take_line(16).unwrap(), b"x\n");
        assert_eq!(input.take_line(16).unwrap(), b"y\n");
        assert!(!input.has_line());
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_input_full() {
        let mut input = InputAssembler::new(2);
        input.push(b'a');
        input.push(b'b');
        assert_eq!(input.push(b'\n'), InputOutcome::Full);
        assert_eq!(input.lines(), 0);
    }

    #[test]
    fn test_input_underrun() {
        let mut input = InputAssembler::new(8);
        feed(&mut input, b"ab");
        assert_eq!(input.take_line(8), Err(Underrun { copied: 2 }));
    }

    proptest! {
        #[test]
        fn prop_input_never_exceeds_capacity(
            cap in 1usize..32,
            keys in prop::collection::vec(prop_oneof![
                Just(b'\n'), Just(0x08u8), b'a'..=b'z'
            ], 0..256),
        ) {
            let mut input = InputAssembler::new(cap);
            for key in keys {
                if key == 0x08 {
                    input.erase();
                } else {
                    input.push(key);
                }
                prop_assert!(input.len() <= input.capacity());
                prop_assert!(input.lines() <= input.len());
            }
            while input.has_line() {
                let line = input.take_line(cap).unwrap();
                prop_assert_eq!(line.last(), Some(&b'\n'));
            }
        }
    }
}
