//! Per-terminal monitor
//!
//! Every operation on a terminal, whether it comes from an application
//! thread or from an interrupt, runs with that terminal's mutex held.
//! Application threads block on condition variables; interrupt handlers
//! never block.
//!
//! The display register has a single owner at a time. After each
//! transmit-complete interrupt the next byte is picked in this order:
//! owed echo fragments, queued echo bytes, bytes of the active write,
//! and otherwise the device goes idle.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::device::Device;
use crate::echo::{self, EchoEngine, EchoOutcome};
use crate::error::{consistency_fault, Error, Result};
use crate::input::{InputAssembler, InputOutcome};
use crate::session::{WireByte, WriteSession};
use crate::stats::TerminalStats;

/// Who owns the byte currently being displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transmission {
    Echo,
    Write { completes_source: bool },
}

/// Everything guarded by the terminal's mutex
#[derive(Debug)]
struct TerminalState {
    open: bool,
    echo: EchoEngine,
    input: InputAssembler,
    session: Option<WriteSession>,
    in_flight: Option<Transmission>,
    /// Ticket handed to the next writer to arrive
    next_ticket: u64,
    /// Ticket of the writer allowed to transmit
    now_serving: u64,
    reader_active: bool,
    stats: TerminalStats,
}

impl TerminalState {
    fn reset(&mut self) {
        self.echo.reset();
        self.input.reset();
        self.session = None;
        self.in_flight = None;
        self.next_ticket = 0;
        self.now_serving = 0;
        self.reader_active = false;
        self.stats = TerminalStats::default();
    }

    fn transmit<D: Device + ?Sized>(&mut self, device: &D, term: usize, byte: u8, owner: Transmission) {
        if let Transmission::Write { .. } = owner {
            self.echo.note_written(byte);
        }
        self.in_flight = Some(owner);
        tracing::trace!(term, byte, ?owner, "write register");
        device.write_register(term, byte);
    }

    fn transmit_write<D: Device + ?Sized>(&mut self, device: &D, term: usize, wire: WireByte) {
        self.transmit(
            device,
            term,
            wire.byte,
            Transmission::Write {
                completes_source: wire.completes_source,
            },
        );
    }
}

/// One terminal: its state and the conditions its callers wait on
#[derive(Debug)]
pub(crate) struct Terminal {
    index: usize,
    state: Mutex<TerminalState>,
    /// A writer's ticket came up
    writer_turn: Condvar,
    /// Nothing is being displayed
    idle: Condvar,
    /// The active write session was fully accepted
    write_done: Condvar,
    /// The reader slot was released
    reader_turn: Condvar,
    /// A line was completed
    line_ready: Condvar,
}

impl Terminal {
    /// Create an uninitialized terminal slot
    pub(crate) fn new(index: usize, echo_capacity: usize, input_capacity: usize) -> Self {
        Self {
            index,
            state: Mutex::new(TerminalState {
                open: false,
                echo: EchoEngine::new(echo_capacity),
                input: InputAssembler::new(input_capacity),
                session: None,
                in_flight: None,
                next_ticket: 0,
                now_serving: 0,
                reader_active: false,
                stats: TerminalStats::default(),
            }),
            writer_turn: Condvar::new(),
            idle: Condvar::new(),
            write_done: Condvar::new(),
            reader_turn: Condvar::new(),
            line_ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TerminalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_while<'a>(
        &self,
        cond: &Condvar,
        guard: MutexGuard<'a, TerminalState>,
        blocked: impl FnMut(&mut TerminalState) -> bool,
    ) -> MutexGuard<'a, TerminalState> {
        cond.wait_while(guard, blocked)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, TerminalState>> {
        let state = self.lock();
        if !state.open {
            return Err(Error::InvalidTerminal(self.index));
        }
        Ok(state)
    }

    /// Bring the device up and start from empty buffers and zeroed counters
    pub(crate) fn init<D: Device + ?Sized>(&self, device: &D) -> Result<()> {
        let mut state = self.lock();
        if state.open {
            return Err(Error::InvalidTerminal(self.index));
        }
        device.init(self.index).map_err(|source| Error::DeviceInit {
            term: self.index,
            source,
        })?;
        state.reset();
        state.open = true;
        tracing::debug!(term = self.index, "terminal initialized");
        Ok(())
    }

    /// Counters, or `None` while uninitialized
    pub(crate) fn stats(&self) -> Option<TerminalStats> {
        let state = self.lock();
        state.open.then_some(state.stats)
    }

    /// Complete lines buffered for readers
    pub(crate) fn lines_available(&self) -> Result<usize> {
        Ok(self.lock_open()?.input.lines())
    }

    /// Display `data` and return once the device has accepted all of it
    pub(crate) fn write<D: Device + ?Sized>(&self, device: &D, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("write length must be at least 1".to_string()));
        }
        let mut state = self.lock_open()?;

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state = self.wait_while(&self.writer_turn, state, |s| s.now_serving != ticket);

        // Let echo already on its way to the screen finish first
        state = self.wait_while(&self.idle, state, |s| s.in_flight.is_some());

        let mut session = WriteSession::new(data);
        let first = session.next_wire_byte();
        state.session = Some(session);
        tracing::debug!(term = self.index, len = data.len(), ticket, "write session started");
        match first {
            Some(wire) => state.transmit_write(device, self.index, wire),
            None => consistency_fault(self.index, "write session started without data"),
        }

        state = self.wait_while(&self.write_done, state, |s| {
            s.session.as_ref().is_some_and(|session| !session.is_complete())
        });

        state.session = None;
        state.now_serving += 1;
        tracing::debug!(term = self.index, ticket, "write session finished");
        drop(state);
        self.writer_turn.notify_all();
        self.idle.notify_all();
        Ok(data.len())
    }

    /// Hand out up to `max` bytes of the oldest complete line
    pub(crate) fn read(&self, max: usize) -> Result<Vec<u8>> {
        if max == 0 {
            return Err(Error::InvalidArgument("read length must be at least 1".to_string()));
        }
        let mut state = self.lock_open()?;
        if max > state.input.capacity() {
            return Err(Error::InvalidArgument(format!(
                "read length {} exceeds input capacity {}",
                max,
                state.input.capacity()
            )));
        }

        state = self.wait_while(&self.reader_turn, state, |s| s.reader_active);
        state.reader_active = true;

        state = self.wait_while(&self.line_ready, state, |s| !s.input.has_line());

        let line = match state.input.take_line(max) {
            Ok(line) => line,
            Err(underrun) => consistency_fault(
                self.index,
                &format!(
                    "input ran dry after {} bytes with a complete line counted",
                    underrun.copied
                ),
            ),
        };
        state.stats.user_out += line.len() as u64;
        state.reader_active = false;
        tracing::trace!(term = self.index, len = line.len(), "read");
        drop(state);
        self.reader_turn.notify_one();
        Ok(line)
    }

    /// Block until nothing is being displayed
    pub(crate) fn drain(&self) -> Result<()> {
        let state = self.lock_open()?;
        let _state = self.wait_while(&self.idle, state, |s| {
            s.in_flight.is_some() || s.session.is_some()
        });
        Ok(())
    }

    /// Receive interrupt: a keystroke is waiting in the data register
    pub(crate) fn on_character_received<D: Device + ?Sized>(&self, device: &D) -> Result<()> {
        let mut state = self.lock_open()?;
        let raw = device.read_register(self.index);
        state.stats.tty_in += 1;

        let outcome = state.echo.echo_keystroke(raw);
        tracing::trace!(term = self.index, raw, ?outcome, "keystroke");
        if outcome == EchoOutcome::Dropped {
            tracing::warn!(term = self.index, "echo ring full, keystroke not echoed");
        }

        let key = if raw == b'\r' { b'\n' } else { raw };
        if echo::is_erase(key) {
            state.input.erase();
        } else {
            match state.input.push(key) {
                InputOutcome::Stored => {},
                InputOutcome::LineCompleted => self.line_ready.notify_one(),
                InputOutcome::Full => {
                    tracing::warn!(term = self.index, "input ring full, keystroke dropped");
                    state.echo.ring_bell();
                },
            }
        }

        if state.in_flight.is_none() {
            if let Some(byte) = state.echo.next_byte() {
                state.transmit(device, self.index, byte, Transmission::Echo);
            }
        }
        Ok(())
    }

    /// Transmit interrupt: the device finished displaying the last byte
    pub(crate) fn on_character_transmitted<D: Device + ?Sized>(&self, device: &D) -> Result<()> {
        let mut state = self.lock_open()?;
        let Some(done) = state.in_flight.take() else {
            tracing::warn!(term = self.index, "transmit interrupt with nothing in flight");
            return Ok(());
        };
        state.stats.tty_out += 1;

        if done == (Transmission::Write { completes_source: true }) {
            let state = &mut *state;
            match state.session.as_mut() {
                Some(session) => {
                    session.acknowledge();
                    state.stats.user_in += 1;
                    if session.is_complete() {
                        self.write_done.notify_one();
                    }
                },
                None => consistency_fault(self.index, "write byte acknowledged without a session"),
            }
        }

        if let Some(byte) = state.echo.next_byte() {
            state.transmit(device, self.index, byte, Transmission::Echo);
        } else if let Some(wire) = state.session.as_mut().and_then(WriteSession::next_wire_byte) {
            state.transmit_write(device, self.index, wire);
        } else {
            self.idle.notify_all();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceError;
    use std::sync::Arc;

    /// Records register writes; transmit interrupts are delivered by hand
    #[derive(Default)]
    struct Recorder {
        keys: Mutex<Vec<u8>>,
        screen: Mutex<Vec<u8>>,
    }

    impl Recorder {
        fn press(&self, key: u8) {
            self.keys.lock().unwrap().insert(0, key);
        }

        fn screen(&self) -> Vec<u8> {
            self.screen.lock().unwrap().clone()
        }
    }

    impl Device for Recorder {
        fn init(&self, _term: usize) -> std::result::Result<(), DeviceError> {
            Ok(())
        }

        fn read_register(&self, _term: usize) -> u8 {
            self.keys.lock().unwrap().pop().unwrap_or(0)
        }

        fn write_register(&self, _term: usize, byte: u8) {
            self.screen.lock().unwrap().push(byte);
        }
    }

    fn open_terminal(echo: usize, input: usize) -> (Terminal, Recorder) {
        let term = Terminal::new(0, echo, input);
        let dev = Recorder::default();
        term.init(&dev).unwrap();
        (term, dev)
    }

    fn type_keys(term: &Terminal, dev: &Recorder, keys: &[u8]) {
        for key in keys {
            dev.press(*key);
            term.on_character_received(dev).unwrap();
        }
    }

    /// Deliver transmit interrupts until the device goes idle
    fn settle(term: &Terminal, dev: &Recorder) {
        while term.lock().in_flight.is_some() {
            term.on_character_transmitted(dev).unwrap();
        }
    }

    #[test]
    fn test_operations_fail_before_init() {
        let term = Terminal::new(3, 4, 4);
        let dev = Recorder::default();
        assert!(matches!(term.read(1), Err(Error::InvalidTerminal(3))));
        assert!(matches!(term.write(&dev, b"x"), Err(Error::InvalidTerminal(3))));
        assert!(matches!(
            term.on_character_received(&dev),
            Err(Error::InvalidTerminal(3))
        ));
        assert!(term.stats().is_none());
    }

    #[test]
    fn test_init_twice_rejected() {
        let (term, dev) = open_terminal(8, 8);
        assert!(matches!(term.init(&dev), Err(Error::InvalidTerminal(0))));
    }

    #[test]
    fn test_echo_kick_start_and_continuation() {
        let (term, dev) = open_terminal(8, 8);
        type_keys(&term, &dev, b"hi");
        // Only the first byte goes out before a transmit interrupt
        assert_eq!(dev.screen(), b"h");
        settle(&term, &dev);
        assert_eq!(dev.screen(), b"hi");
        let stats = term.stats().unwrap();
        assert_eq!(stats.tty_in, 2);
        assert_eq!(stats.tty_out, 2);
    }

    #[test]
    fn test_typed_line_with_erase() {
        let (term, dev) = open_terminal(16, 16);
        type_keys(&term, &dev, b"ab\x08c\r");
        settle(&term, &dev);
        assert_eq!(dev.screen(), b"ab\x08 \x08c\r\n");
        assert_eq!(term.read(10).unwrap(), b"ac\n");
        assert_eq!(term.stats().unwrap().user_out, 3);
    }

    #[test]
    fn test_erase_at_column_zero_is_noop() {
        let (term, dev) = open_terminal(8, 8);
        type_keys(&term, &dev, b"\x7f");
        assert!(dev.screen().is_empty());
        let state = term.lock();
        assert!(state.input.is_empty());
        assert!(state.in_flight.is_none());
    }

    #[test]
    fn test_erase_after_newline_keeps_line() {
        let (term, dev) = open_terminal(16, 16);
        type_keys(&term, &dev, b"a\r\x08");
        settle(&term, &dev);
        assert_eq!(dev.screen(), b"a\r\n");
        assert_eq!(term.read(4).unwrap(), b"a\n");
    }

    #[test]
    fn test_input_overflow_rings_bell() {
        let (term, dev) = open_terminal(16, 2);
        type_keys(&term, &dev, b"abc");
        settle(&term, &dev);
        assert_eq!(dev.screen(), b"abc\x07");
        assert_eq!(term.lock().input.len(), 2);
    }

    #[test]
    fn test_partial_read_leaves_rest_of_line() {
        let (term, dev) = open_terminal(16, 16);
        type_keys(&term, &dev, b"hello\r");
        assert_eq!(term.read(3).unwrap(), b"hel");
        assert_eq!(term.lines_available().unwrap(), 1);
        assert_eq!(term.read(3).unwrap(), b"lo\n");
        assert_eq!(term.lines_available().unwrap(), 0);
    }

    #[test]
    fn test_read_rejects_oversized_length() {
        let (term, _dev) = open_terminal(8, 8);
        assert!(matches!(term.read(9), Err(Error::InvalidArgument(_))));
        assert!(matches!(term.read(0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_write_rejected() {
        let (term, dev) = open_terminal(8, 8);
        assert!(matches!(term.write(&dev, b""), Err(Error::InvalidArgument(_))));
        assert!(dev.screen().is_empty());
    }

    #[test]
    fn test_spurious_transmit_ignored() {
        let (term, dev) = open_terminal(8, 8);
        term.on_character_transmitted(&dev).unwrap();
        assert_eq!(term.stats().unwrap().tty_out, 0);
    }

    #[test]
    fn test_write_with_manual_interrupts() {
        let term = Arc::new(Terminal::new(0, 8, 8));
        let dev = Arc::new(Recorder::default());
        term.init(&*dev).unwrap();

        let writer = {
            let term = Arc::clone(&term);
            let dev = Arc::clone(&dev);
            std::thread::spawn(move || term.write(&*dev, b"\nok"))
        };

        // Wait for the first register write, then clock the rest out
        while dev.screen().is_empty() {
            std::thread::yield_now();
        }
        while !writer.is_finished() {
            if term.lock().in_flight.is_some() {
                term.on_character_transmitted(&*dev).unwrap();
            }
            std::thread::yield_now();
        }

        assert_eq!(writer.join().unwrap().unwrap(), 3);
        assert_eq!(dev.screen(), b"\r\nok");
        let stats = term.stats().unwrap();
        assert_eq!(stats.user_in, 3);
        assert_eq!(stats.tty_out, 4);
    }

    #[test]
    fn test_echo_preempts_write_between_bytes() {
        let term = Arc::new(Terminal::new(0, 8, 8));
        let dev = Arc::new(Recorder::default());
        term.init(&*dev).unwrap();

        let writer = {
            let term = Arc::clone(&term);
            let dev = Arc::clone(&dev);
            std::thread::spawn(move || term.write(&*dev, b"xyz"))
        };
        while dev.screen().is_empty() {
            std::thread::yield_now();
        }

        // 'x' is on its way; a keystroke now must not wait for "yz"
        type_keys(&term, &dev, b"k");
        assert_eq!(dev.screen(), b"x");

        while !writer.is_finished() {
            if term.lock().in_flight.is_some() {
                term.on_character_transmitted(&*dev).unwrap();
            }
            std::thread::yield_now();
        }
        writer.join().unwrap().unwrap();
        assert_eq!(dev.screen(), b"xkyz");
    }

    #[test]
    fn test_writers_served_in_arrival_order() {
        let term = Arc::new(Terminal::new(0, 16, 64));
        let dev = Arc::new(Recorder::default());
        term.init(&*dev).unwrap();

        let mut writers = Vec::new();
        for (ticket, label) in [b'A', b'B', b'C', b'D'].into_iter().enumerate() {
            let handle = {
                let term = Arc::clone(&term);
                let dev = Arc::clone(&dev);
                std::thread::spawn(move || term.write(&*dev, &[label; 4]))
            };
            // The next writer arrives only once this one holds its ticket
            while term.lock().next_ticket <= ticket as u64 {
                std::thread::yield_now();
            }
            writers.push(handle);
        }

        // Clock the device by hand, typing a key every third interrupt
        let mut interrupts = 0;
        let mut typed = 0;
        while !writers.iter().all(|w| w.is_finished()) {
            if term.lock().in_flight.is_some() {
                term.on_character_transmitted(&*dev).unwrap();
                interrupts += 1;
                if interrupts % 3 == 0 {
                    type_keys(&term, &dev, b"k");
                    typed += 1;
                }
            }
            std::thread::yield_now();
        }
        for writer in writers {
            assert_eq!(writer.join().unwrap().unwrap(), 4);
        }
        settle(&term, &dev);

        let screen = dev.screen();
        let written: Vec<u8> = screen.iter().copied().filter(|&b| b != b'k').collect();
        assert_eq!(written, b"AAAABBBBCCCCDDDD");
        assert!(typed > 0);
        assert_eq!(screen.iter().filter(|&&b| b == b'k').count(), typed);
        assert_eq!(term.stats().unwrap().user_in, 16);
    }
}
