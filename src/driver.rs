//! Terminal registry
//!
//! A `TerminalDriver` owns one independently locked monitor per terminal
//! slot plus the device they share. Calls on different terminals never
//! contend with each other.

use crate::config::{Config, ConfigError};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::stats::StatisticsSnapshot;
use crate::terminal::Terminal;

/// The driver for every terminal attached to one device
#[derive(Debug)]
pub struct TerminalDriver<D> {
    config: Config,
    device: D,
    terminals: Box<[Terminal]>,
}

impl<D: Device> TerminalDriver<D> {
    /// Set up every terminal slot as uninitialized
    pub fn new(config: Config, device: D) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let terminals = (0..config.max_terminals)
            .map(|i| Terminal::new(i, config.echo_capacity, config.input_capacity))
            .collect();
        tracing::debug!(
            terminals = config.max_terminals,
            echo = config.echo_capacity,
            input = config.input_capacity,
            "driver created"
        );
        Ok(Self {
            config,
            device,
            terminals,
        })
    }

    /// The configuration this driver was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The hardware collaborator
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Number of terminal slots
    pub fn max_terminals(&self) -> usize {
        self.terminals.len()
    }

    fn terminal(&self, term: usize) -> Result<&Terminal> {
        self.terminals.get(term).ok_or(Error::InvalidTerminal(term))
    }

    /// Bring up terminal `term`
    ///
    /// Fails if the index is out of range, the terminal is already up, or the
    /// device refuses.
    pub fn init_terminal(&self, term: usize) -> Result<()> {
        self.terminal(term)?.init(&self.device)
    }

    /// Write `buf` to the screen of `term`
    ///
    /// Blocks until every byte has been displayed and returns `buf.len()`.
    /// Concurrent writers on the same terminal are served in arrival order.
    pub fn write(&self, term: usize, buf: &[u8]) -> Result<usize> {
        self.terminal(term)?.write(&self.device, buf)
    }

    /// Read up to `len` bytes of the next complete line typed on `term`
    ///
    /// Blocks until a line is available. The returned bytes end with `\n`
    /// unless `len` ran out first.
    pub fn read(&self, term: usize, len: usize) -> Result<Vec<u8>> {
        self.terminal(term)?.read(len)
    }

    /// Block until `term` has nothing left to display
    pub fn drain(&self, term: usize) -> Result<()> {
        self.terminal(term)?.drain()
    }

    /// Complete lines waiting for a reader on `term`
    pub fn lines_available(&self, term: usize) -> Result<usize> {
        self.terminal(term)?.lines_available()
    }

    /// Copy the counters of every terminal
    pub fn statistics(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            terminals: self.terminals.iter().map(Terminal::stats).collect(),
        }
    }

    /// Receive interrupt entry point
    pub fn on_character_received(&self, term: usize) -> Result<()> {
        self.terminal(term)?.on_character_received(&self.device)
    }

    /// Transmit interrupt entry point
    pub fn on_character_transmitted(&self, term: usize) -> Result<()> {
        self.terminal(term)?.on_character_transmitted(&self.device)
    }
}
