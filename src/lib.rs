//! tty-monitor: interrupt-driven character terminal driver
//!
//! Application threads call blocking `read`/`write`; the hardware delivers
//! one receive or transmit interrupt per character. Each terminal is a
//! monitor of its own so that both sides meet under a single mutex:
//!
//! - `ring`: fixed-capacity ring buffer
//! - `echo`: keystroke echo, backspace erase and CRLF display
//! - `input`: line assembly for readers
//! - `session`: in-flight write requests
//! - `driver`: the per-terminal registry and public entry points
//! - `device`: the hardware collaborator trait
//! - `sim`: in-memory hardware for tests and the headless runner

mod config;
pub mod device;
mod driver;
pub mod echo;
mod error;
pub mod input;
pub mod ring;
pub mod session;
pub mod sim;
mod stats;
mod terminal;

pub use config::{Config, ConfigError};
pub use device::{Device, DeviceError};
pub use driver::TerminalDriver;
pub use error::{Error, Result};
pub use ring::RingBuffer;
pub use stats::{StatisticsSnapshot, TerminalStats};
