//! Hardware collaborator interface
//!
//! The driver never touches registers directly. A `Device` brings a
//! terminal up, hands over the keystroke that raised a receive interrupt,
//! and accepts one display byte at a time.
//!
//! Contract for implementors:
//! - `read_register` is only called from inside `on_character_received`.
//! - Every `write_register` must eventually be answered by exactly one
//!   `on_character_transmitted` for the same terminal, and no second
//!   `write_register` is issued before that.
//! - `write_register` runs with the terminal's lock held, so it must not
//!   call back into the driver. Deliver the completion from another thread.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Device bring-up errors
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No device is attached at this index
    #[error("No device attached to terminal {0}")]
    NotPresent(usize),

    /// The device reported a fault
    #[error("Device fault: {0}")]
    Fault(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Register-level access to the terminals' hardware
pub trait Device: Send + Sync {
    /// Bring up the hardware for `term`
    fn init(&self, term: usize) -> Result<(), DeviceError>;

    /// Fetch the character that raised the pending receive interrupt
    fn read_register(&self, term: usize) -> u8;

    /// Start displaying one character
    fn write_register(&self, term: usize, byte: u8);
}

impl<D: Device + ?Sized> Device for Arc<D> {
    fn init(&self, term: usize) -> Result<(), DeviceError> {
        (**self).init(term)
    }

    fn read_register(&self, term: usize) -> u8 {
        (**self).read_register(term)
    }

    fn write_register(&self, term: usize, byte: u8) {
        (**self).write_register(term, byte)
    }
}
