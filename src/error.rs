//! Error types for driver operations

use thiserror::Error;

use crate::device::DeviceError;

/// Driver error type
#[derive(Error, Debug)]
pub enum Error {
    /// Terminal index out of range, not initialized, or initialized twice
    #[error("Invalid terminal: {0}")]
    InvalidTerminal(usize),

    /// Caller-supplied length or buffer rejected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The hardware refused to bring the terminal up
    #[error("Failed to initialize device for terminal {term}: {source}")]
    DeviceInit {
        term: usize,
        #[source]
        source: DeviceError,
    },
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Abort on a broken ring-buffer invariant.
///
/// These indicate a defect in the driver, not a condition callers can handle.
#[cold]
#[track_caller]
pub(crate) fn consistency_fault(term: usize, what: &str) -> ! {
    tracing::error!(term, "internal consistency fault: {}", what);
    panic!("terminal {term}: internal consistency fault: {what}");
}
