//! Error types for uvflash.

use thiserror::Error;

/// Result type for uvflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for uvflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame is shorter than its fixed layout requires.
    #[error("Truncated frame: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes available.
        actual: usize,
    },

    /// Reply carried a different identifier than the one expected.
    #[error("Unexpected reply id: expected {expected:#06x}, got {actual:#06x}")]
    UnexpectedReply {
        /// Expected reply identifier.
        expected: u16,
        /// Identifier found in the frame.
        actual: u16,
    },

    /// Unknown command or reply identifier.
    #[error("Unknown message id {0:#06x}")]
    UnknownId(u16),

    /// The device dropped the request without replying.
    #[error("No reply from device (stale timestamp or disabled port?)")]
    NoReply,

    /// Address range outside the flash device.
    #[error("Address range {address:#010x}+{len} is outside the {capacity:#x}-byte flash")]
    AddressOutOfRange {
        /// Start address.
        address: u32,
        /// Length in bytes.
        len: usize,
        /// Device capacity in bytes.
        capacity: u32,
    },

    /// Payload length violates the command's size rules.
    #[error("Invalid length: {0}")]
    InvalidLength(String),

    /// The device answered a write with an error status.
    #[error("Device rejected write at {address:#010x}")]
    Rejected {
        /// Address echoed by the device.
        address: u32,
    },

    /// Flash image has the wrong size or could not be used.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Flash driver failure.
    #[error("Flash error: {0}")]
    Flash(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
