//! Error types for zwrite.

use std::io;
use thiserror::Error;

/// Result type for zwrite operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for zwrite operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No usable serial port found or the port could not be opened.
    #[error("No EEPROM writer found: {0}")]
    TransportUnavailable(String),

    /// The device stayed silent past the read-retry ceiling.
    #[error("Link timeout: no response after {attempts} read attempts")]
    LinkTimeout {
        /// Number of empty reads before giving up.
        attempts: usize,
    },

    /// A chunk acknowledgement disagreed with the sent chunk's length.
    /// Terminal for the run; the remaining chunks are not sent.
    #[error("Chunk {index} rejected: sent {expected} chars, device reported {actual:?}")]
    ProtocolMismatch {
        /// Zero-based index of the rejected chunk.
        index: usize,
        /// Decimal length the device was expected to echo.
        expected: usize,
        /// The response line actually received.
        actual: String,
    },

    /// Image cannot be encoded for transfer.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Strict verification: the device report did not contain the expected digests.
    #[error("Checksum mismatch: expected XOR {xor} ADLER32 {adler}, device reported {report:?}")]
    VerifyMismatch {
        /// Locally computed XOR digest, two uppercase hex digits.
        xor: String,
        /// Locally computed Adler-32 digest, eight uppercase hex digits.
        adler: String,
        /// The device's checksum report line.
        report: String,
    },
}
