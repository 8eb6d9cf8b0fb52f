//! ROM image loading and synthesis.

use crate::error::{Error, Result};
use std::path::Path;

/// Addressable capacity of the target EEPROM in bytes.
pub const DEVICE_CAPACITY: usize = 32 * 1024;

/// Largest image the protocol can transfer.
///
/// The checksum-check command encodes the image length in exactly four hex
/// digits, so anything larger cannot be verified on the wire.
pub const MAX_IMAGE_SIZE: usize = 0xFFFF;

/// The binary payload to be written into the device's memory.
///
/// Immutable once constructed; truncation produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    data: Vec<u8>,
}

impl Image {
    /// Read an image from a ROM file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self { data })
    }

    /// Wrap raw bytes as an image.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Synthesize an image by repeating `pattern` until `length` bytes,
    /// truncating the final repetition.
    ///
    /// `fill(&[0x01, 0x02], 5)` yields `01 02 01 02 01`.
    pub fn fill(pattern: &[u8], length: usize) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::Config("fill pattern must not be empty".to_string()));
        }
        if length == 0 {
            return Err(Error::Config("fill length must be positive".to_string()));
        }

        let mut data = Vec::with_capacity(length);
        while data.len() < length {
            let take = (length - data.len()).min(pattern.len());
            data.extend_from_slice(&pattern[..take]);
        }
        Ok(Self { data })
    }

    /// Truncate to at most `limit` bytes.
    #[must_use]
    pub fn truncated(mut self, limit: usize) -> Self {
        self.data.truncate(limit);
        self
    }

    /// The raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
