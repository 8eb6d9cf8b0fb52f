//! Image digests for the post-upload verification handshake.

use byteorder::{BigEndian, ByteOrder};

/// The two digests the device reports after a checksum-check command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digests {
    /// XOR fold of every raw image byte.
    pub xor: u8,
    /// Adler-32 of the image, as embedded in the zlib trailer.
    pub adler: u32,
}

impl Digests {
    /// XOR digest as two uppercase hex digits, the device's report format.
    pub fn xor_hex(&self) -> String {
        format!("{:02X}", self.xor)
    }

    /// Adler-32 digest as eight uppercase hex digits.
    pub fn adler_hex(&self) -> String {
        format!("{:08X}", self.adler)
    }
}

/// Compute the verification digests for an image.
///
/// The XOR digest folds every byte of the uncompressed image. The Adler-32
/// is not recomputed: the zlib stream produced by the encoder already ends
/// with it, big-endian, so the trailing four bytes of `compressed` are
/// reused directly.
pub fn digest(image: &[u8], compressed: &[u8]) -> Digests {
    let xor = image.iter().fold(0u8, |acc, b| acc ^ b);

    let adler = match compressed.len().checked_sub(4) {
        Some(start) => BigEndian::read_u32(&compressed[start..]),
        None => 0,
    };

    Digests { xor, adler }
}
