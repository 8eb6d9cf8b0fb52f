//! Payload encoding and chunking.
//!
//! The image travels as zlib-compressed, base64-encoded text: the zlib
//! container's trailing Adler-32 is reused later for verification, and the
//! fixed-width base64 alphabet means the encoded stream can be sliced at any
//! character boundary without breaking a multi-byte unit.

use crate::error::{Error, Result};
use crate::image::{Image, MAX_IMAGE_SIZE};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;

/// Default number of encoded characters per protocol line.
pub const DEFAULT_CHUNK_SIZE: usize = 60;

/// An image rendered into its transportable form.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    /// The zlib-compressed image. Its trailing four bytes are the
    /// big-endian Adler-32 of the uncompressed image.
    pub compressed: Vec<u8>,
    /// The compressed bytes in the standard base64 alphabet; printable
    /// ASCII with no embedded line terminators.
    pub text: String,
}

/// Compress and text-encode an image.
///
/// Pure transform; fails only if the image exceeds [`MAX_IMAGE_SIZE`], which
/// is rejected outright rather than silently truncated.
pub fn encode(image: &Image) -> Result<EncodedPayload> {
    if image.len() > MAX_IMAGE_SIZE {
        return Err(Error::Encoding(format!(
            "image is {} bytes, maximum transferable size is {} bytes",
            image.len(),
            MAX_IMAGE_SIZE
        )));
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(image.as_bytes())
        .map_err(|e| Error::Encoding(format!("zlib compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| Error::Encoding(format!("zlib finish failed: {e}")))?;

    let text = BASE64_STANDARD.encode(&compressed);

    Ok(EncodedPayload { compressed, text })
}

/// Slice encoded text into chunks of exactly `size` characters, the last
/// possibly shorter. Empty input yields an empty list.
pub fn chunk(text: &str, size: usize) -> Result<Vec<&str>> {
    if size == 0 {
        return Err(Error::Config("chunk size must be positive".to_string()));
    }

    // Base64 text is pure ASCII, so byte slices are char slices.
    text.as_bytes()
        .chunks(size)
        .map(|c| {
            std::str::from_utf8(c)
                .map_err(|e| Error::Encoding(format!("payload is not ASCII: {e}")))
        })
        .collect()
}
