//! Host-side library for the serial EEPROM writer.
//!
//! Uploads a ROM image to the writer over a serial port. The image is
//! zlib-compressed, base64-encoded and streamed as fixed-width text lines;
//! the device acknowledges every line by echoing the number of characters it
//! received, and can optionally re-read the written range and report
//! checksums afterwards.
//!
//! The typical flow:
//!
//! ```no_run
//! use zwrite::{Image, NativePort, SerialConfig, TransferOptions, Uploader};
//!
//! # fn main() -> zwrite::Result<()> {
//! let image = Image::from_file("rom.bin")?;
//! let port = NativePort::open(&SerialConfig::new("/dev/ttyUSB0", 115_200))?;
//! let report = Uploader::new(port, TransferOptions::default())
//!     .upload(&image, |done, total| eprintln!("{done}/{total}"))?;
//! println!("device said: {}", report.completion);
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod device;
pub mod error;
pub mod image;
pub mod link;
pub mod payload;
pub mod port;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testutil;

pub use checksum::{Digests, digest};
pub use device::{DetectedPort, DeviceKind, auto_detect_port, detect_ports};
pub use error::{Error, Result};
pub use image::{DEVICE_CAPACITY, Image, MAX_IMAGE_SIZE};
pub use link::{DEFAULT_MAX_SILENT_READS, LinkSession};
pub use payload::{DEFAULT_CHUNK_SIZE, EncodedPayload, chunk, encode};
pub use port::{NativePort, NativePortEnumerator, Port, PortEnumerator, PortInfo, SerialConfig};
pub use transfer::{TransferOptions, TransferReport, Uploader, Verification, Verify};
