//! The upload state machine.
//!
//! One transfer walks a fixed sequence of line exchanges with the device:
//!
//! 1. wait for the unsolicited boot banner (nothing is sent first)
//! 2. `V` — firmware version query, response logged but not validated
//! 3. `Z <hex-address>` — announce the target start address
//! 4. one line per payload chunk; the device acknowledges each by echoing
//!    the decimal number of characters it received, and any other reply
//!    halts the transfer immediately
//! 5. one final status line once the device has flushed its write buffer
//! 6. optionally `C <hex-address> <hex-length-4>` — ask the device to
//!    re-read the written range and report its checksums
//!
//! The exchange is strictly lockstep; there is no pipelining and no
//! automatic retry of a rejected chunk.

use crate::checksum::{self, Digests};
use crate::error::{Error, Result};
use crate::image::Image;
use crate::link::LinkSession;
use crate::payload::{self, DEFAULT_CHUNK_SIZE};
use crate::port::Port;
use log::{debug, info, trace};

/// Version query command.
const CMD_VERSION: &str = "V";

/// Build the start-upload command line.
fn start_command(address: u32) -> String {
    format!("Z {:x}", address)
}

/// Build the checksum-check command line. The length is always rendered as
/// four hex digits; [`crate::image::MAX_IMAGE_SIZE`] guarantees it fits.
fn check_command(address: u32, length: usize) -> String {
    format!("C {:x} {:04x}", address, length)
}

/// Post-upload verification behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verify {
    /// Skip the checksum exchange entirely.
    #[default]
    Skip,
    /// Run the exchange and surface the device's report for the caller to
    /// inspect, without comparing it.
    Report,
    /// Run the exchange and fail unless the device's report contains both
    /// locally computed digests.
    Strict,
}

/// Per-transfer configuration.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Target start address in device memory.
    pub address: u32,
    /// Encoded characters per protocol line.
    pub chunk_size: usize,
    /// Post-upload verification mode.
    pub verify: Verify,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            address: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify: Verify::Skip,
        }
    }
}

/// Outcome of the optional checksum exchange.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Locally computed digests of the image.
    pub expected: Digests,
    /// The device's response lines, surfaced for inspection.
    pub device_report: Vec<String>,
}

/// Summary of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// The device's boot/ready banner.
    pub banner: String,
    /// The device's firmware version line.
    pub version: String,
    /// Number of chunks sent and acknowledged.
    pub chunks_sent: usize,
    /// The device's upload-complete status line.
    pub completion: String,
    /// Checksum exchange outcome, if one was requested.
    pub verification: Option<Verification>,
}

/// Drives one image upload over a [`Port`].
///
/// The uploader owns the link session for the lifetime of the transfer; the
/// port is closed on every exit path, success or failure.
pub struct Uploader<P: Port> {
    link: LinkSession<P>,
    options: TransferOptions,
}

impl<P: Port> Uploader<P> {
    /// Create an uploader over an open port.
    pub fn new(port: P, options: TransferOptions) -> Self {
        Self {
            link: LinkSession::new(port),
            options,
        }
    }

    /// Create an uploader over an existing link session.
    pub fn with_link(link: LinkSession<P>, options: TransferOptions) -> Self {
        Self { link, options }
    }

    /// Run the full transfer.
    ///
    /// `progress` is invoked once per acknowledged chunk with
    /// `(acknowledged, total)`.
    pub fn upload<F>(mut self, image: &Image, mut progress: F) -> Result<TransferReport>
    where
        F: FnMut(usize, usize),
    {
        let result = self.run(image, &mut progress);
        // The port is released whichever way the transfer ended.
        let _ = self.link.close();
        result
    }

    fn run<F>(&mut self, image: &Image, progress: &mut F) -> Result<TransferReport>
    where
        F: FnMut(usize, usize),
    {
        // Encoding and chunking failures surface before any line is sent.
        let payload = payload::encode(image)?;
        let chunks = payload::chunk(&payload.text, self.options.chunk_size)?;
        info!(
            "encoded {} image bytes to {} payload chars ({} chunks of {})",
            image.len(),
            payload.text.len(),
            chunks.len(),
            self.options.chunk_size
        );

        let banner = self.link.await_line()?;
        debug!("device ready: {banner}");

        self.link.send_line(CMD_VERSION)?;
        let version = self.link.await_line()?;
        info!("device firmware: {version}");

        self.link.send_line(&start_command(self.options.address))?;
        let start_ack = self.link.await_line()?;
        debug!("upload start: {start_ack}");

        let total = chunks.len();
        for (index, chunk) in chunks.iter().enumerate() {
            self.link.send_line(chunk)?;
            let reply = self.link.await_line()?;

            if reply != chunk.len().to_string() {
                return Err(Error::ProtocolMismatch {
                    index,
                    expected: chunk.len(),
                    actual: reply,
                });
            }
            trace!("chunk {}/{total} acknowledged", index + 1);
            progress(index + 1, total);
        }

        // The device flushes its write buffer before reporting completion,
        // which can take several read-timeout periods.
        let completion = self.link.await_line()?;
        info!("device: {completion}");

        let verification = match self.options.verify {
            Verify::Skip => None,
            mode => Some(self.verify_remote(image, &payload.compressed, mode)?),
        };

        Ok(TransferReport {
            banner,
            version,
            chunks_sent: total,
            completion,
            verification,
        })
    }

    /// Run the checksum exchange against the freshly written range.
    fn verify_remote(
        &mut self,
        image: &Image,
        compressed: &[u8],
        mode: Verify,
    ) -> Result<Verification> {
        let expected = checksum::digest(image.as_bytes(), compressed);
        info!(
            "verifying: expect BYTES {} XOR {} ADLER32 {}",
            image.len(),
            expected.xor_hex(),
            expected.adler_hex()
        );

        self.link
            .send_line(&check_command(self.options.address, image.len()))?;

        // The device answers with a status line, then its checksum report.
        let status = self.link.await_line()?;
        let report = self.link.await_line()?;
        let device_report = vec![status, report];

        if mode == Verify::Strict {
            let combined = device_report.join(" ");
            if !combined.contains(&expected.xor_hex())
                || !combined.contains(&expected.adler_hex())
            {
                return Err(Error::VerifyMismatch {
                    xor: expected.xor_hex(),
                    adler: expected.adler_hex(),
                    report: combined,
                });
            }
        }

        Ok(Verification {
            expected,
            device_report,
        })
    }
}
