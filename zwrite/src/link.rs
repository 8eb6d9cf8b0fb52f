//! Line-framed session over a byte-stream port.
//!
//! The EEPROM writer speaks a strict lockstep protocol: every line written
//! must produce exactly one non-empty response line before the next line may
//! be written. `LinkSession` is the only way the protocol layer touches the
//! port, which keeps that pairing enforced in one place.

use crate::error::{Error, Result};
use crate::port::Port;
use log::trace;
use std::io;

/// Default ceiling on consecutive reads that yield no line.
///
/// With the 1 second read timeout this tolerates roughly a minute of device
/// silence, enough for the longest EEPROM page-write stalls. A permanently
/// silent device surfaces [`Error::LinkTimeout`] instead of hanging the
/// session forever.
pub const DEFAULT_MAX_SILENT_READS: usize = 60;

/// A request/acknowledge line session over a [`Port`].
pub struct LinkSession<P: Port> {
    port: P,
    pending: Vec<u8>,
    max_silent_reads: usize,
}

impl<P: Port> LinkSession<P> {
    /// Wrap a port with the default silence ceiling.
    pub fn new(port: P) -> Self {
        Self::with_retry_limit(port, DEFAULT_MAX_SILENT_READS)
    }

    /// Wrap a port with an explicit silence ceiling.
    pub fn with_retry_limit(port: P, max_silent_reads: usize) -> Self {
        Self {
            port,
            pending: Vec::new(),
            max_silent_reads,
        }
    }

    /// The underlying port's name.
    pub fn port_name(&self) -> &str {
        self.port.name()
    }

    /// Write one line: `text` followed by a single `\n`.
    ///
    /// `text` must not contain a line terminator; anything else would desync
    /// the request/response pairing.
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        if text.contains(['\n', '\r']) {
            return Err(Error::Config(
                "protocol line must not contain a line terminator".to_string(),
            ));
        }

        trace!("> {text}");
        self.port.write_all(text.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }

    /// Block until a non-empty line arrives.
    ///
    /// Read timeouts and bare line terminators are retried: the device goes
    /// quiet for whole seconds while an EEPROM page write completes, and the
    /// transport's read timeout is much shorter than that. Each such empty
    /// read counts toward the silence ceiling; exceeding it fails with
    /// [`Error::LinkTimeout`].
    pub fn await_line(&mut self) -> Result<String> {
        let mut silent = 0usize;

        loop {
            if let Some(line) = self.take_line() {
                if !line.is_empty() {
                    trace!("< {line}");
                    return Ok(line);
                }
                silent += 1;
            } else {
                let mut buf = [0u8; 256];
                match self.port.read(&mut buf) {
                    Ok(n) if n > 0 => {
                        self.pending.extend_from_slice(&buf[..n]);
                        continue;
                    },
                    Ok(_) => silent += 1,
                    Err(e)
                        if e.kind() == io::ErrorKind::TimedOut
                            || e.kind() == io::ErrorKind::WouldBlock =>
                    {
                        silent += 1;
                    },
                    Err(e) => return Err(e.into()),
                }
            }

            if silent >= self.max_silent_reads {
                return Err(Error::LinkTimeout { attempts: silent });
            }
        }
    }

    /// Pop one complete line from the receive buffer, stripped of trailing
    /// whitespace and terminators.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim_end().to_string())
    }

    /// Close the underlying port.
    pub fn close(&mut self) -> Result<()> {
        self.port.close()
    }

    /// Consume the session and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockPort;

    #[test]
    fn test_await_line_returns_first_nonempty_line() {
        let mut port = MockPort::new();
        port.push_incoming("hello device\n");
        let mut link = LinkSession::new(port);

        assert_eq!(link.await_line().unwrap(), "hello device");
    }

    #[test]
    fn test_await_line_strips_crlf() {
        let mut port = MockPort::new();
        port.push_incoming("OK\r\n");
        let mut link = LinkSession::new(port);

        assert_eq!(link.await_line().unwrap(), "OK");
    }

    #[test]
    fn test_await_line_skips_blank_lines() {
        let mut port = MockPort::new();
        port.push_incoming("\n\r\n42\n");
        let mut link = LinkSession::new(port);

        assert_eq!(link.await_line().unwrap(), "42");
    }

    #[test]
    fn test_await_line_retries_timeouts_then_succeeds() {
        let mut port = MockPort::new();
        // Three timed-out reads before the line becomes available.
        port.delay_reads(3);
        port.push_incoming("late\n");
        let mut link = LinkSession::with_retry_limit(port, 10);

        assert_eq!(link.await_line().unwrap(), "late");
    }

    #[test]
    fn test_await_line_gives_up_after_ceiling() {
        let port = MockPort::new();
        let mut link = LinkSession::with_retry_limit(port, 5);

        match link.await_line() {
            Err(Error::LinkTimeout { attempts }) => assert_eq!(attempts, 5),
            other => panic!("expected LinkTimeout, got {other:?}"),
        }
    }

    #[test]
    fn test_send_line_appends_terminator() {
        let port = MockPort::new();
        let mut link = LinkSession::new(port);

        link.send_line("Z 8000").unwrap();
        assert_eq!(link.into_port().written_bytes(), b"Z 8000\n");
    }

    #[test]
    fn test_send_line_rejects_embedded_newline() {
        let port = MockPort::new();
        let mut link = LinkSession::new(port);

        assert!(matches!(
            link.send_line("two\nlines"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_close_marks_port_closed() {
        let port = MockPort::new();
        let mut link = LinkSession::new(port);
        link.close().unwrap();
        assert!(link.into_port().is_closed());
    }
}
