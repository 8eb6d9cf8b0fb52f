//! Scripted in-memory port for protocol tests.

use crate::error::Result;
use crate::port::Port;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Callback deciding how the fake device answers each complete line it
/// receives: `(line_index, line) -> response lines`.
pub(crate) type Responder = Box<dyn FnMut(usize, &str) -> Vec<String> + Send>;

/// An in-memory [`Port`] that replays scripted device behavior.
///
/// Bytes written by the host are collected; whenever a full line arrives the
/// responder (if any) is invoked and its output queued for the host to read.
/// Reading with nothing queued fails with `TimedOut`, like a real serial
/// port. Recorded traffic is behind `Arc` so it stays inspectable after the
/// uploader has consumed the port.
pub(crate) struct MockPort {
    incoming: VecDeque<u8>,
    written: Arc<Mutex<Vec<u8>>>,
    lines: Arc<Mutex<Vec<String>>>,
    line_buf: Vec<u8>,
    responder: Option<Responder>,
    delayed_reads: usize,
    timeout: Duration,
    closed: bool,
}

impl MockPort {
    pub fn new() -> Self {
        Self {
            incoming: VecDeque::new(),
            written: Arc::new(Mutex::new(Vec::new())),
            lines: Arc::new(Mutex::new(Vec::new())),
            line_buf: Vec::new(),
            responder: None,
            delayed_reads: 0,
            timeout: Duration::from_millis(10),
            closed: false,
        }
    }

    /// Queue bytes for the host to read (e.g. the boot banner).
    pub fn push_incoming(&mut self, text: &str) {
        self.incoming.extend(text.bytes());
    }

    /// Make the next `n` reads time out even if data is queued.
    pub fn delay_reads(&mut self, n: usize) {
        self.delayed_reads = n;
    }

    /// Install the device-side line responder.
    pub fn respond_with<F>(&mut self, responder: F)
    where
        F: FnMut(usize, &str) -> Vec<String> + Send + 'static,
    {
        self.responder = Some(Box::new(responder));
    }

    /// All raw bytes the host wrote so far.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    /// Shared handle to the complete lines the host wrote.
    pub fn lines_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.lines)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.delayed_reads > 0 {
            self.delayed_reads -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "scripted delay"));
        }
        if self.incoming.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }

        let mut n = 0;
        while n < buf.len() {
            match self.incoming.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                },
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);

        for &b in buf {
            if b == b'\n' {
                let line = String::from_utf8_lossy(&self.line_buf)
                    .trim_end()
                    .to_string();
                self.line_buf.clear();

                let index = {
                    let mut lines = self.lines.lock().unwrap();
                    lines.push(line.clone());
                    lines.len() - 1
                };

                if let Some(responder) = self.responder.as_mut() {
                    for reply in responder(index, &line) {
                        self.incoming.extend(reply.bytes());
                        self.incoming.push_back(b'\n');
                    }
                }
            } else {
                self.line_buf.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.incoming.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
