use std::thread;
use std::time::{Duration, Instant};

use crate::error::{BbtkError, Result};
use crate::transport::Transport;

/// Appended to every outgoing command.
pub const COMMAND_TERMINATOR: &str = "\r\n";
/// Ends every reply line.
pub const LINE_TERMINATOR: u8 = b'\n';

const READ_CHUNK: usize = 64;

/// CRLF-framed commands out, LF-terminated lines in.
///
/// Bytes read past the end of a line stay buffered for the next
/// [`read_line`](Self::read_line) or for [`take_pending`](Self::take_pending).
#[derive(Debug)]
pub struct LineTerminal<T: Transport> {
    transport: T,
    pending: Vec<u8>,
    read_timeout: Duration,
    settle: Duration,
    traffic: log::Level,
}

impl<T: Transport> LineTerminal<T> {
    pub fn new(transport: T, read_timeout: Duration, settle: Duration, traffic: log::Level) -> Self {
        Self {
            transport,
            pending: Vec::new(),
            read_timeout,
            settle,
            traffic,
        }
    }

    /// Frame and write `command`, then wait out the settle delay.
    ///
    /// The delay applies even when the write fails, so whatever the caller
    /// sends next cannot collide with a command the device is still parsing.
    pub fn send_command(&mut self, command: &str) -> Result<()> {
        log::log!(self.traffic, "SendCommand: \"{}\"", command);
        let framed = format!("{command}{COMMAND_TERMINATOR}");
        let written = self.transport.write_all(framed.as_bytes());
        thread::sleep(self.settle);
        written.map_err(BbtkError::from)
    }

    /// Read up to the next LF and return the line without its terminator.
    ///
    /// A CR right before the LF is dropped too. Fails with
    /// [`BbtkError::Timeout`] when no full line shows up within the read
    /// timeout, even if bytes keep arriving; the partial bytes stay buffered.
    pub fn read_line(&mut self) -> Result<String> {
        let start = Instant::now();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.take_line() {
                log::log!(self.traffic, "ReadLine: got \"{}\"", line);
                return Ok(line);
            }

            if start.elapsed() >= self.read_timeout {
                return Err(BbtkError::Timeout {
                    timeout: self.read_timeout,
                    partial: String::from_utf8_lossy(&self.pending).into_owned(),
                });
            }

            let n = self.transport.read_available(&mut chunk)?;
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == LINE_TERMINATOR)?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Hand over bytes that were read but not yet consumed as lines.
    pub fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    /// Discard buffered input on both sides of the link.
    pub fn reset(&mut self) -> Result<()> {
        self.pending.clear();
        self.transport.reset_buffers()?;
        Ok(())
    }

    pub fn traffic_level(&self) -> log::Level {
        self.traffic
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
