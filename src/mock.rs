//! Simulated BBTK link.
//!
//! `MockTransport` plays back scripted replies when the driver writes a
//! command, which lets the whole protocol run without hardware:
//!
//! ```rust
//! use bbtk_rs::mock::MockTransport;
//! use bbtk_rs::{Bbtk, BbtkConfig, Timing};
//!
//! let transport = MockTransport::new().with_reply("CONN", &["BBTK;"]);
//! let config = BbtkConfig::default().with_timing(Timing::none());
//! let mut bbtk = Bbtk::with_transport(transport, &config);
//! bbtk.connect()?;
//! assert_eq!(bbtk.transport().written_commands(), vec!["CONN"]);
//! # Ok::<(), bbtk_rs::BbtkError>(())
//! ```

use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

use crate::transport::Transport;

/// One scripted outcome of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Data(Vec<u8>),
    /// The read times out and yields nothing.
    Timeout,
    /// The read fails with a hard transport error.
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
pub struct MockTransport {
    incoming: VecDeque<Incoming>,
    replies: HashMap<String, VecDeque<Vec<Incoming>>>,
    failing_commands: Vec<String>,
    pending: Vec<u8>,
    written: Vec<u8>,
    breaks: usize,
    resets: usize,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `command` with `lines`, each terminated by LF.
    pub fn with_reply(self, command: &str, lines: &[&str]) -> Self {
        let reply = lines
            .iter()
            .map(|line| Incoming::Data(format!("{line}\n").into_bytes()))
            .collect();
        self.with_script(command, reply)
    }

    /// Answer the next `command` with raw chunks, each delivered by a separate read.
    pub fn with_chunks(self, command: &str, chunks: &[&[u8]]) -> Self {
        let reply = chunks.iter().map(|c| Incoming::Data(c.to_vec())).collect();
        self.with_script(command, reply)
    }

    /// Answer the next `command` with an arbitrary read script.
    pub fn with_script(mut self, command: &str, script: Vec<Incoming>) -> Self {
        self.replies
            .entry(command.to_string())
            .or_default()
            .push_back(script);
        self
    }

    /// Queue a read outcome that is available before any command is sent.
    pub fn with_incoming(mut self, incoming: Incoming) -> Self {
        self.incoming.push_back(incoming);
        self
    }

    /// Make every write of `command` fail with a broken pipe.
    pub fn with_write_failure(mut self, command: &str) -> Self {
        self.failing_commands.push(command.to_string());
        self
    }

    /// Every CRLF-terminated command written so far, in order.
    pub fn written_commands(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written)
            .split_terminator("\r\n")
            .map(str::to_string)
            .collect()
    }

    pub fn written_bytes(&self) -> &[u8] {
        &self.written
    }

    pub fn break_count(&self) -> usize {
        self.breaks
    }

    pub fn reset_count(&self) -> usize {
        self.resets
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "mock transport closed"));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.ensure_open()?;

        let mut pending = self.pending.clone();
        pending.extend_from_slice(bytes);

        let mut commands = Vec::new();
        while let Some(pos) = pending.windows(2).position(|w| w == b"\r\n") {
            let line: Vec<u8> = pending.drain(..pos + 2).collect();
            commands.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }

        if let Some(cmd) = commands
            .iter()
            .find(|cmd| self.failing_commands.contains(cmd))
        {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("mock write failure on '{cmd}'"),
            ));
        }

        self.pending = pending;
        self.written.extend_from_slice(bytes);
        for cmd in commands {
            if let Some(script) = self.replies.get_mut(&cmd).and_then(VecDeque::pop_front) {
                self.incoming.extend(script);
            }
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        match self.incoming.pop_front() {
            None | Some(Incoming::Timeout) => Ok(0),
            Some(Incoming::Fail(kind)) => Err(io::Error::new(kind, "mock read failure")),
            Some(Incoming::Data(mut data)) => {
                let n = buf.len().min(data.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.incoming.push_front(Incoming::Data(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn reset_buffers(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.resets += 1;
        self.incoming.clear();
        self.pending.clear();
        Ok(())
    }

    fn send_break(&mut self, _duration: Duration, _settle: Duration) -> io::Result<()> {
        self.ensure_open()?;
        self.breaks += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_is_queued_after_command() {
        let mut mock = MockTransport::new().with_reply("ECHO", &["ECHO"]);
        let mut buf = [0u8; 16];
        assert_eq!(mock.read_available(&mut buf).unwrap(), 0);

        mock.write_all(b"ECHO\r\n").unwrap();
        let n = mock.read_available(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ECHO\n");
        assert_eq!(mock.written_commands(), vec!["ECHO"]);
    }

    #[test]
    fn test_short_buffer_keeps_remainder() {
        let mut mock = MockTransport::new().with_incoming(Incoming::Data(b"BBTK;\n".to_vec()));
        let mut buf = [0u8; 4];
        assert_eq!(mock.read_available(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"BBTK");
        assert_eq!(mock.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b";\n");
    }

    #[test]
    fn test_write_failure_and_close() {
        let mut mock = MockTransport::new().with_write_failure("RUDS");
        assert!(mock.write_all(b"DSCM\r\n").is_ok());
        assert_eq!(
            mock.write_all(b"RUDS\r\n").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
        assert_eq!(mock.written_commands(), vec!["DSCM"]);
        assert!(mock.is_open());

        mock.close();
        mock.close();
        assert!(mock.is_closed());
        assert!(!mock.is_open());
        assert_eq!(
            mock.write_all(b"ECHO\r\n").unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
    }

    #[test]
    fn test_reset_discards_unread_input() {
        let mut mock = MockTransport::new().with_incoming(Incoming::Data(b"stale\n".to_vec()));
        mock.reset_buffers().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(mock.read_available(&mut buf).unwrap(), 0);
        assert_eq!(mock.reset_count(), 1);
    }
}
