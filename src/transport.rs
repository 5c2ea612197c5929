use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use crate::error::{BbtkError, Result};

/// Byte-level duplex link to a BBTK.
///
/// Reads are bounded by a timeout. A read that times out yields zero bytes
/// instead of an error so callers can keep polling.
pub trait Transport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read whatever is available into `buf`, returning `Ok(0)` on timeout.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Drop unread input and unsent output.
    fn reset_buffers(&mut self) -> io::Result<()>;

    /// Hold a break for `duration`, then wait `settle` before returning.
    fn send_break(&mut self, duration: Duration, settle: Duration) -> io::Result<()>;

    /// Release the link. Calling it twice is harmless.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

pub struct SerialTransport {
    name: String,
    serial: Option<Box<dyn SerialPort>>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.name)
            .field("open", &self.serial.is_some())
            .finish()
    }
}

impl SerialTransport {
    /// Open `port` with 8-N-1 framing and a bounded read timeout.
    pub fn open(port: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        log::debug!("Opening BBTK on {} at {} bps", port, baud_rate);
        let serial = serialport::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|source| BbtkError::Connection {
                port: port.to_string(),
                baud_rate,
                source,
            })?;

        Ok(Self {
            name: port.to_string(),
            serial: Some(serial),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.serial.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "serial port already closed")
        })
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let serial = self.port()?;
        serial.write_all(bytes)?;
        serial.flush()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn reset_buffers(&mut self) -> io::Result<()> {
        self.port()?.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn send_break(&mut self, duration: Duration, settle: Duration) -> io::Result<()> {
        let serial = self.port()?;
        serial.set_break()?;
        thread::sleep(duration);
        serial.clear_break()?;
        thread::sleep(settle);
        Ok(())
    }

    fn close(&mut self) {
        if self.serial.take().is_some() {
            log::debug!("Closed serial port {}", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.serial.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}
