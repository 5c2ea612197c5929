use std::thread;
use std::time::{Duration, Instant};

use crate::capture::{CaptureController, CaptureResult};
use crate::command::{self, DeviceCommand, PollBudget, Reply, ERASE_SECTORS, FULL_FORMAT};
use crate::config::{BbtkConfig, DrainLimits, PollPolicy, Timing};
use crate::device_config::{SmoothingMask, ThresholdSet};
use crate::error::{BbtkError, Result};
use crate::line_terminal::LineTerminal;
use crate::transport::{SerialTransport, Transport};

/// Outcome of the last `ECHO` liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Not checked yet.
    Unknown,
    Alive,
    /// The device answered, but not with `ECHO`.
    Garbled,
}

/// How the device cleared its timing memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearKind {
    FullFormat,
    EraseSectors,
    /// First reply was neither `FRMT;` nor `ESEC;`.
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryClear {
    pub kind: ClearKind,
    /// Lines seen before `DONE;` other than the first one.
    pub intermediate_lines: usize,
}

/// What one table-driven exchange produced.
#[derive(Debug, Default)]
struct Exchange {
    first_line: Option<String>,
    skipped: usize,
}

/// An open session with one BBTK.
///
/// Owns the link for its whole lifetime. Every call runs to completion
/// before returning, so commands reach the device in call order.
pub struct Bbtk<T: Transport = SerialTransport> {
    terminal: LineTerminal<T>,
    timing: Timing,
    calibration_poll: PollPolicy,
    clear_poll: PollPolicy,
    drain: DrainLimits,
    liveness: Liveness,
    thresholds: Option<ThresholdSet>,
    smoothing: Option<SmoothingMask>,
}

impl Bbtk<SerialTransport> {
    /// Open the serial port named in `config`.
    pub fn open(config: &BbtkConfig) -> Result<Self> {
        let transport = SerialTransport::open(&config.port, config.baud_rate, config.read_timeout)?;
        log::info!("Opened BBTK on {} at {} bps", config.port, config.baud_rate);
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Bbtk<T> {
    pub fn with_transport(transport: T, config: &BbtkConfig) -> Self {
        Self {
            terminal: LineTerminal::new(
                transport,
                config.read_timeout,
                config.timing.command_settle,
                config.traffic_level(),
            ),
            timing: config.timing,
            calibration_poll: config.calibration_poll,
            clear_poll: config.clear_poll,
            drain: config.drain,
            liveness: Liveness::Unknown,
            thresholds: None,
            smoothing: None,
        }
    }

    /// Handshake: `CONN` must be answered with `BBTK;`.
    pub fn connect(&mut self) -> Result<()> {
        self.exchange(&command::CONNECT)?;
        log::info!("Connected to BBTK");
        Ok(())
    }

    /// Send `ECHO` and expect it back.
    ///
    /// A wrong reply still counts as the device having responded:
    /// [`liveness`](Self::liveness) becomes [`Liveness::Garbled`] and the
    /// mismatch is returned. Transport failures leave the flag untouched.
    pub fn check_liveness(&mut self) -> Result<()> {
        match self.exchange(&command::ECHO) {
            Ok(_) => {
                self.liveness = Liveness::Alive;
                Ok(())
            }
            Err(e @ BbtkError::Mismatch { .. }) => {
                self.liveness = Liveness::Garbled;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    pub fn is_alive(&self) -> bool {
        self.liveness == Liveness::Alive
    }

    pub fn set_smoothing(&mut self, mask: &SmoothingMask) -> Result<()> {
        log::debug!("Setting smoothing mask {}", mask);
        self.exchange(&command::SMOOTHING)?;
        self.terminal.send_command(&mask.encode())?;
        self.smoothing = Some(*mask);
        Ok(())
    }

    pub fn set_default_smoothing(&mut self) -> Result<()> {
        self.set_smoothing(&SmoothingMask::default())
    }

    /// Last smoothing mask this session sent.
    pub fn smoothing(&self) -> Option<&SmoothingMask> {
        self.smoothing.as_ref()
    }

    /// Ask the device to drop its USB output buffer.
    ///
    /// If this does not help, [`send_break`](Self::send_break) usually does.
    pub fn flush(&mut self) -> Result<()> {
        self.exchange(&command::FLUSH)?;
        Ok(())
    }

    /// Firmware version reported by the device, or an empty string if the
    /// query failed. Failures are only logged.
    pub fn firmware_version(&mut self) -> String {
        match self.exchange(&command::FIRMWARE) {
            Ok(exchange) => exchange.first_line.unwrap_or_default(),
            Err(e) => {
                log::warn!("GetFirmwareVersion: {}", e);
                String::new()
            }
        }
    }

    /// Start the threshold calibration procedure on the device keypad and
    /// wait until the operator finishes it.
    ///
    /// Returns how many intermediate lines the device sent before `Done;`.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn adjust_thresholds(&mut self) -> Result<usize> {
        let exchange = self.exchange(&command::ADJUST_THRESHOLDS)?;
        Ok(exchange.skipped)
    }

    /// `SEPV` followed by the eight values in firmware channel order.
    pub fn set_thresholds(&mut self, thresholds: &ThresholdSet) -> Result<()> {
        log::debug!("Setting thresholds {:?}", thresholds);
        self.exchange(&command::SET_THRESHOLDS)?;
        for value in thresholds.value_commands() {
            self.terminal.send_command(&value)?;
        }
        thread::sleep(self.timing.device_commit);
        self.thresholds = Some(*thresholds);
        Ok(())
    }

    pub fn set_default_thresholds(&mut self) -> Result<()> {
        self.set_thresholds(&ThresholdSet::default())
    }

    /// Last thresholds this session applied.
    ///
    /// The firmware has no read-back command, so this is the host-side record.
    pub fn thresholds(&self) -> Option<&ThresholdSet> {
        self.thresholds.as_ref()
    }

    /// Format the timing RAM (first use after power-up or reset) or erase
    /// the sectors used so far, and wait for `DONE;`.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn clear_timing_data(&mut self) -> Result<MemoryClear> {
        let exchange = self.exchange(&command::CLEAR_TIMING_DATA)?;
        let kind = match exchange.first_line.as_deref() {
            Some(FULL_FORMAT) => ClearKind::FullFormat,
            Some(ERASE_SECTORS) => ClearKind::EraseSectors,
            other => ClearKind::Unexpected(other.unwrap_or_default().to_string()),
        };
        Ok(MemoryClear {
            kind,
            intermediate_lines: exchange.skipped,
        })
    }

    /// Show copyright and firmware date on the device LCD.
    pub fn display_info(&mut self) -> Result<()> {
        self.exchange(&command::DISPLAY_INFO)?;
        Ok(())
    }

    /// Wake a stuck device with a serial break.
    pub fn send_break(&mut self) -> Result<()> {
        log::debug!("Sending serial break.");
        self.terminal
            .transport_mut()
            .send_break(self.timing.break_duration, self.timing.break_settle)?;
        Ok(())
    }

    /// Drop unread input and unsent output, including partially read lines.
    pub fn reset_buffers(&mut self) -> Result<()> {
        self.terminal.reset()
    }

    /// Run one timed capture and return the raw text the device streamed back.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn capture(&mut self, duration: Duration) -> Result<CaptureResult> {
        self.capture_controller().run(duration)
    }

    /// A controller borrowing this session, for callers that want to
    /// inspect the capture state afterwards.
    pub fn capture_controller(&mut self) -> CaptureController<'_, T> {
        CaptureController::new(&mut self.terminal, self.drain)
    }

    /// Send a break and release the link.
    ///
    /// The link is closed even when the break fails. Closing an already
    /// closed session does nothing.
    pub fn close(&mut self) -> Result<()> {
        if !self.terminal.transport().is_open() {
            return Ok(());
        }
        let result = self.send_break();
        self.terminal.transport_mut().close();
        log::info!("Disconnected from BBTK");
        result
    }

    /// [`close`](Self::close), consuming the session.
    pub fn disconnect(mut self) -> Result<()> {
        self.close()
    }

    pub fn transport(&self) -> &T {
        self.terminal.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.terminal.transport_mut()
    }

    fn exchange(&mut self, cmd: &DeviceCommand) -> Result<Exchange> {
        self.terminal.send_command(cmd.mnemonic)?;
        if cmd.reply_delay {
            thread::sleep(self.timing.connect_reply_delay);
        }

        let exchange = match cmd.reply {
            Reply::Ignore => Exchange::default(),
            Reply::Exact(expected) => {
                let line = self.terminal.read_line()?;
                if line != expected {
                    return Err(BbtkError::Mismatch {
                        command: cmd.mnemonic,
                        expected: expected.to_string(),
                        actual: line,
                    });
                }
                Exchange {
                    first_line: Some(line),
                    skipped: 0,
                }
            }
            Reply::Verbatim => Exchange {
                first_line: Some(self.terminal.read_line()?),
                skipped: 0,
            },
            Reply::PollUntil {
                preamble,
                terminal,
                budget,
            } => {
                let policy = match budget {
                    PollBudget::Calibration => self.calibration_poll,
                    PollBudget::MemoryClear => self.clear_poll,
                };
                self.poll_until(cmd.mnemonic, preamble, terminal, policy)?
            }
        };

        if cmd.commit {
            thread::sleep(self.timing.device_commit);
        }
        Ok(exchange)
    }

    fn poll_until(
        &mut self,
        mnemonic: &'static str,
        preamble: &[&str],
        terminal: &'static str,
        policy: PollPolicy,
    ) -> Result<Exchange> {
        let start = Instant::now();
        let mut exchange = Exchange::default();

        if !preamble.is_empty() {
            let first = self.next_polled_line(mnemonic, terminal, start, policy)?;
            if !preamble.contains(&first.as_str()) {
                log::warn!(
                    "{}: expected one of {:?}, got \"{}\"",
                    mnemonic,
                    preamble,
                    first
                );
            }
            let done = first == terminal;
            exchange.first_line = Some(first);
            // A DONE; in place of the preamble ends the wait without reading a second line.
            if done {
                return Ok(exchange);
            }
        }

        loop {
            let line = self.next_polled_line(mnemonic, terminal, start, policy)?;
            if line == terminal {
                return Ok(exchange);
            }
            log::warn!("{}: expected \"{}\", got \"{}\"", mnemonic, terminal, line);
            exchange.skipped += 1;
            thread::sleep(policy.interval);
        }
    }

    /// Next line of a long-running operation. Read timeouts are expected
    /// and retried; only I/O failures and the poll budget end the wait.
    fn next_polled_line(
        &mut self,
        mnemonic: &'static str,
        terminal: &'static str,
        start: Instant,
        policy: PollPolicy,
    ) -> Result<String> {
        loop {
            if let Some(max_wait) = policy.max_wait {
                if start.elapsed() >= max_wait {
                    return Err(BbtkError::PollDeadline {
                        command: mnemonic,
                        expected: terminal,
                        waited: start.elapsed(),
                        pending: String::from_utf8_lossy(&self.terminal.take_pending()).into_owned(),
                    });
                }
            }

            match self.terminal.read_line() {
                Ok(line) => return Ok(line),
                Err(e) if e.is_timeout() => {
                    log::debug!("{}: still waiting for \"{}\"", mnemonic, terminal);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
