use std::borrow::Cow;
use std::thread;
use std::time::{Duration, Instant};

use crate::command::{DIGITAL_CAPTURE_MODE, RUN_DIGITAL_SAMPLE, TIMED_LIMIT};
use crate::config::DrainLimits;
use crate::error::{BbtkError, Result};
use crate::line_terminal::LineTerminal;
use crate::transport::Transport;

/// Literal token that ends the streamed capture payload.
pub const COMPLETION_MARKER: &[u8] = b"EDAT";

/// The device only starts talking this close to the end of the window.
const OUTPUT_LEAD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Armed,
    Waiting,
    Draining,
    Complete,
    Failed,
}

/// Raw text the device streamed back during one capture, unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    data: Vec<u8>,
    duration: Duration,
}

impl CaptureResult {
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The capture window that was requested.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Runs one timed digital capture over an already configured link.
pub struct CaptureController<'a, T: Transport> {
    terminal: &'a mut LineTerminal<T>,
    limits: DrainLimits,
    state: CaptureState,
}

impl<'a, T: Transport> CaptureController<'a, T> {
    pub fn new(terminal: &'a mut LineTerminal<T>, limits: DrainLimits) -> Self {
        Self {
            terminal,
            limits,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Arm the device, wait out the window and drain until `EDAT` shows up.
    pub fn run(&mut self, duration: Duration) -> Result<CaptureResult> {
        if duration.as_micros() == 0 {
            return Err(BbtkError::InvalidCaptureDuration);
        }

        let outcome = self.arm(duration).and_then(|()| {
            self.wait(duration);
            self.drain()
        });

        match outcome {
            Ok(data) => {
                self.transition(CaptureState::Complete);
                log::info!("Capture complete: {} bytes", data.len());
                Ok(CaptureResult { data, duration })
            }
            Err(e) => {
                self.transition(CaptureState::Failed);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: CaptureState) {
        log::debug!("Capture: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn arm(&mut self, duration: Duration) -> Result<()> {
        for command in arming_sequence(duration) {
            self.terminal.send_command(&command)?;
        }
        self.transition(CaptureState::Armed);
        Ok(())
    }

    fn wait(&mut self, duration: Duration) {
        self.transition(CaptureState::Waiting);
        let idle = duration.saturating_sub(OUTPUT_LEAD);
        log::debug!("Waiting {:?} for the capture window to elapse", idle);
        thread::sleep(idle);
    }

    fn drain(&mut self) -> Result<Vec<u8>> {
        self.transition(CaptureState::Draining);
        let traffic = self.terminal.traffic_level();

        let mut received = self.terminal.take_pending();
        let mut scan_from = 0;
        let mut chunk = vec![0u8; self.limits.chunk_size.max(1)];
        let mut idle_reads = 0u32;
        let start = Instant::now();

        loop {
            if contains_marker(&received, scan_from) {
                return Ok(received);
            }
            if let Some(deadline) = self.limits.deadline {
                if start.elapsed() >= deadline {
                    return Err(BbtkError::CaptureDeadline { deadline, received });
                }
            }
            scan_from = received.len().saturating_sub(COMPLETION_MARKER.len() - 1);

            let n = self.terminal.transport_mut().read_available(&mut chunk)?;
            if n == 0 {
                idle_reads += 1;
                if self.limits.max_idle_reads.is_some_and(|max| idle_reads >= max) {
                    return Err(BbtkError::CaptureStalled {
                        idle_reads,
                        received,
                    });
                }
            } else {
                idle_reads = 0;
                log::log!(traffic, "Capture: {}", String::from_utf8_lossy(&chunk[..n]));
                received.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

/// Whether the marker starts anywhere at or after `from` in the cumulative buffer.
fn contains_marker(buf: &[u8], from: usize) -> bool {
    buf.get(from..)
        .is_some_and(|tail| tail.windows(COMPLETION_MARKER.len()).any(|w| w == COMPLETION_MARKER))
}

/// Commands sent to arm a capture of `duration`, in wire order.
pub fn arming_sequence(duration: Duration) -> [String; 4] {
    [
        DIGITAL_CAPTURE_MODE.mnemonic.to_string(),
        TIMED_LIMIT.mnemonic.to_string(),
        duration.as_micros().to_string(),
        RUN_DIGITAL_SAMPLE.mnemonic.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Incoming, MockTransport};
    use std::io;

    fn terminal(mock: MockTransport) -> LineTerminal<MockTransport> {
        LineTerminal::new(mock, Duration::from_millis(20), Duration::ZERO, log::Level::Debug)
    }

    #[test]
    fn test_marker_split_across_chunks() {
        let mock = MockTransport::new().with_chunks(
            "RUDS",
            &[b"SDAT;\n3\n", b"1000\n5\nEDA", b"T;\n"],
        );
        let mut term = terminal(mock);
        let mut controller = CaptureController::new(&mut term, DrainLimits::default());

        let result = controller.run(Duration::from_millis(500)).unwrap();
        assert_eq!(controller.state(), CaptureState::Complete);
        assert_eq!(result.text(), "SDAT;\n3\n1000\n5\nEDAT;\n");
        assert_eq!(result.duration(), Duration::from_millis(500));
        assert_eq!(
            term.transport().written_commands(),
            vec!["DSCM", "TIML", "500000", "RUDS"]
        );
    }

    #[test]
    fn test_marker_split_one_byte_at_a_time() {
        let mock = MockTransport::new().with_chunks("RUDS", &[b"x\nE", b"D", b"A", b"T"]);
        let mut term = terminal(mock);
        let result = CaptureController::new(&mut term, DrainLimits::default())
            .run(Duration::from_secs(1))
            .unwrap();
        assert!(result.text().ends_with("EDAT"));
    }

    #[test]
    fn test_timeouts_between_chunks_are_not_errors() {
        let script = vec![
            Incoming::Timeout,
            Incoming::Data(b"SDAT;\n0\n".to_vec()),
            Incoming::Timeout,
            Incoming::Timeout,
            Incoming::Data(b"EDAT;\n".to_vec()),
        ];
        let mut term = terminal(MockTransport::new().with_script("RUDS", script));
        let result = CaptureController::new(&mut term, DrainLimits::default())
            .run(Duration::from_secs(1))
            .unwrap();
        assert_eq!(result.bytes(), b"SDAT;\n0\nEDAT;\n");
    }

    #[test]
    fn test_silent_device_stalls_after_idle_limit() {
        let mock = MockTransport::new().with_chunks("RUDS", &[b"SDAT;\n"]);
        let mut term = terminal(mock);
        let limits = DrainLimits {
            max_idle_reads: Some(5),
            ..DrainLimits::default()
        };
        let mut controller = CaptureController::new(&mut term, limits);
        let err = controller.run(Duration::from_secs(1)).unwrap_err();

        assert_eq!(controller.state(), CaptureState::Failed);
        assert!(matches!(err, BbtkError::CaptureStalled { idle_reads: 5, .. }));
        assert_eq!(err.partial_capture(), Some(&b"SDAT;\n"[..]));
    }

    #[test]
    fn test_deadline_bounds_the_drain() {
        let limits = DrainLimits {
            max_idle_reads: None,
            deadline: Some(Duration::from_millis(30)),
            ..DrainLimits::default()
        };
        let mut term = terminal(MockTransport::new());
        let err = CaptureController::new(&mut term, limits)
            .run(Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, BbtkError::CaptureDeadline { .. }));
    }

    #[test]
    fn test_read_failure_aborts_capture() {
        let script = vec![
            Incoming::Data(b"SDAT;\n".to_vec()),
            Incoming::Fail(io::ErrorKind::BrokenPipe),
        ];
        let mut term = terminal(MockTransport::new().with_script("RUDS", script));
        let mut controller = CaptureController::new(&mut term, DrainLimits::default());
        let err = controller.run(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, BbtkError::Io(_)));
        assert_eq!(controller.state(), CaptureState::Failed);
    }

    #[test]
    fn test_write_failure_while_arming() {
        let mock = MockTransport::new().with_write_failure("TIML");
        let mut term = terminal(mock);
        let mut controller = CaptureController::new(&mut term, DrainLimits::default());
        let err = controller.run(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, BbtkError::Io(_)));
        assert_eq!(controller.state(), CaptureState::Failed);
        assert_eq!(term.transport().written_commands(), vec!["DSCM"]);
    }

    #[test]
    fn test_zero_duration_rejected_before_arming() {
        let mut term = terminal(MockTransport::new());
        let mut controller = CaptureController::new(&mut term, DrainLimits::default());
        let err = controller.run(Duration::ZERO).unwrap_err();
        assert!(matches!(err, BbtkError::InvalidCaptureDuration));
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(term.transport().written_commands().is_empty());
    }

    #[test]
    fn test_buffered_line_bytes_count_towards_capture() {
        let mock = MockTransport::new()
            .with_incoming(Incoming::Data(b"ECHO\nSDAT;\nED".to_vec()))
            .with_chunks("RUDS", &[b"AT;\n"]);
        let mut term = terminal(mock);
        assert_eq!(term.read_line().unwrap(), "ECHO");

        let result = CaptureController::new(&mut term, DrainLimits::default())
            .run(Duration::from_secs(1))
            .unwrap();
        assert_eq!(result.text(), "SDAT;\nEDAT;\n");
    }

    #[test]
    fn test_arming_sequence() {
        assert_eq!(
            arming_sequence(Duration::from_secs(30)),
            ["DSCM", "TIML", "30000000", "RUDS"]
        );
    }

    #[test]
    fn test_contains_marker_respects_offset() {
        assert!(contains_marker(b"xxEDAT", 0));
        assert!(contains_marker(b"xxEDAT", 2));
        assert!(!contains_marker(b"xxEDAT", 3));
        assert!(!contains_marker(b"ED", 5));
    }
}
