use std::time::Duration;

pub type Result<T> = std::result::Result<T, BbtkError>;

#[derive(Debug, thiserror::Error)]
pub enum BbtkError {
    #[error("Cannot open BBTK at {port} at {baud_rate} bps: {source}")]
    Connection {
        port: String,
        baud_rate: u32,
        #[source]
        source: serialport::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout error: no line terminator within {timeout:?}, got '{partial}'")]
    Timeout { timeout: Duration, partial: String },

    #[error("{command}: expected '{expected}', got '{actual}'")]
    Mismatch {
        command: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{command}: gave up waiting for '{expected}' after {waited:?} (pending '{pending}')")]
    PollDeadline {
        command: &'static str,
        expected: &'static str,
        waited: Duration,
        pending: String,
    },

    #[error("Capture stalled: {idle_reads} consecutive empty reads before EDAT ({} bytes received)", .received.len())]
    CaptureStalled { idle_reads: u32, received: Vec<u8> },

    #[error("Capture did not complete within {deadline:?} ({} bytes received)", .received.len())]
    CaptureDeadline { deadline: Duration, received: Vec<u8> },

    #[error("Threshold {value} for {channel} is out of range (0-127)")]
    InvalidThreshold { channel: &'static str, value: u8 },

    #[error("Capture duration must be at least one microsecond")]
    InvalidCaptureDuration,
}

impl BbtkError {
    /// A read ran out of time before the device finished a line.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether repeating the same exchange could reasonably succeed.
    pub fn is_retriable(&self) -> bool {
        self.is_timeout()
    }

    /// The exact reply text when the device answered with the wrong token.
    pub fn mismatched_reply(&self) -> Option<&str> {
        match self {
            Self::Mismatch { actual, .. } => Some(actual),
            _ => None,
        }
    }

    /// Bytes that arrived before an aborted capture gave up.
    pub fn partial_capture(&self) -> Option<&[u8]> {
        match self {
            Self::CaptureStalled { received, .. } | Self::CaptureDeadline { received, .. } => {
                Some(received)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_exposes_reply() {
        let err = BbtkError::Mismatch {
            command: "CONN",
            expected: "BBTK;".to_string(),
            actual: "HELLO".to_string(),
        };
        assert_eq!(err.mismatched_reply(), Some("HELLO"));
        assert!(!err.is_retriable());
        assert_eq!(err.to_string(), "CONN: expected 'BBTK;', got 'HELLO'");
    }

    #[test]
    fn test_timeout_is_retriable() {
        let err = BbtkError::Timeout {
            timeout: Duration::from_secs(1),
            partial: "BBT".to_string(),
        };
        assert!(err.is_timeout());
        assert!(err.is_retriable());
        assert_eq!(err.mismatched_reply(), None);

        let io = BbtkError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(!io.is_retriable());
    }
}
