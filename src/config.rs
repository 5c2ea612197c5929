use std::time::Duration;

pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD_RATE: u32 = 57600;
pub const DEFAULT_CAPTURE_DURATION: Duration = Duration::from_secs(30);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Fixed delays the device firmware needs between protocol steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause after every command so the device can process it.
    pub command_settle: Duration,
    /// Extra pause between sending `CONN` and reading the reply.
    pub connect_reply_delay: Duration,
    /// Device-side commit latency after FLUS, SEPV, ABOU and SPIE.
    pub device_commit: Duration,
    /// How long the break condition is held.
    pub break_duration: Duration,
    /// Wait after releasing a break.
    pub break_settle: Duration,
}

impl Timing {
    /// No delays at all. Meant for simulated transports.
    pub const fn none() -> Self {
        Self {
            command_settle: Duration::ZERO,
            connect_reply_delay: Duration::ZERO,
            device_commit: Duration::ZERO,
            break_duration: Duration::ZERO,
            break_settle: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            command_settle: Duration::from_millis(50),
            connect_reply_delay: Duration::from_millis(10),
            device_commit: Duration::from_secs(1),
            break_duration: Duration::from_millis(10),
            break_settle: Duration::from_secs(1),
        }
    }
}

/// How a poll-until-token loop retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits for as long as the device keeps the link alive.
    pub max_wait: Option<Duration>,
}

impl PollPolicy {
    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_wait: None,
        }
    }

    pub const fn bounded(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            max_wait: Some(max_wait),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_millis(100))
    }
}

/// Termination limits for the capture drain loop besides the `EDAT` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainLimits {
    pub chunk_size: usize,
    /// Consecutive reads returning nothing before the capture is declared stalled.
    pub max_idle_reads: Option<u32>,
    /// Overall budget for the drain phase, measured from its first read.
    pub deadline: Option<Duration>,
}

impl Default for DrainLimits {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            max_idle_reads: Some(30),
            deadline: None,
        }
    }
}

/// Everything a caller may tune about one BBTK session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BbtkConfig {
    pub port: String,
    pub baud_rate: u32,
    pub capture_duration: Duration,
    pub verbose: bool,
    pub read_timeout: Duration,
    pub timing: Timing,
    pub calibration_poll: PollPolicy,
    pub clear_poll: PollPolicy,
    pub drain: DrainLimits,
}

impl Default for BbtkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            capture_duration: DEFAULT_CAPTURE_DURATION,
            verbose: false,
            read_timeout: DEFAULT_READ_TIMEOUT,
            timing: Timing::default(),
            calibration_poll: PollPolicy::default(),
            clear_poll: PollPolicy::default(),
            drain: DrainLimits::default(),
        }
    }
}

impl BbtkConfig {
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            ..Self::default()
        }
    }

    pub fn with_capture_duration(mut self, duration: Duration) -> Self {
        self.capture_duration = duration;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_calibration_poll(mut self, policy: PollPolicy) -> Self {
        self.calibration_poll = policy;
        self
    }

    pub fn with_clear_poll(mut self, policy: PollPolicy) -> Self {
        self.clear_poll = policy;
        self
    }

    pub fn with_drain_limits(mut self, drain: DrainLimits) -> Self {
        self.drain = drain;
        self
    }

    /// Verbose sessions log wire traffic at `Info` instead of `Debug`.
    pub(crate) fn traffic_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}
