/// What the driver reads back after sending a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Nothing is read.
    Ignore,
    /// One line that must match the token exactly.
    Exact(&'static str),
    /// One line handed back as is.
    Verbatim,
    /// Lines are read until one equals `terminal`.
    ///
    /// When `preamble` is non-empty the first line is checked against it and a
    /// warning is logged if it matches none. Every other line is logged and
    /// skipped; only hard I/O errors or the poll budget end the wait.
    PollUntil {
        preamble: &'static [&'static str],
        terminal: &'static str,
        budget: PollBudget,
    },
}

/// Which configured [`PollPolicy`](crate::config::PollPolicy) bounds a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBudget {
    Calibration,
    MemoryClear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCommand {
    pub mnemonic: &'static str,
    pub reply: Reply,
    /// Pause between sending and the first read.
    pub reply_delay: bool,
    /// Wait out the device commit latency once the exchange is over.
    pub commit: bool,
}

impl DeviceCommand {
    const fn new(mnemonic: &'static str, reply: Reply) -> Self {
        Self {
            mnemonic,
            reply,
            reply_delay: false,
            commit: false,
        }
    }

    const fn with_reply_delay(mut self) -> Self {
        self.reply_delay = true;
        self
    }

    const fn with_commit(mut self) -> Self {
        self.commit = true;
        self
    }
}

pub const CONNECT: DeviceCommand = DeviceCommand::new("CONN", Reply::Exact("BBTK;")).with_reply_delay();
pub const ECHO: DeviceCommand = DeviceCommand::new("ECHO", Reply::Exact("ECHO"));
/// Followed by the 8-character smoothing mask.
pub const SMOOTHING: DeviceCommand = DeviceCommand::new("SMOO", Reply::Ignore);
/// Asks the device to drop its USB output buffer.
pub const FLUSH: DeviceCommand = DeviceCommand::new("FLUS", Reply::Ignore).with_commit();
pub const FIRMWARE: DeviceCommand = DeviceCommand::new("FIRM", Reply::Verbatim);
/// Interactive threshold calibration on the device's own keypad.
pub const ADJUST_THRESHOLDS: DeviceCommand = DeviceCommand::new(
    "AJPV",
    Reply::PollUntil {
        preamble: &[],
        terminal: "Done;",
        budget: PollBudget::Calibration,
    },
);
/// Followed by the eight threshold values.
pub const SET_THRESHOLDS: DeviceCommand = DeviceCommand::new("SEPV", Reply::Ignore);
/// Formats the timing RAM (`FRMT;`) or erases used sectors (`ESEC;`).
pub const CLEAR_TIMING_DATA: DeviceCommand = DeviceCommand::new(
    "SPIE",
    Reply::PollUntil {
        preamble: &[FULL_FORMAT, ERASE_SECTORS],
        terminal: "DONE;",
        budget: PollBudget::MemoryClear,
    },
)
.with_commit();
/// Shows copyright and firmware date on the device LCD.
pub const DISPLAY_INFO: DeviceCommand = DeviceCommand::new("ABOU", Reply::Ignore).with_commit();

pub const DIGITAL_CAPTURE_MODE: DeviceCommand = DeviceCommand::new("DSCM", Reply::Ignore);
/// Followed by the capture window in microseconds.
pub const TIMED_LIMIT: DeviceCommand = DeviceCommand::new("TIML", Reply::Ignore);
pub const RUN_DIGITAL_SAMPLE: DeviceCommand = DeviceCommand::new("RUDS", Reply::Ignore);

pub const FULL_FORMAT: &str = "FRMT;";
pub const ERASE_SECTORS: &str = "ESEC;";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_mnemonics_are_four_letters() {
        let all = [
            CONNECT,
            ECHO,
            SMOOTHING,
            FLUSH,
            FIRMWARE,
            ADJUST_THRESHOLDS,
            SET_THRESHOLDS,
            CLEAR_TIMING_DATA,
            DISPLAY_INFO,
            DIGITAL_CAPTURE_MODE,
            TIMED_LIMIT,
            RUN_DIGITAL_SAMPLE,
        ];
        for cmd in all {
            assert_eq!(cmd.mnemonic.len(), 4, "{}", cmd.mnemonic);
            assert!(cmd.mnemonic.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_connect_waits_before_reading() {
        assert!(CONNECT.reply_delay);
        assert_eq!(CONNECT.reply, Reply::Exact("BBTK;"));
        assert!(!ECHO.reply_delay);
    }

    #[test]
    fn test_clear_accepts_both_preambles() {
        let Reply::PollUntil {
            preamble, terminal, ..
        } = CLEAR_TIMING_DATA.reply
        else {
            unreachable!("SPIE polls for completion");
        };
        assert_eq!(preamble, &["FRMT;", "ESEC;"]);
        assert_eq!(terminal, "DONE;");
        assert!(CLEAR_TIMING_DATA.commit);
    }
}
