//! # BBTK RS
//!
//! A Rust library for driving a Black Box ToolKit v2 (BBTK) timing-capture
//! device over its serial link.
//!
//! The BBTK speaks a line-oriented ASCII protocol: commands are terminated by
//! CRLF, replies by LF. This crate frames commands, matches the expected
//! replies, configures thresholds and edge smoothing, and runs timed digital
//! captures whose streamed output is handed back unparsed.
//!
//! ## Features
//!
//! - **Serial transport**: 8-N-1 over `serialport`, with bounded read timeouts and break support
//! - **Command catalogue**: every device command described as data (mnemonic, reply policy, delays)
//! - **Long operations**: memory clear and keypad calibration poll until their terminal token
//! - **Capture**: detects the `EDAT` marker even when it straddles read chunks
//! - **Simulation**: [`mock::MockTransport`] replays scripted device replies
//!
//! ## Examples
//!
//! ### Session setup and capture
//!
//! ```rust,no_run
//! use bbtk_rs::{Bbtk, BbtkConfig};
//! use std::time::Duration;
//!
//! let config = BbtkConfig::new("/dev/ttyACM0", 57600).with_verbose(true);
//! let mut bbtk = Bbtk::open(&config)?;
//!
//! bbtk.send_break()?;
//! bbtk.reset_buffers()?;
//! bbtk.connect()?;
//! bbtk.check_liveness()?;
//! println!("Firmware: {}", bbtk.firmware_version());
//!
//! bbtk.set_default_smoothing()?;
//! bbtk.set_default_thresholds()?;
//!
//! let capture = bbtk.capture(Duration::from_secs(10))?;
//! println!("{}", capture.text());
//!
//! bbtk.disconnect()?;
//! # Ok::<(), bbtk_rs::BbtkError>(())
//! ```
//!
//! ### Thresholds and smoothing
//!
//! ```rust
//! use bbtk_rs::{SmoothingMask, ThresholdSet};
//!
//! let thresholds = ThresholdSet::builder()
//!     .mic1(20)
//!     .all_optos(100)
//!     .build()?;
//! assert_eq!(thresholds.value_commands()[0], "20");
//!
//! let mask = SmoothingMask::none().mics(true);
//! assert_eq!(mask.encode(), "11000011");
//! # Ok::<(), bbtk_rs::BbtkError>(())
//! ```
//!
//! ### Parsing a capture
//!
//! ```rust
//! use bbtk_rs::CaptureReport;
//!
//! let report = CaptureReport::parse_text("SDAT;\n1\n1000000\n4\n000000000001\nEDAT;\n")?;
//! assert_eq!(report.event_count, 1);
//! let events = report.to_frame()?;
//! assert_eq!(events.height(), 1);
//! # Ok::<(), bbtk_rs::ReportError>(())
//! ```

pub mod bbtk;
pub mod capture;
pub mod capture_report;
pub mod command;
pub mod config;
pub mod device_config;
pub mod error;
pub mod line_terminal;
pub mod mock;
pub mod transport;

// Re-export the main types for convenience
pub use bbtk::{Bbtk, ClearKind, Liveness, MemoryClear};

pub use capture::{CaptureController, CaptureResult, CaptureState, COMPLETION_MARKER};

pub use capture_report::{CaptureReport, ReportError};

pub use config::{BbtkConfig, DrainLimits, PollPolicy, Timing};

pub use device_config::{SmoothingMask, ThresholdBuilder, ThresholdSet};

pub use error::{BbtkError, Result};

pub use line_terminal::LineTerminal;

pub use transport::{SerialTransport, Transport};
