//! Caller-side view of a finished capture.
//!
//! The driver hands back raw text. A digital capture looks like
//!
//! ```text
//! SDAT;
//! <event count>
//! <capture time>
//! <sample count>
//! <event line>
//! ...
//! EDAT;
//! ```
//!
//! [`CaptureReport`] splits that into the header values and the event lines,
//! and can turn the events into a `polars` `DataFrame`.

use polars::prelude::{Column, DataFrame, PolarsError};

use crate::capture::CaptureResult;

const START_MARKER: &str = "SDAT;";
const END_MARKER: &str = "EDAT;";

const EVENT_INDEX_COLUMN_NAME: &str = "event_index";
const RAW_COLUMN_NAME: &str = "raw";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("No SDAT; header in capture")]
    MissingHeader,

    #[error("Capture ended before the {field} line")]
    MissingField { field: &'static str },

    #[error("Invalid {field} '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("No EDAT; trailer in capture")]
    MissingTrailer,

    #[error("Failed to build event table: {0}")]
    Polars(#[from] PolarsError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub event_count: u64,
    pub capture_time: u64,
    pub sample_count: u64,
    pub events: Vec<String>,
}

impl CaptureReport {
    pub fn parse(result: &CaptureResult) -> Result<Self, ReportError> {
        Self::parse_text(&result.text())
    }

    pub fn parse_text(text: &str) -> Result<Self, ReportError> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .skip_while(|line| *line != START_MARKER);

        if lines.next().is_none() {
            return Err(ReportError::MissingHeader);
        }

        let mut field = |name: &'static str| -> Result<u64, ReportError> {
            let value = lines.next().ok_or(ReportError::MissingField { field: name })?;
            value.parse().map_err(|_| ReportError::InvalidField {
                field: name,
                value: value.to_string(),
            })
        };
        let event_count = field("event count")?;
        let capture_time = field("capture time")?;
        let sample_count = field("sample count")?;

        let mut events = Vec::new();
        let mut terminated = false;
        for line in lines {
            if line == END_MARKER {
                terminated = true;
                break;
            }
            if !line.is_empty() {
                events.push(line.to_string());
            }
        }
        if !terminated {
            return Err(ReportError::MissingTrailer);
        }

        let report = Self {
            event_count,
            capture_time,
            sample_count,
            events,
        };
        if !report.is_consistent() {
            log::warn!(
                "Capture announced {} events but carried {}",
                report.event_count,
                report.events.len()
            );
        }
        Ok(report)
    }

    /// Whether the announced event count matches the event lines received.
    pub fn is_consistent(&self) -> bool {
        u64::try_from(self.events.len()).is_ok_and(|n| n == self.event_count)
    }

    /// One row per event line, in arrival order.
    pub fn to_frame(&self) -> Result<DataFrame, ReportError> {
        let index: Vec<u32> = (0..self.events.len())
            .map(|i| u32::try_from(i).unwrap_or(u32::MAX))
            .collect();
        let df = DataFrame::new(vec![
            Column::new(EVENT_INDEX_COLUMN_NAME.into(), index),
            Column::new(RAW_COLUMN_NAME.into(), self.events.clone()),
        ])?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = "\r\nSDAT;\n3\n10000000\n5\n000000000001\n000000000010\n000000000100\nEDAT;\n";

    #[test]
    fn test_parse_header_and_events() {
        let report = CaptureReport::parse_text(CAPTURE).unwrap();
        assert_eq!(report.event_count, 3);
        assert_eq!(report.capture_time, 10_000_000);
        assert_eq!(report.sample_count, 5);
        assert_eq!(report.events.len(), 3);
        assert_eq!(report.events[2], "000000000100");
        assert!(report.is_consistent());
    }

    #[test]
    fn test_event_frame() {
        let report = CaptureReport::parse_text(CAPTURE).unwrap();
        let df = report.to_frame().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 2);
        assert!(df.column(EVENT_INDEX_COLUMN_NAME).is_ok());
        let raw = df.column(RAW_COLUMN_NAME).unwrap().str().unwrap();
        assert_eq!(raw.get(0), Some("000000000001"));
    }

    #[test]
    fn test_missing_pieces() {
        assert!(matches!(
            CaptureReport::parse_text("EDAT;\n"),
            Err(ReportError::MissingHeader)
        ));
        assert!(matches!(
            CaptureReport::parse_text("SDAT;\n3\n"),
            Err(ReportError::MissingField { field: "capture time" })
        ));
        assert!(matches!(
            CaptureReport::parse_text("SDAT;\nthree\n1\n1\nEDAT;\n"),
            Err(ReportError::InvalidField { field: "event count", .. })
        ));
        assert!(matches!(
            CaptureReport::parse_text("SDAT;\n0\n1\n1\n"),
            Err(ReportError::MissingTrailer)
        ));
    }

    #[test]
    fn test_inconsistent_count_still_parses() {
        let report = CaptureReport::parse_text("SDAT;\n2\n1\n1\nabc\nEDAT;\n").unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.events, vec!["abc"]);
    }
}
