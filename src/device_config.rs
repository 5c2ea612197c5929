use std::fmt;

use crate::error::{BbtkError, Result};

pub const MAX_THRESHOLD: u8 = 127;

/// Wire order of the `SEPV` values, as the firmware reads them.
pub const THRESHOLD_CHANNELS: [&str; 8] = [
    "Mic1", "Mic2", "Sounder1", "Sounder2", "Opto1", "Opto2", "Opto3", "Opto4",
];

/// Activation thresholds for the eight adjustable lines.
///
/// Mic activation, sounder amplitude and opto luminance, each 0-127.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdSet {
    mic: [u8; 2],
    sounder: [u8; 2],
    opto: [u8; 4],
}

impl ThresholdSet {
    pub fn builder() -> ThresholdBuilder {
        ThresholdBuilder {
            set: Self::default(),
        }
    }

    pub fn mic(&self) -> [u8; 2] {
        self.mic
    }

    pub fn sounder(&self) -> [u8; 2] {
        self.sounder
    }

    pub fn opto(&self) -> [u8; 4] {
        self.opto
    }

    /// Values in the order they go on the wire after `SEPV`.
    pub fn wire_values(&self) -> [u8; 8] {
        [
            self.mic[0],
            self.mic[1],
            self.sounder[0],
            self.sounder[1],
            self.opto[0],
            self.opto[1],
            self.opto[2],
            self.opto[3],
        ]
    }

    /// The eight value commands that follow `SEPV`, as bare decimals.
    pub fn value_commands(&self) -> Vec<String> {
        self.wire_values().iter().map(u8::to_string).collect()
    }

    fn validate(self) -> Result<Self> {
        for (channel, value) in THRESHOLD_CHANNELS.into_iter().zip(self.wire_values()) {
            if value > MAX_THRESHOLD {
                return Err(BbtkError::InvalidThreshold { channel, value });
            }
        }
        Ok(self)
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            mic: [0, 0],
            sounder: [63, 63],
            opto: [110, 110, 110, 110],
        }
    }
}

/// Starts from the default thresholds; `build` rejects values above 127.
#[derive(Debug, Clone)]
pub struct ThresholdBuilder {
    set: ThresholdSet,
}

impl ThresholdBuilder {
    pub fn mic1(mut self, value: u8) -> Self {
        self.set.mic[0] = value;
        self
    }

    pub fn mic2(mut self, value: u8) -> Self {
        self.set.mic[1] = value;
        self
    }

    pub fn sounder1(mut self, value: u8) -> Self {
        self.set.sounder[0] = value;
        self
    }

    pub fn sounder2(mut self, value: u8) -> Self {
        self.set.sounder[1] = value;
        self
    }

    pub fn opto1(mut self, value: u8) -> Self {
        self.set.opto[0] = value;
        self
    }

    pub fn opto2(mut self, value: u8) -> Self {
        self.set.opto[1] = value;
        self
    }

    pub fn opto3(mut self, value: u8) -> Self {
        self.set.opto[2] = value;
        self
    }

    pub fn opto4(mut self, value: u8) -> Self {
        self.set.opto[3] = value;
        self
    }

    pub fn all_optos(mut self, value: u8) -> Self {
        self.set.opto = [value; 4];
        self
    }

    pub fn build(self) -> Result<ThresholdSet> {
        self.set.validate()
    }
}

/// Leading-edge smoothing per sensor.
///
/// With smoothing off the device reports every leading edge, e.g. each
/// refresh of a CRT. With smoothing on, subtract 20ms from offset times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothingMask {
    pub mic1: bool,
    pub mic2: bool,
    pub opto1: bool,
    pub opto2: bool,
    pub opto3: bool,
    pub opto4: bool,
}

impl SmoothingMask {
    pub const ENCODED_LEN: usize = 8;

    /// Smoothing off on every channel.
    pub fn none() -> Self {
        Self {
            mic1: false,
            mic2: false,
            opto1: false,
            opto2: false,
            opto3: false,
            opto4: false,
        }
    }

    pub fn mics(mut self, on: bool) -> Self {
        self.mic1 = on;
        self.mic2 = on;
        self
    }

    pub fn optos(mut self, on: bool) -> Self {
        self.opto1 = on;
        self.opto2 = on;
        self.opto3 = on;
        self.opto4 = on;
        self
    }

    /// `Mic1 Mic2 Opto4 Opto3 Opto2 Opto1` as '0'/'1', then the two reserved '1' bits.
    pub fn encode(&self) -> String {
        [
            self.mic1, self.mic2, self.opto4, self.opto3, self.opto2, self.opto1, true, true,
        ]
        .iter()
        .map(|&on| if on { '1' } else { '0' })
        .collect()
    }
}

/// Mics smoothed, optos raw.
impl Default for SmoothingMask {
    fn default() -> Self {
        Self::none().mics(true)
    }
}

impl fmt::Display for SmoothingMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_wire_order() {
        let set = ThresholdSet::default();
        assert_eq!(
            set.value_commands(),
            vec!["0", "0", "63", "63", "110", "110", "110", "110"]
        );
    }

    #[test]
    fn test_builder_places_channels() {
        let set = ThresholdSet::builder()
            .mic1(1)
            .mic2(2)
            .sounder1(3)
            .sounder2(4)
            .opto1(5)
            .opto2(6)
            .opto3(7)
            .opto4(127)
            .build()
            .unwrap();
        assert_eq!(set.wire_values(), [1, 2, 3, 4, 5, 6, 7, 127]);
        assert_eq!(set.value_commands()[7], "127");
    }

    #[test]
    fn test_each_opto_setter_targets_its_own_channel() {
        let set = ThresholdSet::builder().opto2(1).build().unwrap();
        assert_eq!(set.opto(), [110, 1, 110, 110]);

        let set = ThresholdSet::builder().all_optos(20).opto4(99).build().unwrap();
        assert_eq!(set.opto(), [20, 20, 20, 99]);
    }

    #[test]
    fn test_out_of_range_opto_reported_by_channel() {
        let err = ThresholdSet::builder().opto3(200).build().unwrap_err();
        assert!(matches!(
            err,
            BbtkError::InvalidThreshold {
                channel: "Opto3",
                value: 200
            }
        ));
    }

    #[test]
    fn test_threshold_above_127_rejected() {
        let err = ThresholdSet::builder().sounder2(128).build().unwrap_err();
        assert!(matches!(
            err,
            BbtkError::InvalidThreshold {
                channel: "Sounder2",
                value: 128
            }
        ));
    }

    #[test]
    fn test_value_commands_have_no_leading_zeros() {
        for value in 0..=MAX_THRESHOLD {
            let set = ThresholdSet::builder().mic1(value).build().unwrap();
            let first = &set.value_commands()[0];
            assert_eq!(first, &value.to_string());
            assert!(first == "0" || !first.starts_with('0'));
        }
    }

    #[test]
    fn test_mask_encoding_order() {
        assert_eq!(SmoothingMask::default().encode(), "11000011");
        assert_eq!(SmoothingMask::none().encode(), "00000011");

        let mask = SmoothingMask {
            opto1: true,
            ..SmoothingMask::none()
        };
        assert_eq!(mask.encode(), "00000111");

        let mask = SmoothingMask {
            opto4: true,
            ..SmoothingMask::none()
        };
        assert_eq!(mask.to_string(), "00100011");
    }

    #[test]
    fn test_every_mask_is_eight_chars_ending_in_11() {
        for bits in 0u8..64 {
            let mask = SmoothingMask {
                mic1: bits & 1 != 0,
                mic2: bits & 2 != 0,
                opto1: bits & 4 != 0,
                opto2: bits & 8 != 0,
                opto3: bits & 16 != 0,
                opto4: bits & 32 != 0,
            };
            let encoded = mask.encode();
            assert_eq!(encoded.len(), SmoothingMask::ENCODED_LEN);
            assert!(encoded.ends_with("11"));
        }
    }
}
