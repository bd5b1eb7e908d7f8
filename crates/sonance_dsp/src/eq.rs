//! 10-Band Graphic Equalizer Layout (12 filter bands)
//!
//! Band layout and slider mapping for the graph's `equalizer-nbands`
//! element. The ten user-visible bands are framed by two dummy corner bands
//! (20 Hz and 20 kHz, zero bandwidth, zero gain). With the corners in place
//! every user band is a peaking filter, so the outermost sliders never act
//! as shelves.
//!
//! ```text
//!  band:   0     1    2    3    4    5     6     7     8      9      10     11
//!  freq:  20    60  170  310  600  1k    3k    6k    12k    14k    16k    20k
//!         └dummy┘                                                       └dummy┘
//! ```
//!
//! Bandwidth of a user band is the distance to the previous user band
//! (the first one measures from 0 Hz), and Q = frequency / bandwidth.

use serde::{Deserialize, Serialize};

use crate::error::{DspError, DspResult};

/// Number of user-visible bands
pub const EQ_BAND_COUNT: usize = 10;

/// Number of filter bands including the two dummy corners
pub const EQ_FILTER_BANDS: usize = EQ_BAND_COUNT + 2;

/// Centre frequencies (Hz) of the user-visible bands
pub const EQ_BANDS: [f32; EQ_BAND_COUNT] = [
    60.0, 170.0, 310.0, 600.0, 1000.0, 3000.0, 6000.0, 12000.0, 14000.0, 16000.0,
];

/// Dummy corner band below the audible range
pub const EQ_LOW_CORNER_HZ: f32 = 20.0;

/// Dummy corner band above the audible range
pub const EQ_HIGH_CORNER_HZ: f32 = 20000.0;

/// Band gain range accepted by the filter bank, in dB
pub const EQ_MIN_GAIN_DB: f32 = -24.0;
pub const EQ_MAX_GAIN_DB: f32 = 12.0;

/// Map a slider value (-100..=100) to a band gain in dB.
///
/// Cuts are scaled twice as hard as boosts so that the full slider range
/// covers -24 dB..+12 dB.
pub fn slider_to_gain_db(value: i32) -> f32 {
    let value = value as f32;
    if value < 0.0 {
        value * 0.24
    } else {
        value * 0.12
    }
}

/// Map a preamp slider value (-100..=100) to a linear gain (0.0..=2.0)
pub fn preamp_to_linear(preamp: i32) -> f32 {
    (preamp + 100) as f32 * 0.01
}

/// Single filter band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub frequency: f32,
    pub bandwidth: f32,
    pub gain_db: f32,
}

impl Band {
    pub fn new(frequency: f32, bandwidth: f32) -> Self {
        Self {
            frequency,
            bandwidth,
            gain_db: 0.0,
        }
    }

    /// A dummy corner band: zero bandwidth, never filters
    pub fn corner(frequency: f32) -> Self {
        Self::new(frequency, 0.0)
    }

    /// Q factor derived from the band's bandwidth
    pub fn q(&self) -> f32 {
        if self.bandwidth <= 0.0 {
            0.0
        } else {
            self.frequency / self.bandwidth
        }
    }
}

/// Complete filter-bank configuration (corners included)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqConfig {
    pub bands: [Band; EQ_FILTER_BANDS],
}

impl Default for EqConfig {
    fn default() -> Self {
        let mut last_frequency = 0.0;
        let bands = core::array::from_fn(|i| match i {
            0 => Band::corner(EQ_LOW_CORNER_HZ),
            i if i == EQ_FILTER_BANDS - 1 => Band::corner(EQ_HIGH_CORNER_HZ),
            i => {
                let frequency = EQ_BANDS[i - 1];
                let band = Band::new(frequency, frequency - last_frequency);
                last_frequency = frequency;
                band
            }
        });

        Self { bands }
    }
}

impl EqConfig {
    /// Set gain for a user band (0-9)
    pub fn set_band_gain(&mut self, band_index: usize, gain_db: f32) -> DspResult<()> {
        if band_index >= EQ_BAND_COUNT {
            return Err(DspError::InvalidBandIndex(band_index));
        }
        self.bands[band_index + 1].gain_db = gain_db.clamp(EQ_MIN_GAIN_DB, EQ_MAX_GAIN_DB);
        Ok(())
    }

    /// Set all user bands from slider values
    pub fn set_slider_gains(&mut self, sliders: &[i32; EQ_BAND_COUNT]) {
        for (i, value) in sliders.iter().enumerate() {
            self.bands[i + 1].gain_db = slider_to_gain_db(*value).clamp(EQ_MIN_GAIN_DB, EQ_MAX_GAIN_DB);
        }
    }

    /// User band gains in dB
    pub fn gains(&self) -> [f32; EQ_BAND_COUNT] {
        core::array::from_fn(|i| self.bands[i + 1].gain_db)
    }

    /// Whether every band is at 0 dB
    pub fn is_flat(&self) -> bool {
        self.bands.iter().all(|b| b.gain_db == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_flat() {
        let config = EqConfig::default();
        assert!(config.is_flat());
        assert_eq!(config.gains(), [0.0; EQ_BAND_COUNT]);
    }

    #[test]
    fn test_corner_bands_are_dummies() {
        let config = EqConfig::default();
        assert_eq!(config.bands[0].frequency, 20.0);
        assert_eq!(config.bands[0].bandwidth, 0.0);
        assert_eq!(config.bands[11].frequency, 20000.0);
        assert_eq!(config.bands[11].bandwidth, 0.0);
    }

    #[test]
    fn test_user_band_bandwidths() {
        let config = EqConfig::default();
        assert_eq!(config.bands[1].frequency, 60.0);
        assert_eq!(config.bands[1].bandwidth, 60.0);
        assert_eq!(config.bands[2].bandwidth, 110.0);
        assert_eq!(config.bands[5].bandwidth, 400.0);
        assert_eq!(config.bands[10].frequency, 16000.0);
        assert_eq!(config.bands[10].bandwidth, 2000.0);
    }

    #[test]
    fn test_slider_mapping() {
        assert_eq!(slider_to_gain_db(0), 0.0);
        assert!((slider_to_gain_db(100) - 12.0).abs() < 1e-4);
        assert!((slider_to_gain_db(-100) + 24.0).abs() < 1e-4);
        assert!((slider_to_gain_db(-50) + 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_preamp_mapping() {
        assert_eq!(preamp_to_linear(0), 1.0);
        assert_eq!(preamp_to_linear(-100), 0.0);
        assert_eq!(preamp_to_linear(100), 2.0);
    }

    #[test]
    fn test_gain_clamping() {
        let mut config = EqConfig::default();
        config.set_band_gain(0, 100.0).unwrap();
        assert_eq!(config.gains()[0], EQ_MAX_GAIN_DB);

        config.set_band_gain(0, -100.0).unwrap();
        assert_eq!(config.gains()[0], EQ_MIN_GAIN_DB);
    }

    #[test]
    fn test_invalid_band_index() {
        let mut config = EqConfig::default();
        assert!(config.set_band_gain(10, 0.0).is_err());
        assert!(config.set_band_gain(100, 0.0).is_err());
    }
}
