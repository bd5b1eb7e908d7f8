//! Sonance DSP - Sample Helpers
//!
//! The sample processing itself runs inside the media graph's elements.
//! This crate keeps what the pipeline computes on its own side:
//! - 10-band equalizer layout (12 filter bands with dummy corners) and the
//!   slider to gain mappings fed to `equalizer-nbands`
//! - The 16-bit visualization converter for buffer consumers
//! - FFT spectrum analyzer for visualization consumers
//! - Equalizer presets

mod convert;
mod eq;
mod error;
mod fft;
mod presets;

pub use convert::{frame_count, s16_to_le_bytes, to_s16, SampleFormat};
pub use eq::{
    preamp_to_linear, slider_to_gain_db, Band, EqConfig, EQ_BANDS, EQ_BAND_COUNT,
    EQ_FILTER_BANDS, EQ_HIGH_CORNER_HZ, EQ_LOW_CORNER_HZ, EQ_MAX_GAIN_DB, EQ_MIN_GAIN_DB,
};
pub use error::{DspError, DspResult};
pub use fft::{SpectrumAnalyzer, FFT_SIZE, NUM_BINS};
pub use presets::{find_preset, Preset, PRESETS};
