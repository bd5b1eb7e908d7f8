//! Sample Format Conversion
//!
//! Buffer consumers get interleaved `i16` samples, converted from whatever
//! raw format the decoder produced with the historical truncating formulas:
//!
//! | Format | Conversion                                     |
//! |--------|------------------------------------------------|
//! | S16LE  | passthrough                                    |
//! | S32LE  | `s >> 16`                                      |
//! | F32LE  | `(s * 32768.0) as i16` (saturating, +1.0 → 32767) |
//! | S24LE  | upper two of the three packed bytes            |
//!
//! Output length is always `floor(bytes / bytes_per_sample / channels)`
//! frames; a trailing partial frame is dropped.

use serde::{Deserialize, Serialize};

/// Raw sample formats that can flow between graph elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    U8,
    S16LE,
    /// Packed 24-bit, three bytes per sample
    S24LE,
    S32LE,
    F32LE,
    F64LE,
}

impl SampleFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "U8",
            SampleFormat::S16LE => "S16LE",
            SampleFormat::S24LE => "S24LE",
            SampleFormat::S32LE => "S32LE",
            SampleFormat::F32LE => "F32LE",
            SampleFormat::F64LE => "F64LE",
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16LE => 2,
            SampleFormat::S24LE => 3,
            SampleFormat::S32LE | SampleFormat::F32LE => 4,
            SampleFormat::F64LE => 8,
        }
    }

    /// Parse a format name; matches on prefix so `"S24LE_32"`-style
    /// variants resolve to their base format
    pub fn parse(name: &str) -> Option<Self> {
        [
            SampleFormat::S16LE,
            SampleFormat::S24LE,
            SampleFormat::S32LE,
            SampleFormat::F32LE,
            SampleFormat::F64LE,
            SampleFormat::U8,
        ]
        .into_iter()
        .find(|f| name.starts_with(f.as_str()))
    }

    /// Whether [`to_s16`] can convert this format
    pub fn is_visualizable(&self) -> bool {
        matches!(
            self,
            SampleFormat::S16LE | SampleFormat::S24LE | SampleFormat::S32LE | SampleFormat::F32LE
        )
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of whole frames in `data`
pub fn frame_count(format: SampleFormat, data_len: usize, channels: usize) -> usize {
    if channels == 0 {
        return 0;
    }
    data_len / format.bytes_per_sample() / channels
}

/// Convert raw bytes to interleaved 16-bit samples for visualization
///
/// Returns `None` for formats the visualization path does not handle.
pub fn to_s16(format: SampleFormat, data: &[u8], channels: usize) -> Option<Vec<i16>> {
    if !format.is_visualizable() {
        return None;
    }

    let bps = format.bytes_per_sample();
    let samples = frame_count(format, data.len(), channels) * channels;
    let chunks = data.chunks_exact(bps).take(samples);

    let out = match format {
        SampleFormat::S16LE => chunks.map(|b| i16::from_le_bytes([b[0], b[1]])).collect(),
        SampleFormat::S32LE => chunks
            .map(|b| (i32::from_le_bytes([b[0], b[1], b[2], b[3]]) >> 16) as i16)
            .collect(),
        // Rust pattern: float-to-int `as` casts saturate, so +1.0 * 32768 lands on i16::MAX
        SampleFormat::F32LE => chunks
            .map(|b| (f32::from_le_bytes([b[0], b[1], b[2], b[3]]) * 32768.0) as i16)
            .collect(),
        SampleFormat::S24LE => chunks.map(|b| i16::from_le_bytes([b[1], b[2]])).collect(),
        SampleFormat::U8 | SampleFormat::F64LE => return None,
    };
    Some(out)
}

/// Serialize 16-bit samples as little-endian bytes
pub fn s16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}
