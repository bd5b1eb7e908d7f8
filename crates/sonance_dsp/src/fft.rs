//! FFT Spectrum Analyzer
//!
//! Turns the 16-bit visualization stream into a small, log-spaced magnitude
//! spectrum. The streaming thread pushes samples; a UI or CLI thread calls
//! [`SpectrumAnalyzer::update`] at its own frame rate and reads the result.
//!
//! ```text
//! streaming thread                      display thread
//!   push_s16() ──▶ ring (mono mix) ──▶ update() ──▶ FFT ──▶ log bins ──▶ spectrum()
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// FFT size (must be power of 2)
/// 2048 samples at 44.1kHz = ~46ms window, ~21Hz resolution
pub const FFT_SIZE: usize = 2048;

/// Number of log-spaced output bins
pub const NUM_BINS: usize = 32;

/// Smoothing factor for spectrum decay (0.0 = instant, 1.0 = no decay)
const SPECTRUM_DECAY: f32 = 0.7;

/// Attack factor for spectrum rise (higher = faster response to new peaks)
const SPECTRUM_ATTACK: f32 = 0.5;

struct SampleRing {
    samples: Vec<f32>,
    write_pos: usize,
}

/// Spectrum analyzer fed with interleaved 16-bit samples
pub struct SpectrumAnalyzer {
    ring: Mutex<SampleRing>,
    samples_since_fft: AtomicUsize,
    samples_per_fft: usize,
    spectrum_ready: AtomicBool,
    spectrum: RwLock<[f32; NUM_BINS]>,
    smoothed: RwLock<[f32; NUM_BINS]>,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Mutex<Vec<Complex<f32>>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer producing roughly `fps` spectra per second
    pub fn new(sample_rate: f32, fps: u32) -> Self {
        let samples_per_fft = (sample_rate / fps.max(1) as f32) as usize;
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);

        // Hann window reduces spectral leakage
        let window = (0..FFT_SIZE)
            .map(|n| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (FFT_SIZE - 1) as f32).cos()))
            .collect();

        Self {
            ring: Mutex::new(SampleRing {
                samples: vec![0.0; FFT_SIZE],
                write_pos: 0,
            }),
            samples_since_fft: AtomicUsize::new(0),
            samples_per_fft: samples_per_fft.max(1),
            spectrum_ready: AtomicBool::new(false),
            spectrum: RwLock::new([0.0; NUM_BINS]),
            smoothed: RwLock::new([0.0; NUM_BINS]),
            window,
            fft,
            scratch: Mutex::new(vec![Complex::new(0.0, 0.0); FFT_SIZE]),
        }
    }

    /// Push interleaved 16-bit samples, mixed down to mono
    pub fn push_s16(&self, samples: &[i16], channels: usize) {
        if channels == 0 {
            return;
        }
        let mut ring = self.ring.lock();
        let mut frames = 0;
        for frame in samples.chunks_exact(channels) {
            let sum: f32 = frame.iter().map(|s| *s as f32 / 32768.0).sum();
            let pos = ring.write_pos;
            ring.samples[pos] = sum / channels as f32;
            ring.write_pos = (pos + 1) % FFT_SIZE;
            frames += 1;
        }
        drop(ring);

        let count = self.samples_since_fft.fetch_add(frames, Ordering::Relaxed) + frames;
        if count >= self.samples_per_fft {
            self.spectrum_ready.store(true, Ordering::Release);
        }
    }

    /// Compute a new spectrum if enough samples arrived
    ///
    /// Returns true if the spectrum was updated.
    pub fn update(&self) -> bool {
        if !self.spectrum_ready.swap(false, Ordering::Acquire) {
            return false;
        }
        self.samples_since_fft.store(0, Ordering::Relaxed);

        let mut scratch = self.scratch.lock();
        {
            let ring = self.ring.lock();
            for (i, slot) in scratch.iter_mut().enumerate() {
                // Oldest sample first
                let sample = ring.samples[(ring.write_pos + i) % FFT_SIZE];
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
        }
        self.fft.process(&mut scratch);

        let mut spectrum = self.spectrum.write();
        compute_log_spectrum(&scratch, &mut spectrum);

        let mut smoothed = self.smoothed.write();
        for (current, raw) in smoothed.iter_mut().zip(spectrum.iter()) {
            if *raw > *current {
                *current += (raw - *current) * SPECTRUM_ATTACK;
            } else {
                *current = *current * SPECTRUM_DECAY + raw * (1.0 - SPECTRUM_DECAY);
            }
        }
        true
    }

    /// Smoothed spectrum, each bin 0.0..=1.0
    pub fn spectrum(&self) -> [f32; NUM_BINS] {
        *self.smoothed.read()
    }

    /// Unsmoothed spectrum from the last update
    pub fn raw_spectrum(&self) -> [f32; NUM_BINS] {
        *self.spectrum.read()
    }

    pub fn reset(&self) {
        {
            let mut ring = self.ring.lock();
            ring.samples.iter_mut().for_each(|s| *s = 0.0);
            ring.write_pos = 0;
        }
        self.samples_since_fft.store(0, Ordering::Relaxed);
        self.spectrum_ready.store(false, Ordering::Relaxed);
        *self.spectrum.write() = [0.0; NUM_BINS];
        *self.smoothed.write() = [0.0; NUM_BINS];
    }
}

/// Convert FFT output to logarithmically-spaced magnitude bins
fn compute_log_spectrum(fft_output: &[Complex<f32>], spectrum: &mut [f32; NUM_BINS]) {
    let nyquist = FFT_SIZE / 2;
    let log_min = 1.0_f32.ln(); // skip DC
    let log_max = (nyquist as f32).ln();
    let log_step = (log_max - log_min) / NUM_BINS as f32;

    // A full-scale sine through a Hann window peaks near FFT_SIZE / 4
    let reference_magnitude = FFT_SIZE as f32 / 4.0;

    for (i, bin) in spectrum.iter_mut().enumerate() {
        let start = (log_min + i as f32 * log_step).exp() as usize;
        let end = ((log_min + (i + 1) as f32 * log_step).exp() as usize + 1).min(nyquist);
        let range = &fft_output[start.min(end)..end];

        let avg = if range.is_empty() {
            0.0
        } else {
            range.iter().map(|c| c.norm()).sum::<f32>() / range.len() as f32
        };

        // Map -60dB..0dB to 0.0..1.0
        let db = 20.0 * (avg / reference_magnitude).max(1e-10).log10();
        *bin = ((db + 60.0) / 60.0).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_s16(freq: f32, sample_rate: f32, frames: usize) -> Vec<i16> {
        (0..frames)
            .flat_map(|i| {
                let s = ((2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin() * 16000.0) as i16;
                [s, s]
            })
            .collect()
    }

    #[test]
    fn test_analyzer_starts_silent() {
        let analyzer = SpectrumAnalyzer::new(44100.0, 30);
        assert!(analyzer.spectrum().iter().all(|b| *b == 0.0));
        assert!(!analyzer.update());
    }

    #[test]
    fn test_spectrum_update() {
        let analyzer = SpectrumAnalyzer::new(44100.0, 30);
        analyzer.push_s16(&sine_s16(1000.0, 44100.0, FFT_SIZE * 2), 2);

        assert!(analyzer.update(), "Spectrum should have been updated");
        assert!(analyzer.raw_spectrum().iter().any(|v| *v > 0.01));
        assert!(analyzer.spectrum().iter().any(|v| *v > 0.0));
    }

    #[test]
    fn test_reset() {
        let analyzer = SpectrumAnalyzer::new(44100.0, 30);
        analyzer.push_s16(&sine_s16(440.0, 44100.0, FFT_SIZE), 2);
        analyzer.update();
        analyzer.reset();
        assert!(analyzer.spectrum().iter().all(|b| *b == 0.0));
    }

    #[test]
    fn test_zero_channels_ignored() {
        let analyzer = SpectrumAnalyzer::new(44100.0, 30);
        analyzer.push_s16(&[1, 2, 3], 0);
        assert!(!analyzer.update());
    }
}
