//! Amplitude bars for the voice indicator.
//!
//! Mirrors an analyser node: a 1024-point FFT over the most recent samples,
//! magnitudes converted to decibels and scaled to bytes over 512 bins, then
//! folded into four log-spaced bars.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

pub const FFT_SIZE: usize = 1024;
pub const BIN_COUNT: usize = FFT_SIZE / 2;
pub const BAR_COUNT: usize = 4;
pub const MIN_HEIGHT: f32 = 60.0;
pub const MAX_HEIGHT: f32 = 240.0;
/// Below this total byte amplitude every bar rests at [`MIN_HEIGHT`].
pub const SILENCE_THRESHOLD: u32 = 1000;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const SMOOTHING: f32 = 0.8;

/// Sliding-window spectrum analyser.
pub struct Visualizer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
}

impl std::fmt::Debug for Visualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visualizer")
            .field("buffered", &self.samples.len())
            .finish_non_exhaustive()
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        // Blackman window.
        let window = (0..FFT_SIZE)
            .map(|n| {
                let x = 2.0 * std::f32::consts::PI * n as f32 / FFT_SIZE as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();
        Self {
            fft,
            window,
            samples: VecDeque::from(vec![0.0; FFT_SIZE]),
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    /// Feed mono samples in `[-1, 1]`; only the newest [`FFT_SIZE`] are kept.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.samples.extend(samples.iter().copied());
        let excess = self.samples.len().saturating_sub(FFT_SIZE);
        self.samples.drain(..excess);
    }

    /// Byte-scaled magnitude per frequency bin.
    pub fn frequency_bytes(&mut self) -> Vec<u8> {
        let mut buffer: Vec<Complex<f32>> = self
            .samples
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        buffer[..BIN_COUNT]
            .iter()
            .zip(self.smoothed.iter_mut())
            .map(|(c, previous)| {
                let magnitude = c.norm() / FFT_SIZE as f32;
                *previous = SMOOTHING * *previous + (1.0 - SMOOTHING) * magnitude;
                to_byte(*previous)
            })
            .collect()
    }

    /// Current bar heights in pixels.
    pub fn bars(&mut self) -> [f32; BAR_COUNT] {
        bar_heights(&self.frequency_bytes())
    }
}

fn to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

/// Fold byte magnitudes into bar heights.
///
/// Bar `i` averages bins `[n^(i/4), n^((i+1)/4))` where `n` is the bin
/// count, with the first bar starting at bin 0.
pub fn bar_heights(bytes: &[u8]) -> [f32; BAR_COUNT] {
    let total: u32 = bytes.iter().map(|&b| u32::from(b)).sum();
    if total < SILENCE_THRESHOLD {
        return [MIN_HEIGHT; BAR_COUNT];
    }

    let n = bytes.len() as f64;
    let mut edges = [0usize; BAR_COUNT + 1];
    for (i, edge) in edges.iter_mut().enumerate().skip(1) {
        *edge = (n.powf(i as f64 / BAR_COUNT as f64).floor() as usize).min(bytes.len());
    }

    let mut heights = [MIN_HEIGHT; BAR_COUNT];
    for (i, height) in heights.iter_mut().enumerate() {
        let (start, end) = (edges[i], edges[i + 1]);
        let count = end.saturating_sub(start).max(1);
        let sum: u32 = bytes[start.min(end)..end].iter().map(|&b| u32::from(b)).sum();
        let average = sum as f32 / count as f32;
        *height = MIN_HEIGHT + (average / 255.0) * (MAX_HEIGHT - MIN_HEIGHT);
    }
    heights
}
