//! Frequency-domain snapshot for visualizers.
//!
//! The [`Analyser`](crate::nodes::Analyser) node pushes a mono mix of the
//! amplified signal into a ring buffer; [`AnalyserTap`] drains it on demand and
//! turns the most recent `fft_size` samples into byte magnitudes. The scaling
//! matches what browser visualizers expect from an analyser node: Blackman
//! window, 0.8 temporal smoothing, and -100..-30 dB mapped onto 0..255.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use rtrb::Consumer;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Lowest level shown, in dB. Anything quieter reads as 0.
pub const MIN_DECIBELS: f32 = -100.0;
/// Level that reads as 255.
pub const MAX_DECIBELS: f32 = -30.0;

/// Reader side of the analysis tap. Owned by the control thread.
pub struct AnalyserTap {
    consumer: Consumer<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    smoothing: f32,
    window: Vec<f32>,
    history: VecDeque<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
}

impl AnalyserTap {
    /// `fft_size` must be a power of two; the snapshot has `fft_size / 2` bins.
    pub fn new(consumer: Consumer<f32>, fft_size: usize, smoothing: f32) -> Self {
        let fft_size = fft_size.max(32).next_power_of_two();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);

        Self {
            consumer,
            fft,
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            window: blackman_window(fft_size),
            history: VecDeque::from(vec![0.0; fft_size]),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
            bytes: vec![0; fft_size / 2],
        }
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    #[inline]
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Pull whatever the graph produced since the last call and return the
    /// current byte spectrum. Cheap enough to call once per display frame.
    pub fn snapshot(&mut self) -> &[u8] {
        self.drain();

        for ((slot, &sample), &w) in self.scratch.iter_mut().zip(self.history.iter()).zip(self.window.iter()) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        let tau = self.smoothing;

        for ((bin, smoothed), byte) in self.scratch.iter().zip(self.smoothed.iter_mut()).zip(self.bytes.iter_mut()) {
            let magnitude = bin.norm() * norm;
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };

            *byte = if *smoothed <= 0.0 {
                0
            } else {
                let db = 20.0 * smoothed.log10();
                (255.0 / range * (db - MIN_DECIBELS)).floor().clamp(0.0, 255.0) as u8
            };
        }

        &self.bytes
    }

    fn drain(&mut self) {
        while let Ok(sample) = self.consumer.pop() {
            if self.history.len() == self.fft_size {
                self.history.pop_front();
            }
            self.history.push_back(sample);
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}
