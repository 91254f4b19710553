//! Inverse STFT resynthesis.
//!
//! IFFT -> window -> overlap-add -> divide by the overlap-added squared
//! window. Only `SpectralPoint::value` is used; reassignment fields are
//! analysis-only.
//!
//! Positions whose squared-window sum is below `MIN_WINDOW_SUM` (the first
//! and last few samples, where the Hann window is ~0) are left undivided.

use crate::analysis::SpectralPoint;
use crate::error::Result;
use crate::params::MorphConfig;
use crate::windows::hann_window;
use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner};
use std::sync::Arc;

/// Squared-window sums at or below this are not divided out.
const MIN_WINDOW_SUM: f64 = 1e-8;

/// Overlap-add resynthesizer with a cached inverse plan.
pub struct Synthesizer {
    config: MorphConfig,
    window: Vec<f64>,
    ifft: Arc<dyn ComplexToReal<f64>>,
}

impl Synthesizer {
    pub fn new(config: MorphConfig) -> Result<Self> {
        config.validate()?;
        let window = hann_window(config.window_length);
        let mut planner = RealFftPlanner::<f64>::new();
        let ifft = planner.plan_fft_inverse(config.fft_size);
        Ok(Self {
            config,
            window,
            ifft,
        })
    }

    /// Resynthesize `frames` into `L + (T - 1) * hop` samples.
    pub fn synthesize(&self, frames: &[Vec<SpectralPoint>]) -> Result<Vec<f64>> {
        let window_length = self.config.window_length;
        let hop = self.config.hop();
        let fft_size = self.config.fft_size;
        let out_len = self.config.output_len(frames.len());

        let mut output = vec![0.0_f64; out_len];
        let mut win_sum = vec![0.0_f64; out_len];

        let mut spectrum = self.ifft.make_input_vec();
        let mut frame_out = self.ifft.make_output_vec();
        let mut scratch = self.ifft.make_scratch_vec();

        // realfft inverse does NOT normalize
        let norm = 1.0 / fft_size as f64;

        for (t, points) in frames.iter().enumerate() {
            for (dst, p) in spectrum.iter_mut().zip(points) {
                *dst = p.value;
            }

            // realfft requires DC and Nyquist bins to have zero imaginary part
            spectrum[0] = Complex::new(spectrum[0].re, 0.0);
            let last = spectrum.len() - 1;
            spectrum[last] = Complex::new(spectrum[last].re, 0.0);

            self.ifft
                .process_with_scratch(&mut spectrum, &mut frame_out, &mut scratch)?;

            let start = t * hop;
            for j in 0..window_length {
                let w = self.window[j];
                output[start + j] += frame_out[j] * norm * w;
                win_sum[start + j] += w * w;
            }
        }

        for (s, &w) in output.iter_mut().zip(&win_sum) {
            if w > MIN_WINDOW_SUM {
                *s /= w;
            }
        }

        Ok(output)
    }
}
