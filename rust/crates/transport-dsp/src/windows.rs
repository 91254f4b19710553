//! Analysis windows for reassigned STFT.
//!
//! Three windows of the same length share one hop:
//!   magnitude      -- periodic Hann, `sin^2(pi i / L)`
//!   time-weighted  -- `(i / sr) * hann[i]`, probes local group delay
//!   derivative     -- `d/dt hann`, probes instantaneous frequency

use std::f64::consts::PI;

/// Fixed-length window set used by analysis and synthesis.
#[derive(Debug, Clone)]
pub struct WindowBank {
    pub hann: Vec<f64>,
    pub time_weighted: Vec<f64>,
    pub derivative: Vec<f64>,
}

impl WindowBank {
    pub fn new(length: usize, sample_rate: f64) -> Self {
        let hann = hann_window(length);
        let time_weighted = hann
            .iter()
            .enumerate()
            .map(|(i, &w)| i as f64 / sample_rate * w)
            .collect();
        Self {
            hann,
            time_weighted,
            derivative: derivative_hann(length, sample_rate),
        }
    }

    pub fn len(&self) -> usize {
        self.hann.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hann.is_empty()
    }
}

pub fn hann_window(length: usize) -> Vec<f64> {
    (0..length)
        .map(|i| (PI * i as f64 / length as f64).sin().powi(2))
        .collect()
}

/// Time derivative of `hann_window`, with `t = i / sr`.
///
/// Uses `2 sin(x) cos(x) = sin(2x)`.
fn derivative_hann(length: usize, sample_rate: f64) -> Vec<f64> {
    (0..length)
        .map(|i| {
            PI * sample_rate * (2.0 * PI * i as f64 / length as f64).sin() / length as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let w = hann_window(1024);
        assert_eq!(w.len(), 1024);
        assert!(w[0].abs() < 1e-12); // starts at 0
        assert!((w[512] - 1.0).abs() < 1e-12); // peak at middle
        // periodic: symmetric about the middle
        assert!((w[100] - w[924]).abs() < 1e-12);
    }

    #[test]
    fn test_time_weighted_ramp() {
        let sr = 48000.0;
        let bank = WindowBank::new(64, sr);
        assert_eq!(bank.len(), 64);
        assert_eq!(bank.time_weighted[0], 0.0);
        assert!((bank.time_weighted[32] - 32.0 / sr).abs() < 1e-15);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let sr = 48000.0;
        let len = 256;
        let bank = WindowBank::new(len, sr);
        for i in [10, 64, 100, 200] {
            let dt = 1.0 / sr;
            let t = i as f64 * dt;
            let h = |t: f64| (PI * t * sr / len as f64).sin().powi(2);
            let numeric = (h(t + 1e-3 * dt) - h(t - 1e-3 * dt)) / (2e-3 * dt);
            let rel = (bank.derivative[i] - numeric).abs() / numeric.abs().max(1.0);
            assert!(rel < 1e-5, "bin {i}: {} vs {}", bank.derivative[i], numeric);
        }
    }
}
