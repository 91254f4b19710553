//! Whole-buffer level statistics.
//!
//! Used to report morph output levels and to check that transport keeps
//! overall energy in range.

/// RMS and peak of one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalStats {
    pub rms: f64,
    pub peak: f64,
}

impl SignalStats {
    /// Measure a buffer. An empty buffer reads as silence.
    pub fn measure(audio: &[f64]) -> Self {
        if audio.is_empty() {
            return Self::default();
        }
        let sum_sq: f64 = audio.iter().map(|x| x * x).sum();
        let peak = audio.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        Self {
            rms: (sum_sq / audio.len() as f64).sqrt(),
            peak,
        }
    }

    /// RMS in dBFS; silence reads as negative infinity.
    pub fn rms_db(&self) -> f64 {
        20.0 * self.rms.log10()
    }
}
