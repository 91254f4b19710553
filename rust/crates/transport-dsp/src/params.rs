//! Construction-time configuration for the morph engine.
//!
//! All callers (CLI, Python bindings, library users) share the same
//! `MorphConfig`. Frame geometry is fixed per engine: the hop is always
//! half the analysis window.

use crate::error::{MorphError, Result};
use serde::{Deserialize, Serialize};

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

/// Default FFT size and analysis window length in samples.
pub const DEFAULT_FRAME_SIZE: usize = 1024;

/// Analysis/synthesis geometry.
///
/// Uses `#[serde(default)]` so sparse JSON loads correctly; missing keys
/// get default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MorphConfig {
    /// Sample rate of both input waveforms, in Hz.
    pub sample_rate: f64,
    /// FFT length. Frames shorter than this are zero-padded.
    pub fft_size: usize,
    /// Analysis window length `L`.
    pub window_length: usize,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            fft_size: DEFAULT_FRAME_SIZE,
            window_length: DEFAULT_FRAME_SIZE,
        }
    }
}

impl MorphConfig {
    /// Parse from JSON string. Missing fields get default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Same geometry at a different sample rate.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Reject geometries the analyzer cannot frame.
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(MorphError::InvalidConfig(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.window_length < 2 || self.window_length % 2 != 0 {
            return Err(MorphError::InvalidConfig(format!(
                "window_length must be even and >= 2, got {}",
                self.window_length
            )));
        }
        if self.fft_size < self.window_length {
            return Err(MorphError::InvalidConfig(format!(
                "fft_size ({}) must be >= window_length ({})",
                self.fft_size, self.window_length
            )));
        }
        Ok(())
    }

    /// Frame advance in samples (50% overlap).
    #[inline]
    pub fn hop(&self) -> usize {
        self.window_length / 2
    }

    /// Number of bins per frame, `N = F/2 + 1`.
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Number of complete hop-aligned windows in `len` samples.
    pub fn num_frames(&self, len: usize) -> usize {
        if len >= self.window_length {
            1 + (len - self.window_length) / self.hop()
        } else {
            0
        }
    }

    /// Samples covered by `frames` whole frames.
    pub fn output_len(&self, frames: usize) -> usize {
        if frames == 0 {
            0
        } else {
            self.window_length + (frames - 1) * self.hop()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let c = MorphConfig::default();
        assert_eq!(c.sample_rate, 48000.0);
        assert_eq!(c.fft_size, 1024);
        assert_eq!(c.window_length, 1024);
        assert_eq!(c.hop(), 512);
        assert_eq!(c.num_bins(), 513);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_sparse_json_load() {
        let c = MorphConfig::from_json(r#"{"window_length": 512}"#).unwrap();
        assert_eq!(c.window_length, 512);
        // Missing fields should get defaults
        assert_eq!(c.fft_size, 1024);
        assert_eq!(c.sample_rate, 48000.0);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            MorphConfig::from_json(r#"{"hop": 256}"#),
            Err(MorphError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_geometry() {
        let odd = MorphConfig {
            window_length: 1023,
            ..Default::default()
        };
        assert!(matches!(odd.validate(), Err(MorphError::InvalidConfig(_))));

        let short_fft = MorphConfig {
            fft_size: 512,
            ..Default::default()
        };
        assert!(short_fft.validate().is_err());

        let bad_sr = MorphConfig::default().with_sample_rate(0.0);
        assert!(bad_sr.validate().is_err());
    }

    #[test]
    fn test_frame_counting() {
        let c = MorphConfig {
            fft_size: 8,
            window_length: 8,
            ..Default::default()
        };
        assert_eq!(c.num_frames(7), 0);
        assert_eq!(c.num_frames(8), 1);
        assert_eq!(c.num_frames(11), 1);
        assert_eq!(c.num_frames(12), 2);
        assert_eq!(c.output_len(0), 0);
        assert_eq!(c.output_len(3), 16);
    }
}
