//! Reassigned STFT analysis.
//!
//! Core algorithm: for every hop-aligned frame, three FFTs under the
//! magnitude, time-weighted and derivative windows. Their ratios correct
//! each bin's nominal (time, frequency) toward where the energy actually
//! sits:
//!
//!   time_reassigned = frame_start(t) + Re(Xt * conj(X) / |X|^2)
//!   freq_reassigned = nominal_freq(n) - Im(Xd * conj(X) / |X|^2) / 2pi
//!
//! realfft's forward transform uses `exp(-i w t)`, so the derivative ratio
//! is `-i` times the offset in rad/s from the bin to the energy. Bins below
//! a peak therefore reassign upward and bins above it downward, and every
//! peak shows up as a falling sign change in the mass grouper.
//!
//! Frames are not padded at the edges; a trailing partial window is dropped.

use crate::error::Result;
use crate::params::MorphConfig;
use crate::windows::WindowBank;
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::sync::Arc;

/// Bins with `|X|^2` below this keep their nominal time and frequency.
const SILENT_BIN_NORM_SQR: f64 = 1e-20;

/// One (frame, bin) cell of a reassigned spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPoint {
    pub value: Complex<f64>,
    /// Nominal frame center time in seconds.
    pub time: f64,
    /// Nominal bin frequency.
    pub freq: f64,
    pub time_reassigned: f64,
    pub freq_reassigned: f64,
}

impl SpectralPoint {
    /// Point sitting exactly at its nominal location.
    pub fn new(value: Complex<f64>, time: f64, freq: f64) -> Self {
        Self {
            value,
            time,
            freq,
            time_reassigned: time,
            freq_reassigned: freq,
        }
    }

    /// Zero-valued point at a nominal location.
    pub fn silent(time: f64, freq: f64) -> Self {
        Self::new(Complex::new(0.0, 0.0), time, freq)
    }
}

/// Materialized analysis of one waveform: `T` frames of `N` points each.
///
/// Immutable once built, so one analysis can back any number of
/// concurrent morph requests.
#[derive(Debug, Clone)]
pub struct Analysis {
    frames: Vec<Vec<SpectralPoint>>,
    num_bins: usize,
}

impl Analysis {
    pub fn new(frames: Vec<Vec<SpectralPoint>>, num_bins: usize) -> Self {
        debug_assert!(frames.iter().all(|f| f.len() == num_bins));
        Self { frames, num_bins }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn frames(&self) -> &[Vec<SpectralPoint>] {
        &self.frames
    }

    pub fn frame(&self, t: usize) -> &[SpectralPoint] {
        &self.frames[t]
    }

    pub fn into_frames(self) -> Vec<Vec<SpectralPoint>> {
        self.frames
    }
}

/// Center time of frame `t` in seconds.
#[inline]
pub fn center_time(t: usize, window_length: usize, sample_rate: f64) -> f64 {
    (1 + 2 * t) as f64 * window_length as f64 / (4.0 * sample_rate)
}

/// Nominal frequency of bin `n` out of `num_bins`.
#[inline]
pub fn nominal_freq(n: usize, num_bins: usize, sample_rate: f64) -> f64 {
    n as f64 * sample_rate / (2 * num_bins) as f64
}

/// Reassigned STFT analyzer with a cached forward plan.
pub struct SpectralAnalyzer {
    config: MorphConfig,
    windows: WindowBank,
    fft: Arc<dyn RealToComplex<f64>>,
}

impl SpectralAnalyzer {
    pub fn new(config: MorphConfig) -> Result<Self> {
        config.validate()?;
        let windows = WindowBank::new(config.window_length, config.sample_rate);
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        Ok(Self {
            config,
            windows,
            fft,
        })
    }

    pub fn config(&self) -> &MorphConfig {
        &self.config
    }

    /// Analyze one waveform into `T x N` reassigned points.
    pub fn analyze(&self, audio: &[f64]) -> Result<Analysis> {
        let window_length = self.config.window_length;
        let hop = self.config.hop();
        let sr = self.config.sample_rate;
        let n_bins = self.config.num_bins();
        let n_frames = self.config.num_frames(audio.len());

        let freqs: Vec<f64> = (0..n_bins).map(|n| nominal_freq(n, n_bins, sr)).collect();

        let mut fft_input = self.fft.make_input_vec();
        let mut scratch = self.fft.make_scratch_vec();
        let mut spec = self.fft.make_output_vec();
        let mut spec_time = self.fft.make_output_vec();
        let mut spec_deriv = self.fft.make_output_vec();

        let mut frames = Vec::with_capacity(n_frames);
        for t in 0..n_frames {
            let start = t * hop;
            let frame = &audio[start..start + window_length];

            self.windowed_fft(frame, &self.windows.hann, &mut fft_input, &mut spec, &mut scratch)?;
            self.windowed_fft(
                frame,
                &self.windows.time_weighted,
                &mut fft_input,
                &mut spec_time,
                &mut scratch,
            )?;
            self.windowed_fft(
                frame,
                &self.windows.derivative,
                &mut fft_input,
                &mut spec_deriv,
                &mut scratch,
            )?;

            let time = center_time(t, window_length, sr);
            let frame_start = start as f64 / sr;
            let points = (0..n_bins)
                .map(|n| {
                    let point = SpectralPoint::new(spec[n], time, freqs[n]);
                    reassign(point, spec_time[n], spec_deriv[n], frame_start)
                })
                .collect();
            frames.push(points);
        }

        tracing::trace!(frames = n_frames, bins = n_bins, "analysis complete");
        Ok(Analysis::new(frames, n_bins))
    }

    fn windowed_fft(
        &self,
        frame: &[f64],
        window: &[f64],
        fft_input: &mut [f64],
        spectrum: &mut [Complex<f64>],
        scratch: &mut [Complex<f64>],
    ) -> Result<()> {
        let (head, tail) = fft_input.split_at_mut(frame.len());
        for ((dst, &s), &w) in head.iter_mut().zip(frame).zip(window) {
            *dst = s * w;
        }
        tail.fill(0.0);
        self.fft.process_with_scratch(fft_input, spectrum, scratch)?;
        Ok(())
    }
}

/// Move `point` toward the energy its bin actually holds.
///
/// `frame_start` is the time of the frame's first sample; the time-weighted
/// window measures from there.
fn reassign(
    point: SpectralPoint,
    x_time: Complex<f64>,
    x_deriv: Complex<f64>,
    frame_start: f64,
) -> SpectralPoint {
    let x = point.value;
    let norm = x.norm_sqr();
    if norm < SILENT_BIN_NORM_SQR {
        return point;
    }
    let conj_over_norm = x.conj() / norm;
    SpectralPoint {
        time_reassigned: frame_start + (x_time * conj_over_norm).re,
        freq_reassigned: point.freq - (x_deriv * conj_over_norm).im / (2.0 * PI),
        ..point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sr: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sr).sin())
            .collect()
    }

    #[test]
    fn test_frame_and_bin_counts() {
        let analyzer = SpectralAnalyzer::new(MorphConfig::default()).unwrap();
        let a = analyzer.analyze(&vec![0.1; 4096]).unwrap();
        assert_eq!(a.num_frames(), 7);
        assert_eq!(a.num_bins(), 513);
        assert!(a.frames().iter().all(|f| f.len() == 513));
    }

    #[test]
    fn test_short_input_has_no_frames() {
        let analyzer = SpectralAnalyzer::new(MorphConfig::default()).unwrap();
        let a = analyzer.analyze(&vec![0.5; 1000]).unwrap();
        assert_eq!(a.num_frames(), 0);
        assert_eq!(a.num_bins(), 513);
    }

    #[test]
    fn test_silent_bins_keep_nominal_location() {
        let analyzer = SpectralAnalyzer::new(MorphConfig::default()).unwrap();
        let a = analyzer.analyze(&vec![0.0; 2048]).unwrap();
        for (t, frame) in a.frames().iter().enumerate() {
            for (n, p) in frame.iter().enumerate() {
                assert_eq!(p.value, Complex::new(0.0, 0.0));
                assert_eq!(p.time, center_time(t, 1024, 48000.0));
                assert_eq!(p.freq, nominal_freq(n, 513, 48000.0));
                assert_eq!(p.time_reassigned, p.time);
                assert_eq!(p.freq_reassigned, p.freq);
            }
        }
    }

    #[test]
    fn test_nominal_grid() {
        assert!((center_time(0, 1024, 48000.0) - 1024.0 / 192000.0).abs() < 1e-15);
        assert!((center_time(3, 1024, 48000.0) - 7.0 * 1024.0 / 192000.0).abs() < 1e-15);
        assert_eq!(nominal_freq(0, 513, 48000.0), 0.0);
        assert!((nominal_freq(513, 513, 48000.0) - 24000.0).abs() < 1e-9);
    }

    #[test]
    fn test_tone_peaks_at_expected_bin() {
        let sr = 48000.0;
        let analyzer = SpectralAnalyzer::new(MorphConfig::default()).unwrap();
        // bin 32 of a 1024-point FFT at 48 kHz
        let a = analyzer.analyze(&sine(1500.0, sr, 4096)).unwrap();
        for frame in a.frames() {
            let peak = frame
                .iter()
                .enumerate()
                .max_by(|x, y| x.1.value.norm().total_cmp(&y.1.value.norm()))
                .map(|(n, _)| n)
                .unwrap();
            assert_eq!(peak, 32);
            assert!(frame.iter().all(|p| p.freq_reassigned.is_finite()));
            assert!(frame.iter().all(|p| p.time_reassigned.is_finite()));
        }
    }

    #[test]
    fn test_reassignment_converges_on_tone() {
        let sr = 48000.0;
        let analyzer = SpectralAnalyzer::new(MorphConfig::default()).unwrap();
        // 440 Hz sits between bins 9 and 10
        let a = analyzer.analyze(&sine(440.0, sr, 4096)).unwrap();
        for t in 0..a.num_frames() {
            let frame = a.frame(t);
            for n in 8..=11 {
                let p = &frame[n];
                assert!(
                    (p.freq_reassigned - 440.0).abs() < 2.0,
                    "frame {t} bin {n}: {} Hz",
                    p.freq_reassigned
                );
            }
            // below the tone points up, above it points down
            assert!(frame[9].freq_reassigned > frame[9].freq);
            assert!(frame[10].freq_reassigned < frame[10].freq);

            // a stationary tone's energy sits at the window center
            let window_center = (t * 512 + 512) as f64 / sr;
            for n in [9, 10] {
                assert!((frame[n].time_reassigned - window_center).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_tone_forms_one_mass_around_its_peak() {
        let analyzer = SpectralAnalyzer::new(MorphConfig::default()).unwrap();
        let a = analyzer.analyze(&sine(440.0, 48000.0, 4096)).unwrap();
        for frame in a.frames() {
            let masses = crate::masses::group_spectrum(frame);
            let dominant = masses
                .iter()
                .max_by(|x, y| x.mass.total_cmp(&y.mass))
                .unwrap();
            assert_eq!(dominant.center_bin, 9);
            assert!(dominant.left_bin <= 8 && dominant.right_bin >= 12);
            assert!(dominant.mass > 0.99);
        }
    }

    #[test]
    fn test_fft_size_larger_than_window() {
        let config = MorphConfig {
            fft_size: 2048,
            window_length: 1024,
            ..Default::default()
        };
        let analyzer = SpectralAnalyzer::new(config).unwrap();
        let a = analyzer.analyze(&sine(440.0, 48000.0, 4096)).unwrap();
        assert_eq!(a.num_frames(), 7);
        assert_eq!(a.num_bins(), 1025);
    }
}
