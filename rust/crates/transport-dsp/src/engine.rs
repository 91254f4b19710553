//! Morph request orchestration.
//!
//! Signal chain per request:
//!     analyze(A), analyze(B)            (cached in a `MorphPair`)
//!     for each frame, strictly in order:
//!         group masses (A, B) -> transport plan -> interpolate (phase state)
//!     synthesize
//!
//! Frames cannot be reordered or run in parallel: each one reads the phase
//! state the previous one wrote.

use crate::analysis::{Analysis, SpectralAnalyzer, SpectralPoint};
use crate::error::{MorphError, Result};
use crate::interpolate::{FrameInterpolator, FrameSide, PhaseState};
use crate::masses::group_spectrum;
use crate::params::MorphConfig;
use crate::synthesis::Synthesizer;
use crate::transport::transport_plan;
use std::sync::Arc;

/// Analysis/synthesis engine for one fixed configuration.
///
/// FFT plans are built once here and shared by every request; the engine
/// is `Send + Sync`.
pub struct MorphEngine {
    config: MorphConfig,
    analyzer: SpectralAnalyzer,
    synthesizer: Synthesizer,
}

impl MorphEngine {
    pub fn new(config: MorphConfig) -> Result<Self> {
        Ok(Self {
            analyzer: SpectralAnalyzer::new(config.clone())?,
            synthesizer: Synthesizer::new(config.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &MorphConfig {
        &self.config
    }

    /// Reassigned analysis of one waveform.
    pub fn analyze(&self, audio: &[f64]) -> Result<Analysis> {
        self.analyzer.analyze(audio)
    }

    /// Analyze both waveforms (concurrently) and cache them as a pair.
    pub fn prepare(&self, a: &[f64], b: &[f64]) -> Result<MorphPair<'_>> {
        let (analysis_a, analysis_b) = rayon::join(|| self.analyze(a), || self.analyze(b));
        self.pair(Arc::new(analysis_a?), Arc::new(analysis_b?))
    }

    /// Pair two existing analyses, checking that their shapes agree.
    pub fn pair(&self, a: Arc<Analysis>, b: Arc<Analysis>) -> Result<MorphPair<'_>> {
        check_shapes(&a, &b)?;
        Ok(MorphPair { engine: self, a, b })
    }

    /// Morph `a` toward `b` by factor `k`.
    ///
    /// `k` outside `[0, 1]` extrapolates.
    pub fn morph(&self, a: &[f64], b: &[f64], k: f64) -> Result<Vec<f64>> {
        self.prepare(a, b)?.morph(k)
    }

    /// Morph two precomputed analyses.
    pub fn morph_analyses(&self, a: &Analysis, b: &Analysis, k: f64) -> Result<Vec<f64>> {
        let frames = self.interpolate_frames(a, b, k)?;
        self.synthesizer.synthesize(&frames)
    }

    /// Run the frame loop without resynthesis.
    pub fn interpolate_frames(
        &self,
        a: &Analysis,
        b: &Analysis,
        k: f64,
    ) -> Result<Vec<Vec<SpectralPoint>>> {
        check_shapes(a, b)?;
        tracing::debug!(
            frames = a.num_frames(),
            bins = a.num_bins(),
            k,
            "interpolating frames"
        );

        let interpolator = FrameInterpolator::new(self.config.window_length, k);
        let mut phases = PhaseState::new(a.num_bins());

        let frames = a
            .frames()
            .iter()
            .zip(b.frames())
            .enumerate()
            .map(|(t, (x, y))| morph_frame(t, x, y, &interpolator, &mut phases))
            .collect();
        Ok(frames)
    }
}

/// Two analyses cached for repeated morph requests.
///
/// Read-only once built; `morph` may be called from several threads at
/// once, each call with its own phase state.
pub struct MorphPair<'e> {
    engine: &'e MorphEngine,
    a: Arc<Analysis>,
    b: Arc<Analysis>,
}

impl MorphPair<'_> {
    pub fn morph(&self, k: f64) -> Result<Vec<f64>> {
        self.engine.morph_analyses(&self.a, &self.b, k)
    }

    pub fn source(&self) -> &Arc<Analysis> {
        &self.a
    }

    pub fn target(&self) -> &Arc<Analysis> {
        &self.b
    }

    pub fn num_frames(&self) -> usize {
        self.a.num_frames()
    }
}

fn check_shapes(a: &Analysis, b: &Analysis) -> Result<()> {
    if a.num_frames() != b.num_frames() || a.num_bins() != b.num_bins() {
        return Err(MorphError::InputLengthMismatch {
            frames_a: a.num_frames(),
            bins_a: a.num_bins(),
            frames_b: b.num_frames(),
            bins_b: b.num_bins(),
        });
    }
    Ok(())
}

fn morph_frame(
    t: usize,
    x: &[SpectralPoint],
    y: &[SpectralPoint],
    interpolator: &FrameInterpolator,
    phases: &mut PhaseState,
) -> Vec<SpectralPoint> {
    let masses_x = group_spectrum(x);
    let masses_y = group_spectrum(y);
    let plan = transport_plan(&masses_x, &masses_y);
    tracing::trace!(
        frame = t,
        masses_x = masses_x.len(),
        masses_y = masses_y.len(),
        transfers = plan.len(),
        "frame coupled"
    );

    interpolator.interpolate(
        FrameSide {
            points: x,
            masses: &masses_x,
        },
        FrameSide {
            points: y,
            masses: &masses_y,
        },
        &plan,
        phases,
    )
}
