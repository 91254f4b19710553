//! Optimal-transport spectral morphing engine.
//!
//! Morphs between two mono waveforms by coupling their reassigned spectra
//! with an exact 1-D transport plan instead of blending bins in place.
//!
//! Single entry point: `MorphEngine::morph(a, b, k) -> output_audio`
//!
//! Pipeline per request:
//!     analyze(a), analyze(b) -> per frame: group masses -> solve transport
//!         -> interpolate (threads phase state) -> synthesize

pub mod analysis;
pub mod engine;
pub mod error;
pub mod interpolate;
pub mod masses;
pub mod metrics;
pub mod params;
pub mod synthesis;
pub mod transport;
pub mod windows;

pub use analysis::{Analysis, SpectralAnalyzer, SpectralPoint};
pub use engine::{MorphEngine, MorphPair};
pub use error::{MorphError, Result};
pub use interpolate::{interpolate_frame, FrameInterpolator, FrameSide, PhaseState};
pub use masses::{group_spectrum, SpectralMass};
pub use metrics::SignalStats;
pub use params::MorphConfig;
pub use synthesis::Synthesizer;
pub use transport::{transport_plan, Transfer, TransportPlan};
pub use windows::WindowBank;
