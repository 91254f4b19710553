//! Error type for the morph engine.

/// Errors surfaced by the morph engine.
///
/// Everything else that can go wrong inside a frame (silent bins, empty
/// mass sequences, placements past the spectrum edge) is compensated
/// locally and never reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum MorphError {
    /// The two analyses disagree on frame or bin count.
    #[error("input length mismatch: {frames_a}x{bins_a} frames/bins vs {frames_b}x{bins_b}")]
    InputLengthMismatch {
        frames_a: usize,
        bins_a: usize,
        frames_b: usize,
        bins_b: usize,
    },
    /// Construction-time configuration is unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// Configuration JSON could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// The FFT rejected a buffer.
    #[error("fft error: {0}")]
    Fft(#[from] realfft::FftError),
}

/// Result type for morph operations.
pub type Result<T> = std::result::Result<T, MorphError>;
