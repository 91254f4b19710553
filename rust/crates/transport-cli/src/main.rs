//! CLI front end for the transport morph engine.
//!
//! Usage: transport-cli <source.wav> <target.wav> <output> [-k K] [--steps N]
//!
//! Reads two mono WAVs, wraps the shorter one until the lengths match,
//! then writes either one morph at factor `k` or, with `--steps`, a sweep
//! of evenly spaced factors rendered in parallel from one shared analysis.

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;
use transport_dsp::{MorphConfig, MorphEngine, SignalStats};

#[derive(Parser)]
#[command(name = "transport-cli", about = "Optimal-transport morph between two WAV files")]
struct Cli {
    /// Source WAV (k = 0)
    source: PathBuf,

    /// Target WAV (k = 1)
    target: PathBuf,

    /// Output WAV file, or output directory with --steps
    output: PathBuf,

    /// Morph factor; values outside [0, 1] extrapolate
    #[arg(short = 'k', long = "factor", default_value_t = 0.5, allow_hyphen_values = true)]
    factor: f64,

    /// Render this many evenly spaced factors from 0 to 1
    #[arg(long)]
    steps: Option<usize>,

    /// JSON config (sparse OK, missing keys get defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of worker threads for --steps (0 = auto)
    #[arg(long, default_value_t = 0)]
    workers: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.workers)
            .build_global()
            .context("failed to configure worker pool")?;
    }

    let config = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            MorphConfig::from_json(&json)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => MorphConfig::default(),
    };

    let (mut source, sr_source) = load_wav(&cli.source)?;
    let (mut target, sr_target) = load_wav(&cli.target)?;
    ensure!(
        sr_source == sr_target,
        "sample rates differ: {} Hz vs {} Hz",
        sr_source,
        sr_target
    );
    equalize_lengths(&mut source, &mut target);

    let engine = MorphEngine::new(config.with_sample_rate(sr_source as f64))?;
    info!(
        samples = source.len(),
        sample_rate = sr_source,
        seconds = source.len() as f64 / sr_source as f64,
        fft_size = engine.config().fft_size,
        window_length = engine.config().window_length,
        "inputs loaded"
    );

    let start = Instant::now();
    match cli.steps {
        Some(steps) => render_sweep(&engine, &source, &target, steps, &cli.output, sr_source)?,
        None => {
            let out = engine.morph(&source, &target, cli.factor)?;
            write_wav(&cli.output, &out, sr_source)?;
            report(&cli.output, cli.factor, &out);
        }
    }
    info!(elapsed = ?start.elapsed(), "done");
    Ok(())
}

fn render_sweep(
    engine: &MorphEngine,
    source: &[f64],
    target: &[f64],
    steps: usize,
    out_dir: &Path,
    sr: u32,
) -> Result<()> {
    ensure!(steps >= 2, "--steps needs at least 2 factors, got {steps}");
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let pair = engine.prepare(source, target)?;
    info!(steps, frames = pair.num_frames(), "rendering sweep");

    sweep_factors(steps)
        .par_iter()
        .try_for_each(|&k| -> Result<()> {
            let out = pair.morph(k)?;
            let path = out_dir.join(format!("morph_k{k:.3}.wav"));
            write_wav(&path, &out, sr)?;
            report(&path, k, &out);
            Ok(())
        })
}

fn report(path: &Path, k: f64, out: &[f64]) {
    let stats = SignalStats::measure(out);
    info!(
        path = %path.display(),
        k,
        samples = out.len(),
        rms_db = stats.rms_db(),
        peak = stats.peak,
        "written"
    );
}

/// `steps` factors evenly spaced over `[0, 1]`, endpoints included.
fn sweep_factors(steps: usize) -> Vec<f64> {
    let last = steps.saturating_sub(1).max(1) as f64;
    (0..steps).map(|i| i as f64 / last).collect()
}

// ---------------------------------------------------------------------------
// Length equalization
// ---------------------------------------------------------------------------

/// Extend `audio` to `len` samples by repeating it from the start.
fn wrap_pad(audio: &[f64], len: usize) -> Vec<f64> {
    audio.iter().copied().cycle().take(len.max(audio.len())).collect()
}

/// Wrap-pad the shorter of the two buffers to the longer one's length.
fn equalize_lengths(a: &mut Vec<f64>, b: &mut Vec<f64>) {
    if a.len() < b.len() {
        *a = wrap_pad(a, b.len());
    } else if b.len() < a.len() {
        *b = wrap_pad(b, a.len());
    }
}

// ---------------------------------------------------------------------------
// WAV I/O
// ---------------------------------------------------------------------------

fn load_wav(path: &Path) -> Result<(Vec<f64>, u32)> {
    let reader =
        WavReader::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        bail!(
            "{} has {} channels; only mono input is supported",
            path.display(),
            spec.channels
        );
    }

    let samples: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<std::result::Result<Vec<f64>, hound::Error>>()?,
        SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_val))
                .collect::<std::result::Result<Vec<f64>, hound::Error>>()?
        }
    };
    ensure!(!samples.is_empty(), "{} contains no samples", path.display());

    Ok((samples, spec.sample_rate))
}

fn write_wav(path: &Path, samples: &[f64], sr: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: sr,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &s in samples {
        writer.write_sample(s as f32)?;
    }
    writer.finalize()?;
    Ok(())
}
