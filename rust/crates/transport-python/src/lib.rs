//! Python bindings for the transport morph engine via pyo3.
//!
//! Exposes `morph(a, b, k, config_json) -> output_audio` and
//! `morph_sweep(a, b, factors, config_json) -> [output_audio, ...]`.

use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use transport_dsp::{MorphConfig, MorphEngine};

fn engine_from_json(config_json: &str) -> PyResult<MorphEngine> {
    let config = MorphConfig::from_json(config_json)
        .map_err(|e| PyValueError::new_err(format!("Invalid config JSON: {e}")))?;
    MorphEngine::new(config).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Morph one mono waveform toward another.
///
/// Args:
///     a: 1D numpy array of float64 samples (k = 0)
///     b: 1D numpy array of float64 samples (k = 1), same length as `a`
///     k: morph factor; values outside [0, 1] extrapolate
///     config_json: JSON string of config (sparse OK, missing keys get defaults)
///
/// Returns:
///     1D numpy array of float64 samples
#[pyfunction]
#[pyo3(signature = (a, b, k, config_json="{}"))]
fn morph<'py>(
    py: Python<'py>,
    a: PyReadonlyArray1<'py, f64>,
    b: PyReadonlyArray1<'py, f64>,
    k: f64,
    config_json: &str,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let engine = engine_from_json(config_json)?;
    let output = engine
        .morph(a.as_slice()?, b.as_slice()?, k)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(PyArray1::from_vec(py, output))
}

/// Morph at several factors, analyzing both inputs only once.
///
/// Args:
///     a: 1D numpy array of float64 samples (k = 0)
///     b: 1D numpy array of float64 samples (k = 1), same length as `a`
///     factors: list of morph factors
///     config_json: JSON string of config
///
/// Returns:
///     List of 1D numpy arrays, one per factor
#[pyfunction]
#[pyo3(signature = (a, b, factors, config_json="{}"))]
fn morph_sweep<'py>(
    py: Python<'py>,
    a: PyReadonlyArray1<'py, f64>,
    b: PyReadonlyArray1<'py, f64>,
    factors: Vec<f64>,
    config_json: &str,
) -> PyResult<Vec<Bound<'py, PyArray1<f64>>>> {
    let engine = engine_from_json(config_json)?;
    let pair = engine
        .prepare(a.as_slice()?, b.as_slice()?)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    factors
        .into_iter()
        .map(|k| {
            let output = pair
                .morph(k)
                .map_err(|e| PyValueError::new_err(e.to_string()))?;
            Ok(PyArray1::from_vec(py, output))
        })
        .collect()
}

/// Python module definition.
#[pymodule]
fn transport_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(morph, m)?)?;
    m.add_function(wrap_pyfunction!(morph_sweep, m)?)?;
    Ok(())
}
