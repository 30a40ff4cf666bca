//! Frequency-domain correlation engine.
//!
//! Spectra come in as produced by the whitener (`nfft` bins, only the
//! positive half `0..nfft/2` is read). The cross-spectrum is normalized per
//! [`NormalizationMethod`], made Hermitian with a zero DC bin, inverted,
//! re-centered so lag 0 sits at `nfft/2`, and trimmed to `[-maxlag, maxlag]`.
//!
//! [`correlate_stacked`] averages many windows in the spectral domain and
//! inverts once. Because the inverse transform is linear this equals the
//! mean of the per-window correlations, provided every window shares `nfft`
//! and the lag convention.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::models::NormalizationMethod;

use super::fft::{hermitian_from_half, lag_window, FftPlan};
use super::smoothing::moving_average;
use super::types::{
    validate_dt, AnalysisError, AnalysisResult, Correlation, CorrelationMatrix,
};

/// Smoothing radius for the receiver amplitude in stacked coherence.
pub const STACKED_COHERENCE_RADIUS: usize = 10;

/// Parameters shared by every correlation entry point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationParams {
    /// Largest lag to keep, in time units.
    pub maxlag: f64,
    /// Sampling interval in time units.
    pub dt: f64,
    /// Transform length used to build the spectra.
    pub nfft: usize,
    /// Cross-spectrum normalization.
    pub method: NormalizationMethod,
}

impl CorrelationParams {
    fn validate(&self) -> AnalysisResult<()> {
        validate_dt(self.dt)?;
        if self.nfft < 4 {
            return Err(AnalysisError::InvalidParameter(format!(
                "Nfft must be at least 4, got {}",
                self.nfft
            )));
        }
        Ok(())
    }

    fn half(&self) -> usize {
        self.nfft / 2
    }
}

/// Correlate two spectra.
pub fn correlate(
    spec1: ArrayView1<Complex64>,
    spec2: ArrayView1<Complex64>,
    params: &CorrelationParams,
) -> AnalysisResult<Correlation> {
    params.validate()?;
    if spec1.len() != spec2.len() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Spectra differ in length: {} vs {}",
            spec1.len(),
            spec2.len()
        )));
    }
    check_spectrum_len(spec1.len(), params)?;
    let (start, end, lags) = lag_window(params.nfft, params.dt, params.maxlag)?;

    let plan = FftPlan::new(params.nfft);
    let s1: Vec<Complex64> = spec1.iter().copied().collect();
    let s2: Vec<Complex64> = spec2.iter().copied().collect();
    let values = correlate_half(&s1, &s2, params, &plan)?;

    Ok(Correlation {
        values: Array1::from(values[start..end].to_vec()),
        lags: Array1::from(lags),
    })
}

/// Correlate many spectrum pairs (row `i` of `spec1` with row `i` of
/// `spec2`). Rows are processed in parallel and share one lag axis.
pub fn correlate_batch(
    spec1: ArrayView2<Complex64>,
    spec2: ArrayView2<Complex64>,
    params: &CorrelationParams,
) -> AnalysisResult<CorrelationMatrix> {
    params.validate()?;
    if spec1.dim() != spec2.dim() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Spectrum batches differ: {:?} vs {:?}",
            spec1.dim(),
            spec2.dim()
        )));
    }
    let rows = spec1.nrows();
    if rows == 0 {
        return Err(AnalysisError::EmptyInput("No spectra to correlate".to_string()));
    }
    check_spectrum_len(spec1.ncols(), params)?;
    let (start, end, lags) = lag_window(params.nfft, params.dt, params.maxlag)?;
    tracing::debug!(rows, nfft = params.nfft, method = %params.method, "correlating batch");

    let plan = FftPlan::new(params.nfft);
    let traces: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|r| {
            let s1: Vec<Complex64> = spec1.row(r).iter().copied().collect();
            let s2: Vec<Complex64> = spec2.row(r).iter().copied().collect();
            correlate_half(&s1, &s2, params, &plan).map(|full| full[start..end].to_vec())
        })
        .collect::<AnalysisResult<_>>()?;

    let mut values = Array2::zeros((rows, end - start));
    for (mut row, trace) in values.rows_mut().into_iter().zip(traces) {
        row.assign(&Array1::from(trace));
    }
    Ok(CorrelationMatrix {
        values,
        lags: Array1::from(lags),
    })
}

/// Source-side factor of the cross-spectrum: `conj(spec1)` divided by the
/// smoothed amplitude (`coherence`) or power (`deconv`) of spec1.
///
/// Computing this once per source and reusing it across receivers is what
/// [`correlate_stacked`] expects as its first argument.
pub fn prepare_source(
    spec1: ArrayView2<Complex64>,
    params: &CorrelationParams,
) -> AnalysisResult<Array2<Complex64>> {
    params.validate()?;
    check_spectrum_len(spec1.ncols(), params)?;
    let half = params.half();

    let mut out = Array2::from_elem((spec1.nrows(), half), Complex64::new(0.0, 0.0));
    for (r, mut row) in out.rows_mut().into_iter().enumerate() {
        let s1: Vec<Complex64> = spec1.row(r).iter().take(half).copied().collect();
        row.assign(&Array1::from(normalized_source(&s1, params.method)?));
    }
    Ok(out)
}

/// Stack many windows in the spectral domain and invert once.
///
/// `source` holds pre-normalized source factors of `nfft/2` bins (see
/// [`prepare_source`]), either one row shared by every receiver window or
/// one row per window. Receivers are full `nfft`-bin spectra.
/// For `coherence` each product is further divided by the smoothed receiver
/// amplitude (radius [`STACKED_COHERENCE_RADIUS`]); other methods apply no
/// receiver-side normalization.
pub fn correlate_stacked(
    source: ArrayView2<Complex64>,
    receivers: ArrayView2<Complex64>,
    params: &CorrelationParams,
) -> AnalysisResult<Correlation> {
    params.validate()?;
    let windows = receivers.nrows();
    if windows == 0 {
        return Err(AnalysisError::EmptyInput("No receiver windows to stack".to_string()));
    }
    if source.nrows() != 1 && source.nrows() != windows {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Source has {} rows, expected 1 or {}",
            source.nrows(),
            windows
        )));
    }
    let half = params.half();
    if source.ncols() != half {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Source factors have {} bins, expected Nfft/2 = {}",
            source.ncols(),
            half
        )));
    }
    check_spectrum_len(receivers.ncols(), params)?;
    let (start, end, lags) = lag_window(params.nfft, params.dt, params.maxlag)?;

    let mut stacked = vec![Complex64::new(0.0, 0.0); half];
    for w in 0..windows {
        let src = source.row(if source.nrows() == 1 { 0 } else { w });
        let recv = receivers.row(w);
        let mut product: Vec<Complex64> = (0..half).map(|k| src[k] * recv[k]).collect();

        if let NormalizationMethod::Coherence { .. } = params.method {
            let recv_half: Vec<Complex64> = recv.iter().take(half).copied().collect();
            let amplitude: Vec<f64> = recv_half.iter().map(|c| c.norm()).collect();
            let smoothed = moving_average(&amplitude, STACKED_COHERENCE_RADIUS)?;
            for (p, s) in product.iter_mut().zip(smoothed) {
                *p /= s;
            }
        }

        for (acc, p) in stacked.iter_mut().zip(product) {
            *acc += p;
        }
    }
    let scale = 1.0 / windows as f64;
    for acc in stacked.iter_mut() {
        *acc *= scale;
    }

    let spectrum = hermitian_from_half(&stacked, params.nfft);
    let full = FftPlan::new(params.nfft).inverse_real_centered(spectrum);
    Ok(Correlation {
        values: Array1::from(full[start..end].to_vec()),
        lags: Array1::from(lags),
    })
}

/// Full-length, re-centered correlation of one spectrum pair.
fn correlate_half(
    s1: &[Complex64],
    s2: &[Complex64],
    params: &CorrelationParams,
    plan: &FftPlan,
) -> AnalysisResult<Vec<f64>> {
    let half = params.half();
    let cross = cross_spectrum(&s1[..half], &s2[..half], params.method)?;
    Ok(plan.inverse_real_centered(hermitian_from_half(&cross, params.nfft)))
}

/// Normalized positive-frequency cross-spectrum.
pub(crate) fn cross_spectrum(
    s1: &[Complex64],
    s2: &[Complex64],
    method: NormalizationMethod,
) -> AnalysisResult<Vec<Complex64>> {
    let mut cross: Vec<Complex64> = normalized_source(s1, method)?
        .into_iter()
        .zip(s2)
        .map(|(a, b)| a * b)
        .collect();

    if let NormalizationMethod::Coherence { radius } = method {
        divide_by_smoothed(&mut cross, s2, radius, 1)?;
    }
    Ok(cross)
}

fn normalized_source(s1: &[Complex64], method: NormalizationMethod) -> AnalysisResult<Vec<Complex64>> {
    let mut out: Vec<Complex64> = s1.iter().map(|c| c.conj()).collect();
    match method {
        NormalizationMethod::Deconv { radius } => divide_by_smoothed(&mut out, s1, radius, 2)?,
        NormalizationMethod::Coherence { radius } => divide_by_smoothed(&mut out, s1, radius, 1)?,
        NormalizationMethod::CrossCorrelation | NormalizationMethod::Raw => {}
    }
    Ok(out)
}

/// Divide `target[k]` by `smooth(|reference|)^power` wherever `reference[k]`
/// is nonzero. Smoothing runs over the nonzero bins only.
fn divide_by_smoothed(
    target: &mut [Complex64],
    reference: &[Complex64],
    radius: usize,
    power: i32,
) -> AnalysisResult<()> {
    let (indices, amplitudes): (Vec<usize>, Vec<f64>) = reference
        .iter()
        .enumerate()
        .map(|(k, c)| (k, c.norm()))
        .filter(|(_, a)| *a > 0.0)
        .unzip();
    let smoothed = moving_average(&amplitudes, radius)?;
    for (k, s) in indices.into_iter().zip(smoothed) {
        target[k] /= s.powi(power);
    }
    Ok(())
}

/// Spectra must come from a transform of exactly `params.nfft` points.
fn check_spectrum_len(len: usize, params: &CorrelationParams) -> AnalysisResult<()> {
    if len != params.nfft {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Spectrum has {} bins, expected Nfft = {}",
            len, params.nfft
        )));
    }
    Ok(())
}
