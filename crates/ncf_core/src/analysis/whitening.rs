//! Spectral whitening.
//!
//! Flattens the amplitude spectrum inside a frequency band while keeping the
//! phase, so later correlation is driven by timing rather than by the
//! dominant (usually microseismic) energy.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use super::fft::{next_fast_len, FftPlan};
use super::types::{validate_dt, AnalysisError, AnalysisResult, FrequencyBand};

/// Width of each cosine taper, in frequency bins.
pub const TAPER_BINS: usize = 100;

/// Bin layout of a whitening operator for one `nfft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TaperLayout {
    low: usize,
    left: usize,
    right: usize,
    high: usize,
    half: usize,
}

impl TaperLayout {
    fn new(nfft: usize, dt: f64, band: &FrequencyBand) -> AnalysisResult<Self> {
        let half = nfft / 2;
        let df = 1.0 / (nfft as f64 * dt);
        let in_band = |k: &usize| {
            let f = *k as f64 * df;
            f >= band.fmin && f <= band.fmax
        };

        let left = (0..half).find(in_band).ok_or_else(|| {
            AnalysisError::InvalidParameter(format!(
                "No frequency bin in [{}, {}] Hz for Nfft={} and dt={}",
                band.fmin, band.fmax, nfft, dt
            ))
        })?;
        let right = (0..half).rev().find(in_band).unwrap_or(left);

        let low = left.saturating_sub(TAPER_BINS).max(1);
        let high = (right + TAPER_BINS).min(half);

        Ok(Self {
            low,
            left,
            right,
            high,
            half,
        })
    }
}

/// Whiten a single trace between `band.fmin` and `band.fmax`.
///
/// Returns the full `nfft`-bin spectrum with Hermitian symmetry, so its
/// inverse transform is real. `nfft` defaults to the next fast length at or
/// above the trace length.
pub fn whiten(
    signal: ArrayView1<f64>,
    dt: f64,
    band: &FrequencyBand,
    nfft: Option<usize>,
) -> AnalysisResult<Array1<Complex64>> {
    if signal.is_empty() {
        return Err(AnalysisError::EmptyInput("Cannot whiten an empty trace".to_string()));
    }
    validate_dt(dt)?;
    band.validate()?;

    let nfft = nfft.unwrap_or_else(|| next_fast_len(signal.len()));
    let layout = TaperLayout::new(nfft, dt, band)?;
    tracing::debug!(
        nfft,
        low = layout.low,
        left = layout.left,
        right = layout.right,
        high = layout.high,
        "whitening trace"
    );

    let plan = FftPlan::new(nfft);
    let samples: Vec<f64> = signal.iter().copied().collect();
    Ok(Array1::from(whiten_samples(&samples, &plan, &layout)))
}

/// Whiten every row of a batch. Rows are processed in parallel.
pub fn whiten_batch(
    signals: ArrayView2<f64>,
    dt: f64,
    band: &FrequencyBand,
    nfft: Option<usize>,
) -> AnalysisResult<Array2<Complex64>> {
    let (rows, cols) = signals.dim();
    if rows == 0 || cols == 0 {
        return Err(AnalysisError::EmptyInput(format!(
            "Cannot whiten a {}x{} batch",
            rows, cols
        )));
    }
    validate_dt(dt)?;
    band.validate()?;

    let nfft = nfft.unwrap_or_else(|| next_fast_len(cols));
    let layout = TaperLayout::new(nfft, dt, band)?;
    tracing::debug!(rows, nfft, "whitening batch");

    let plan = FftPlan::new(nfft);
    let spectra: Vec<Vec<Complex64>> = (0..rows)
        .into_par_iter()
        .map(|r| {
            let samples: Vec<f64> = signals.row(r).iter().copied().collect();
            whiten_samples(&samples, &plan, &layout)
        })
        .collect();

    let mut out = Array2::from_elem((rows, nfft), Complex64::new(0.0, 0.0));
    for (mut row, spectrum) in out.rows_mut().into_iter().zip(spectra) {
        row.assign(&Array1::from(spectrum));
    }
    Ok(out)
}

fn whiten_samples(samples: &[f64], plan: &FftPlan, layout: &TaperLayout) -> Vec<Complex64> {
    let nfft = plan.len();
    let raw = plan.forward_real(samples);
    let zero = Complex64::new(0.0, 0.0);
    let mut out = vec![zero; nfft];

    let TaperLayout {
        low,
        left,
        right,
        high,
        half,
    } = *layout;

    // Left taper ramps 0 -> 1 and ends on fmin.
    let rise = cosine_ramp(left.saturating_sub(low), PI / 2.0, PI);
    for (k, w) in (low..left).zip(rise) {
        out[k] = unit_phase(raw[k]) * w;
    }
    for k in left..right {
        out[k] = unit_phase(raw[k]);
    }
    let fall = cosine_ramp(high - right, 0.0, PI / 2.0);
    for (k, w) in (right..high).zip(fall) {
        out[k] = unit_phase(raw[k]) * w;
    }

    for k in 1..half {
        out[nfft - k] = out[k].conj();
    }
    if half > 0 && nfft % 2 == 0 {
        out[half] = zero;
    }
    out
}

/// `cos^2` of `count` points spaced evenly over `[start, end]`.
fn cosine_ramp(count: usize, start: f64, end: f64) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start.cos().powi(2)],
        _ => (0..count)
            .map(|i| {
                let x = start + (end - start) * i as f64 / (count - 1) as f64;
                x.cos().powi(2)
            })
            .collect(),
    }
}

/// Unit-magnitude value with the phase of `c` (phase 0 for a zero bin).
fn unit_phase(c: Complex64) -> Complex64 {
    let mag = c.norm();
    if mag > 0.0 {
        c / mag
    } else {
        Complex64::new(1.0, 0.0)
    }
}
