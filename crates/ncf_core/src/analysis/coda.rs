//! Coda window selection and C3 cross-spectra.

use ndarray::{Array1, ArrayView1};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::fft::FftPlan;
use super::types::{validate_dt, AnalysisError, AnalysisResult};

/// Sample indices of the two coda lobes on a `[-maxlag, maxlag]` lag axis.
///
/// The acausal lobe spans `neg_end..neg_start` (more negative lag first),
/// the causal lobe spans `pos_start..pos_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodaWindow {
    pub neg_end: usize,
    pub neg_start: usize,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl CodaWindow {
    /// Indices in axis order.
    pub fn as_array(&self) -> [usize; 4] {
        [self.neg_end, self.neg_start, self.pos_start, self.pos_end]
    }
}

/// Locate the coda window for a station pair.
///
/// The window starts at the ballistic arrival `distance / vmin` (truncated
/// to whole time units) and lasts `coda_width`.
pub fn coda_window(
    distance: f64,
    vmin: f64,
    maxlag: f64,
    dt: f64,
    coda_width: f64,
) -> AnalysisResult<CodaWindow> {
    validate_dt(dt)?;
    if !vmin.is_finite() || vmin <= 0.0 || !distance.is_finite() || distance < 0.0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "Need distance >= 0 and vmin > 0, got distance={} vmin={}",
            distance, vmin
        )));
    }
    if !coda_width.is_finite() || coda_width < 0.0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "Coda width must be non-negative, got {}",
            coda_width
        )));
    }

    let t_begin = (distance / vmin).trunc();
    let t_end = t_begin + coda_width;
    if t_end > maxlag {
        return Err(AnalysisError::InvalidWindow(format!(
            "Coda window ends at {} past maxlag {}",
            t_end, maxlag
        )));
    }
    if t_begin > maxlag {
        return Err(AnalysisError::InvalidWindow(format!(
            "Coda window starts at {} past maxlag {}",
            t_begin, maxlag
        )));
    }

    let n = (maxlag / dt).round() as i64;
    let axis: Vec<f64> = (-n..=n).map(|i| i as f64 * dt).collect();

    let begin = matching_pair(&axis, t_begin)?;
    let end = matching_pair(&axis, t_end)?;
    Ok(CodaWindow {
        neg_end: end.0,
        neg_start: begin.0,
        pos_start: begin.1,
        pos_end: end.1,
    })
}

/// The two indices with `|lag| == t`, in axis order.
fn matching_pair(axis: &[f64], t: f64) -> AnalysisResult<(usize, usize)> {
    let tol = 1e-9 * t.abs().max(1.0);
    let hits: Vec<usize> = axis
        .iter()
        .enumerate()
        .filter(|(_, lag)| (lag.abs() - t).abs() <= tol)
        .map(|(i, _)| i)
        .collect();
    match hits.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(AnalysisError::InvalidWindow(format!(
            "Lag {} maps to {} axis samples, expected 2",
            t,
            hits.len()
        ))),
    }
}

/// Causal and acausal coda cross-spectra.
#[derive(Debug, Clone)]
pub struct C3Spectra {
    pub causal: Array1<Complex64>,
    pub acausal: Array1<Complex64>,
}

/// Cut both coda lobes from two correlation functions and cross-correlate
/// them in the frequency domain (`conj(S1) * S2`).
///
/// The acausal lobe is time-reversed before the transform.
pub fn c3_spectra(
    ccf1: ArrayView1<f64>,
    ccf2: ArrayView1<f64>,
    nfft: usize,
    window: &CodaWindow,
) -> AnalysisResult<C3Spectra> {
    if ccf1.len() != ccf2.len() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Correlation functions differ in length: {} vs {}",
            ccf1.len(),
            ccf2.len()
        )));
    }
    if nfft == 0 {
        return Err(AnalysisError::InvalidParameter("Nfft must be positive".to_string()));
    }
    let [ne, ns, ps, pe] = window.as_array();
    if ne > ns || ns > ps || ps > pe || pe > ccf1.len() {
        return Err(AnalysisError::InvalidWindow(format!(
            "Window {:?} does not fit a trace of {} samples",
            window.as_array(),
            ccf1.len()
        )));
    }

    let plan = FftPlan::new(nfft);
    let lobes = |ccf: ArrayView1<f64>| {
        let causal: Vec<f64> = ccf.iter().skip(ps).take(pe - ps).copied().collect();
        let acausal: Vec<f64> = ccf.iter().skip(ne).take(ns - ne).rev().copied().collect();
        (plan.forward_real(&causal), plan.forward_real(&acausal))
    };
    let (p1, n1) = lobes(ccf1);
    let (p2, n2) = lobes(ccf2);

    let cross = |a: Vec<Complex64>, b: Vec<Complex64>| -> Array1<Complex64> {
        a.into_iter().zip(b).map(|(x, y)| x.conj() * y).collect()
    };
    Ok(C3Spectra {
        causal: cross(p1, p2),
        acausal: cross(n1, n2),
    })
}
