//! Stacking of aligned correlation functions.

use ndarray::{Array1, ArrayView2, Axis};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::models::StackMethod;

use super::fft::{next_fast_len, FftPlan};
use super::smoothing::moving_average;
use super::types::{AnalysisError, AnalysisResult};

/// Phase-weighted stack parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PwsParams {
    /// Sharpness exponent applied to the phase coherence.
    pub power: f64,
    /// Samples per time unit of the rows.
    pub sampling_rate: f64,
    /// Length of the coherence smoothing window, in time units.
    pub timegate: f64,
}

impl Default for PwsParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            sampling_rate: 20.0,
            timegate: 5.0,
        }
    }
}

impl PwsParams {
    /// Half-width of the smoothing window in samples (at least 1).
    pub fn smoothing_radius(&self) -> usize {
        let radius = (self.timegate * self.sampling_rate / 2.0).round();
        if radius.is_finite() && radius >= 1.0 {
            radius as usize
        } else {
            1
        }
    }
}

/// Reduce a matrix of correlation functions with the chosen method.
pub fn stack(
    matrix: ArrayView2<f64>,
    method: StackMethod,
    pws: &PwsParams,
) -> AnalysisResult<Array1<f64>> {
    match method {
        StackMethod::Linear => linear_stack(matrix),
        StackMethod::PhaseWeighted => phase_weighted_stack(matrix, pws),
    }
}

/// Arithmetic mean of the rows.
pub fn linear_stack(matrix: ArrayView2<f64>) -> AnalysisResult<Array1<f64>> {
    matrix
        .mean_axis(Axis(0))
        .ok_or_else(|| AnalysisError::EmptyInput("Cannot stack zero rows".to_string()))
}

/// Phase-weighted stack (Schimmel & Paulssen, 1997).
///
/// Each sample of the linear stack is scaled by `|mean_k exp(i phi_k)|^power`,
/// the phase coherence of the rows at that sample, smoothed over the time
/// gate. A single row is returned as is.
pub fn phase_weighted_stack(
    matrix: ArrayView2<f64>,
    params: &PwsParams,
) -> AnalysisResult<Array1<f64>> {
    let (rows, cols) = matrix.dim();
    if rows == 0 || cols == 0 {
        return Err(AnalysisError::EmptyInput(format!(
            "Cannot stack a {}x{} matrix",
            rows, cols
        )));
    }
    if rows == 1 {
        return Ok(matrix.row(0).to_owned());
    }
    if !params.power.is_finite() || params.power < 0.0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "PWS power must be non-negative, got {}",
            params.power
        )));
    }

    let plan = FftPlan::new(next_fast_len(cols));
    let mut phasor_sum = vec![Complex64::new(0.0, 0.0); cols];
    for row in matrix.rows() {
        let samples: Vec<f64> = row.iter().copied().collect();
        for (acc, z) in phasor_sum.iter_mut().zip(analytic_signal(&samples, &plan)) {
            *acc += Complex64::from_polar(1.0, z.arg());
        }
    }

    let weights: Vec<f64> = phasor_sum
        .iter()
        .map(|z| (z.norm() / rows as f64).powf(params.power))
        .collect();
    let radius = params.smoothing_radius();
    tracing::debug!(rows, cols, radius, "phase-weighted stack");
    let weights = moving_average(&weights, radius)?;

    let mean = linear_stack(matrix)?;
    Ok(mean * &Array1::from(weights))
}

/// Analytic signal `x + i H(x)` computed on `plan.len()` points and cut
/// back to the input length.
fn analytic_signal(samples: &[f64], plan: &FftPlan) -> Vec<Complex64> {
    let n = samples.len();
    let nfft = plan.len();
    let mut buffer = plan.forward_real(samples);

    // Keep DC and Nyquist, double positive bins, drop negative ones.
    let half = nfft / 2;
    for (k, bin) in buffer.iter_mut().enumerate() {
        if k == 0 || (nfft % 2 == 0 && k == half) {
            continue;
        }
        if k <= (nfft - 1) / 2 {
            *bin *= 2.0;
        } else {
            *bin = Complex64::new(0.0, 0.0);
        }
    }

    plan.inverse_in_place(&mut buffer);
    let scale = 1.0 / nfft as f64;
    buffer.truncate(n);
    buffer.iter_mut().for_each(|z| *z *= scale);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::noise;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn linear_stack_of_identical_rows_is_the_row() {
        let row = array![0.5, -1.0, 2.0, 0.25];
        let matrix = Array2::from_shape_fn((5, 4), |(_, j)| row[j]);
        let stacked = linear_stack(matrix.view()).unwrap();
        for (a, b) in stacked.iter().zip(row.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let matrix = Array2::<f64>::zeros((0, 4));
        assert!(linear_stack(matrix.view()).is_err());
        assert!(phase_weighted_stack(matrix.view(), &PwsParams::default()).is_err());
    }

    #[test]
    fn pws_single_row_is_identity() {
        let matrix = array![[1.0, 2.0, 3.0]];
        let out = phase_weighted_stack(matrix.view(), &PwsParams::default()).unwrap();
        assert_eq!(out, array![1.0, 2.0, 3.0]);
    }

    #[test]
    fn pws_of_identical_rows_is_the_row() {
        let row = noise(64, 9);
        let matrix = Array2::from_shape_fn((4, 64), |(_, j)| row[j]);
        let out = phase_weighted_stack(matrix.view(), &PwsParams::default()).unwrap();
        for (a, b) in out.iter().zip(row.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn pws_suppresses_incoherent_noise() {
        let rows = 12;
        let cols = 200;
        let mut matrix = Array2::zeros((rows, cols));
        for r in 0..rows {
            let n = noise(cols, 100 + r as u64);
            for c in 0..cols {
                matrix[[r, c]] = n[c];
            }
        }
        let params = PwsParams {
            power: 2.0,
            sampling_rate: 1.0,
            timegate: 2.0,
        };
        let linear = linear_stack(matrix.view()).unwrap();
        let pws = phase_weighted_stack(matrix.view(), &params).unwrap();
        let linear_energy: f64 = linear.iter().map(|v| v.abs()).sum();
        let pws_energy: f64 = pws.iter().map(|v| v.abs()).sum();
        assert!(pws_energy < 0.5 * linear_energy);
    }

    #[test]
    fn analytic_signal_of_cosine_has_unit_envelope() {
        let n = 128;
        let x: Vec<f64> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * 8.0 * i as f64 / n as f64).cos())
            .collect();
        let z = analytic_signal(&x, &FftPlan::new(n));
        for (zi, xi) in z.iter().zip(x.iter()) {
            assert_abs_diff_eq!(zi.re, *xi, epsilon = 1e-9);
            assert_abs_diff_eq!(zi.norm(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn timegate_sets_smoothing_radius() {
        assert_eq!(PwsParams::default().smoothing_radius(), 50);
        let tiny = PwsParams {
            timegate: 0.01,
            ..PwsParams::default()
        };
        assert_eq!(tiny.smoothing_radius(), 1);
    }

    #[test]
    fn dispatch_follows_method() {
        let matrix = array![[1.0, 0.0], [3.0, 2.0]];
        let out = stack(matrix.view(), StackMethod::Linear, &PwsParams::default()).unwrap();
        assert_eq!(out, array![2.0, 1.0]);
    }
}
