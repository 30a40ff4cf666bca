//! Correlation-image denoising: truncated SVD plus Wiener filtering.

use nalgebra::{DMatrix, SVD};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::types::{AnalysisError, AnalysisResult};
use super::wiener::{wiener1, wiener2};

/// Window sizes and rank of the denoiser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenoiseParams {
    /// Wiener window along the date (row) axis.
    pub window_date: usize,
    /// Wiener window along the lag (column) axis.
    pub window_lag: usize,
    /// Number of leading singular values kept.
    pub num_singular_values: usize,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self {
            window_date: 5,
            window_lag: 5,
            num_singular_values: 3,
        }
    }
}

/// What to denoise.
#[derive(Debug, Clone, Copy)]
pub enum DenoiseInput<'a> {
    /// Date x lag correlation image.
    Image(ArrayView2<'a, f64>),
    /// Single correlation function.
    Trace(ArrayView1<'a, f64>),
}

/// Denoised counterpart of [`DenoiseInput`].
#[derive(Debug, Clone)]
pub enum Denoised {
    Image(Array2<f64>),
    Trace(Array1<f64>),
}

/// Denoise an image or a single trace.
pub fn denoise(input: DenoiseInput<'_>, params: &DenoiseParams) -> AnalysisResult<Denoised> {
    match input {
        DenoiseInput::Image(image) => denoise_image(image, params).map(Denoised::Image),
        DenoiseInput::Trace(trace) => denoise_trace(trace, params.window_lag).map(Denoised::Trace),
    }
}

/// Rebuild the image from its leading singular components, Wiener-filtering
/// each rank-1 term, then filter the sum once more.
///
/// A rank above `min(rows, cols)` is clamped.
pub fn denoise_image(image: ArrayView2<f64>, params: &DenoiseParams) -> AnalysisResult<Array2<f64>> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Err(AnalysisError::EmptyInput(format!(
            "Cannot denoise a {}x{} image",
            rows, cols
        )));
    }
    let available = rows.min(cols);
    if params.num_singular_values == 0 {
        return Err(AnalysisError::InvalidRank {
            requested: 0,
            available,
        });
    }
    let rank = if params.num_singular_values > available {
        tracing::warn!(
            requested = params.num_singular_values,
            available,
            "clamping singular value count to image rank"
        );
        available
    } else {
        params.num_singular_values
    };
    let window = (params.window_date, params.window_lag);

    let matrix = DMatrix::from_fn(rows, cols, |i, j| image[[i, j]]);
    let svd = SVD::new(matrix, true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return Err(AnalysisError::DegenerateInput(
                "SVD did not return singular vectors".to_string(),
            ))
        }
    };
    let sigma = svd.singular_values;

    let mut order: Vec<usize> = (0..sigma.len()).collect();
    order.sort_by(|&a, &b| {
        sigma[b]
            .partial_cmp(&sigma[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    tracing::debug!(rows, cols, rank, "denoising correlation image");

    let mut accumulated = Array2::<f64>::zeros((rows, cols));
    for &k in order.iter().take(rank) {
        let s = sigma[k];
        let component = Array2::from_shape_fn((rows, cols), |(i, j)| s * u[(i, k)] * v_t[(k, j)]);
        accumulated += &wiener2(component.view(), window, None)?;
    }
    wiener2(accumulated.view(), window, None)
}

/// Wiener-filter a trace, then filter it again with the integrated
/// absolute deviation from the filtered mean as the noise power.
pub fn denoise_trace(trace: ArrayView1<f64>, window_lag: usize) -> AnalysisResult<Array1<f64>> {
    if trace.is_empty() {
        return Err(AnalysisError::EmptyInput("Cannot denoise an empty trace".to_string()));
    }
    let filtered = wiener1(trace, window_lag, None)?;
    let bias = trace_bias(trace, filtered.view());
    tracing::debug!(len = trace.len(), bias, "denoising trace");
    wiener1(trace, window_lag, Some(bias))
}

/// Integrated absolute deviation of `trace` from the mean of `filtered`.
fn trace_bias(trace: ArrayView1<f64>, filtered: ArrayView1<f64>) -> f64 {
    let level = filtered.mean().unwrap_or(0.0);
    let deviation: Vec<f64> = trace.iter().map(|x| (level - x).abs()).collect();
    trapezoid(&deviation)
}

/// Trapezoidal integral with unit spacing.
fn trapezoid(values: &[f64]) -> f64 {
    values.windows(2).map(|w| (w[0] + w[1]) / 2.0).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::noise;
    use approx::assert_abs_diff_eq;

    fn wavelet(j: usize, n: usize) -> f64 {
        let t = j as f64 - (n / 2) as f64;
        (-(t / 20.0).powi(2)).exp() * (t * 0.15).cos()
    }

    #[test]
    fn huge_rank_is_clamped() {
        let image = Array2::from_shape_fn((6, 8), |(i, j)| ((i * 8 + j) as f64).sin());
        let params = DenoiseParams {
            window_date: 3,
            window_lag: 3,
            num_singular_values: 1_000_000,
        };
        let out = denoise_image(image.view(), &params).unwrap();
        assert_eq!(out.dim(), (6, 8));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_rank_is_rejected() {
        let image = Array2::<f64>::ones((4, 4));
        let params = DenoiseParams {
            num_singular_values: 0,
            ..DenoiseParams::default()
        };
        assert!(matches!(
            denoise_image(image.view(), &params),
            Err(AnalysisError::InvalidRank { requested: 0, available: 4 })
        ));
    }

    #[test]
    fn constant_image_keeps_interior() {
        let image = Array2::from_elem((20, 20), 2.0);
        let params = DenoiseParams {
            window_date: 3,
            window_lag: 3,
            num_singular_values: 1,
        };
        let out = denoise_image(image.view(), &params).unwrap();
        for i in 4..16 {
            for j in 4..16 {
                assert_abs_diff_eq!(out[[i, j]], 2.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn low_rank_signal_is_recovered_from_noise() {
        let (dates, lags) = (20, 101);
        let clean = Array2::from_shape_fn((dates, lags), |(_, j)| wavelet(j, lags));
        let jitter = noise(dates * lags, 42);
        let noisy = Array2::from_shape_fn((dates, lags), |(i, j)| {
            clean[[i, j]] + 0.2 * jitter[i * lags + j]
        });
        let params = DenoiseParams {
            window_date: 3,
            window_lag: 3,
            num_singular_values: 1,
        };
        let out = denoise_image(noisy.view(), &params).unwrap();

        let rms = |a: &Array2<f64>| {
            let mut sum = 0.0;
            let mut count = 0.0;
            for i in 3..dates - 3 {
                for j in 0..lags {
                    sum += (a[[i, j]] - clean[[i, j]]).powi(2);
                    count += 1.0;
                }
            }
            (sum / count).sqrt()
        };
        assert!(rms(&out) < 0.5 * rms(&noisy));
    }

    #[test]
    fn constant_trace_keeps_interior() {
        let trace = Array1::from_elem(50, 3.0);
        let out = denoise_trace(trace.view(), 5).unwrap();
        for i in 5..45 {
            assert_abs_diff_eq!(out[i], 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn noisy_trace_second_pass_uses_integrated_bias() {
        let n = 80;
        let jitter = noise(n, 7);
        let trace = Array1::from_shape_fn(n, |i| (i as f64 * 0.2).sin() + 0.3 * jitter[i]);
        let window = 5;

        let first = wiener1(trace.view(), window, None).unwrap();
        let level = first.sum() / n as f64;
        let mut bias = 0.0;
        for i in 1..n {
            bias += ((level - trace[i - 1]).abs() + (level - trace[i]).abs()) / 2.0;
        }
        assert_abs_diff_eq!(trace_bias(trace.view(), first.view()), bias, epsilon = 1e-9);

        let out = denoise_trace(trace.view(), window).unwrap();
        let expected = wiener1(trace.view(), window, Some(bias)).unwrap();
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
        // a single default pass keeps more of the local detail
        let differs = out
            .iter()
            .zip(first.iter())
            .any(|(a, b)| (a - b).abs() > 1e-6);
        assert!(differs);
    }

    #[test]
    fn dispatch_matches_input_kind() {
        let image = Array2::from_shape_fn((5, 7), |(i, j)| (i + j) as f64);
        let trace = Array1::from_shape_fn(30, |i| (i as f64 * 0.3).sin());
        let params = DenoiseParams::default();

        match denoise(DenoiseInput::Image(image.view()), &params).unwrap() {
            Denoised::Image(out) => assert_eq!(out.dim(), (5, 7)),
            Denoised::Trace(_) => panic!("expected image"),
        }
        match denoise(DenoiseInput::Trace(trace.view()), &params).unwrap() {
            Denoised::Trace(out) => assert_eq!(out.len(), 30),
            Denoised::Image(_) => panic!("expected trace"),
        }
    }

    #[test]
    fn trapezoid_integrates_with_unit_spacing() {
        assert_abs_diff_eq!(trapezoid(&[0.0, 1.0, 2.0]), 2.0, epsilon = 1e-12);
        assert_eq!(trapezoid(&[5.0]), 0.0);
    }
}
