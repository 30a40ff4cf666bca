//! Dynamic time warping between a target and a query trace.
//!
//! Both traces are standardised, compared sample by sample with a squared
//! difference, and aligned by dynamic programming. Non-diagonal steps are
//! scaled by `step_penalty`, which biases the path toward proportional
//! warps.

use ndarray::{Array2, ArrayView1};

use super::types::{AnalysisError, AnalysisResult, WarpPath};

/// Default penalty on horizontal and vertical steps.
pub const DEFAULT_STEP_PENALTY: f64 = 1.05;

/// Weight applied to the first row and last column of the local cost.
const BOUNDARY_WEIGHT: f64 = 0.25;

/// Align `query` to `target`.
pub fn dtw(
    target: ArrayView1<f64>,
    query: ArrayView1<f64>,
    step_penalty: f64,
) -> AnalysisResult<WarpPath> {
    if target.is_empty() || query.is_empty() {
        return Err(AnalysisError::EmptyInput(
            "DTW needs two non-empty traces".to_string(),
        ));
    }
    if !step_penalty.is_finite() || step_penalty <= 0.0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "Step penalty must be positive, got {}",
            step_penalty
        )));
    }

    let x = standardize(target);
    let r = standardize(query);
    let n = x.len();
    let m = r.len();

    let mut d = Array2::from_shape_fn((n, m), |(i, j)| (x[i] - r[j]).powi(2));
    d.row_mut(0).mapv_inplace(|v| v * BOUNDARY_WEIGHT);
    d.column_mut(m - 1).mapv_inplace(|v| v * BOUNDARY_WEIGHT);

    let mut acc = Array2::<f64>::zeros((n, m));
    acc[[0, 0]] = d[[0, 0]];
    for i in 1..n {
        acc[[i, 0]] = d[[i, 0]] + acc[[i - 1, 0]];
    }
    for j in 1..m {
        acc[[0, j]] = d[[0, j]] + acc[[0, j - 1]];
    }
    for i in 1..n {
        for j in 1..m {
            let step = (step_penalty * acc[[i - 1, j]])
                .min(acc[[i - 1, j - 1]])
                .min(step_penalty * acc[[i, j - 1]]);
            acc[[i, j]] = d[[i, j]] + step;
        }
    }

    let total_distance = acc[[n - 1, m - 1]];
    let path = backtrace(&acc);
    tracing::debug!(n, m, total_distance, steps = path.len(), "dtw aligned");

    Ok(WarpPath {
        distance_matrix: acc,
        total_distance,
        path,
    })
}

/// Walk from the last cell to (0, 0). Ties prefer up, then left, then
/// diagonal.
fn backtrace(acc: &Array2<f64>) -> Vec<(usize, usize)> {
    let (n, m) = acc.dim();
    let (mut i, mut j) = (n - 1, m - 1);
    let mut path = vec![(i, j)];

    while i + j != 0 {
        if i == 0 {
            j -= 1;
        } else if j == 0 {
            i -= 1;
        } else {
            let up = acc[[i - 1, j]];
            let left = acc[[i, j - 1]];
            let diag = acc[[i - 1, j - 1]];
            if up <= left && up <= diag {
                i -= 1;
            } else if left <= diag {
                j -= 1;
            } else {
                i -= 1;
                j -= 1;
            }
        }
        path.push((i, j));
    }
    path
}

/// Remove the mean and scale to unit population standard deviation.
/// A constant trace is only demeaned.
fn standardize(values: ArrayView1<f64>) -> Vec<f64> {
    let n = values.len() as f64;
    let mean = values.sum() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    values
        .iter()
        .map(|v| {
            let centered = v - mean;
            if std > 0.0 {
                centered / std
            } else {
                centered
            }
        })
        .collect()
}
