//! Small robust statistics used around the correlation pipeline.

use ndarray::{Array2, ArrayView1, ArrayView2};

use super::types::{AnalysisError, AnalysisResult};

/// Median of a slice (mean of the two central values for even lengths).
pub fn median(values: &[f64]) -> AnalysisResult<f64> {
    if values.is_empty() {
        return Err(AnalysisError::EmptyInput("Median of an empty slice".to_string()));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    Ok(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Median absolute deviation: `median(|x - median(x)|)`.
pub fn mad(values: ArrayView1<f64>) -> AnalysisResult<f64> {
    let samples: Vec<f64> = values.iter().copied().collect();
    let center = median(&samples)?;
    let deviations: Vec<f64> = samples.iter().map(|x| (x - center).abs()).collect();
    median(&deviations)
}

/// Scale every row to unit absolute maximum. All-zero rows are left as is.
pub fn abs_max(matrix: ArrayView2<f64>) -> Array2<f64> {
    let mut out = matrix.to_owned();
    for mut row in out.rows_mut() {
        let peak = row.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if peak > 0.0 {
            row.mapv_inplace(|v| v / peak);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert!(median(&[]).is_err());
    }

    #[test]
    fn mad_ignores_outlier() {
        let x = array![1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        assert_abs_diff_eq!(mad(x.view()).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn abs_max_scales_rows() {
        let m = array![[1.0, -4.0, 2.0], [0.0, 0.0, 0.0], [0.5, 0.25, 0.0]];
        let out = abs_max(m.view());
        assert_eq!(out.row(0).to_vec(), vec![0.25, -1.0, 0.5]);
        assert_eq!(out.row(1).to_vec(), vec![0.0, 0.0, 0.0]);
        assert_eq!(out.row(2).to_vec(), vec![1.0, 0.5, 0.0]);
    }
}
