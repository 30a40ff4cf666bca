//! Local-statistics Wiener filter.
//!
//! Each sample is pulled toward its neighbourhood mean by the ratio of the
//! noise power to the local variance. Neighbourhoods are zero-padded box
//! windows aligned like a `same`-mode convolution: a window of `k` samples
//! covers `k - 1 - (k - 1) / 2` samples before and `(k - 1) / 2` after.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::types::{AnalysisError, AnalysisResult};

/// Filter an image with a `(rows, cols)` window.
///
/// `noise` defaults to the mean local variance over the image.
pub fn wiener2(
    image: ArrayView2<f64>,
    window: (usize, usize),
    noise: Option<f64>,
) -> AnalysisResult<Array2<f64>> {
    let (wr, wc) = window;
    if wr == 0 || wc == 0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "Wiener window must be non-empty, got {}x{}",
            wr, wc
        )));
    }
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Ok(image.to_owned());
    }

    let count = (wr * wc) as f64;
    let sums = BoxSums::new(image, |v| v);
    let squares = BoxSums::new(image, |v| v * v);

    let mut local_mean = Array2::zeros((rows, cols));
    let mut local_var = Array2::zeros((rows, cols));
    for i in 0..rows {
        let (r0, r1) = span(i, wr, rows);
        for j in 0..cols {
            let (c0, c1) = span(j, wc, cols);
            let mean = sums.sum(r0, r1, c0, c1) / count;
            local_mean[[i, j]] = mean;
            local_var[[i, j]] = squares.sum(r0, r1, c0, c1) / count - mean * mean;
        }
    }

    let noise = noise.unwrap_or_else(|| local_var.mean().unwrap_or(0.0));

    Ok(Array2::from_shape_fn((rows, cols), |(i, j)| {
        let mean = local_mean[[i, j]];
        let var = local_var[[i, j]];
        if var <= noise || var == 0.0 {
            mean
        } else {
            mean + (image[[i, j]] - mean) * (1.0 - noise / var)
        }
    }))
}

/// Filter a trace with a window of `window` samples.
pub fn wiener1(
    trace: ArrayView1<f64>,
    window: usize,
    noise: Option<f64>,
) -> AnalysisResult<Array1<f64>> {
    let image = trace.insert_axis(Axis(0));
    let filtered = wiener2(image, (1, window), noise)?;
    Ok(filtered.row(0).to_owned())
}

/// Clipped index range `[start, end)` of the window around `center`.
fn span(center: usize, window: usize, len: usize) -> (usize, usize) {
    let before = window - 1 - (window - 1) / 2;
    let after = (window - 1) / 2;
    (center.saturating_sub(before), (center + after + 1).min(len))
}

/// Summed-area table for O(1) box sums.
struct BoxSums {
    table: Array2<f64>,
}

impl BoxSums {
    fn new(image: ArrayView2<f64>, f: impl Fn(f64) -> f64) -> Self {
        let (rows, cols) = image.dim();
        let mut table = Array2::zeros((rows + 1, cols + 1));
        for i in 0..rows {
            for j in 0..cols {
                table[[i + 1, j + 1]] =
                    f(image[[i, j]]) + table[[i, j + 1]] + table[[i + 1, j]] - table[[i, j]];
            }
        }
        Self { table }
    }

    fn sum(&self, r0: usize, r1: usize, c0: usize, c1: usize) -> f64 {
        self.table[[r1, c1]] - self.table[[r0, c1]] - self.table[[r1, c0]] + self.table[[r0, c0]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn large_noise_returns_zero_padded_local_mean() {
        let x = array![1.0, 2.0, 3.0, 4.0];
        let out = wiener1(x.view(), 3, Some(1e9)).unwrap();
        let expected = [1.0, 2.0, 3.0, 7.0 / 3.0];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_noise_keeps_varying_samples() {
        let image = array![[1.0, 5.0, 2.0], [0.5, -3.0, 4.0], [2.0, 2.5, -1.0]];
        let out = wiener2(image.view(), (3, 3), Some(0.0)).unwrap();
        for (a, b) in out.iter().zip(image.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn unit_window_is_identity() {
        let image = array![[1.0, -2.0], [3.5, 0.0]];
        let out = wiener2(image.view(), (1, 1), None).unwrap();
        for (a, b) in out.iter().zip(image.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn even_window_alignment() {
        assert_eq!(span(5, 4, 20), (3, 7));
        assert_eq!(span(0, 3, 20), (0, 2));
        assert_eq!(span(19, 3, 20), (18, 20));
    }

    #[test]
    fn empty_window_is_rejected() {
        let x = array![1.0, 2.0];
        assert!(matches!(
            wiener1(x.view(), 0, None),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }
}
