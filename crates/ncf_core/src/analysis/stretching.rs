//! Stretching estimator for relative velocity change.
//!
//! A bank of stretched copies of the reference is built once; each
//! observation is then compared against every row with a Pearson
//! coefficient and the best-matching stretch factor is reported.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use super::coda::CodaWindow;
use super::interpolation::CubicSpline;
use super::types::{argmax, AnalysisError, AnalysisResult, DvvMeasurement, StretchBank};

/// Resample `reference` on a time axis scaled by `factor` about its center.
///
/// Sample `k` reads the reference at `(k - n/2) / factor + n/2`.
pub fn stretch_trace(reference: ArrayView1<f64>, factor: f64) -> Array1<f64> {
    let samples: Vec<f64> = reference.iter().copied().collect();
    let spline = CubicSpline::new(&samples);
    stretch_with(&spline, factor)
}

fn stretch_with(spline: &CubicSpline, factor: f64) -> Array1<f64> {
    let n = spline.len();
    let center = (n / 2) as f64;
    (0..n)
        .map(|k| spline.eval((k as f64 - center) / factor + center))
        .collect()
}

/// Build `nstr` stretched references with factors spaced linearly over
/// `[1 - str_range, 1 + str_range]`.
pub fn build_stretch_bank(
    reference: ArrayView1<f64>,
    str_range: f64,
    nstr: usize,
) -> AnalysisResult<StretchBank> {
    validate_grid(str_range, nstr)?;
    if reference.is_empty() {
        return Err(AnalysisError::EmptyInput("Reference trace is empty".to_string()));
    }

    let factors = Array1::linspace(1.0 - str_range, 1.0 + str_range, nstr);
    let samples: Vec<f64> = reference.iter().copied().collect();
    let spline = CubicSpline::new(&samples);

    let rows: Vec<Array1<f64>> = factors
        .as_slice()
        .unwrap_or(&[])
        .par_iter()
        .map(|&s| stretch_with(&spline, s))
        .collect();

    let mut traces = Array2::zeros((nstr, reference.len()));
    for (mut dst, row) in traces.rows_mut().into_iter().zip(rows) {
        dst.assign(&row);
    }
    Ok(StretchBank { traces, factors })
}

/// Pearson coefficient of every row of `matrix` against `y`.
///
/// Rows (or `y`) with zero variance get coefficient 0.
pub fn vcorrcoef(matrix: ArrayView2<f64>, y: ArrayView1<f64>) -> AnalysisResult<Array1<f64>> {
    if matrix.ncols() != y.len() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Rows have {} samples, vector has {}",
            matrix.ncols(),
            y.len()
        )));
    }
    if y.is_empty() {
        return Err(AnalysisError::EmptyInput("Cannot correlate empty traces".to_string()));
    }

    let ym = y.sum() / y.len() as f64;
    let yc = y.mapv(|v| v - ym);
    let y_ss = yc.dot(&yc);

    Ok(matrix
        .rows()
        .into_iter()
        .map(|row| {
            let xm = row.sum() / row.len() as f64;
            let (num, x_ss) = row
                .iter()
                .zip(yc.iter())
                .fold((0.0, 0.0), |(num, ss), (&x, &yv)| {
                    let xc = x - xm;
                    (num + xc * yv, ss + xc * xc)
                });
            let den = (x_ss * y_ss).sqrt();
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        })
        .collect())
}

/// Measure every observation row against `reference`.
pub fn stretch(
    observations: ArrayView2<f64>,
    reference: ArrayView1<f64>,
    str_range: f64,
    nstr: usize,
) -> AnalysisResult<Vec<DvvMeasurement>> {
    check_lengths(observations, reference)?;
    let bank = build_stretch_bank(reference, str_range, nstr)?;
    tracing::debug!(
        rows = observations.nrows(),
        nstr,
        step = bank.step(),
        "stretching observations"
    );

    (0..observations.nrows())
        .into_par_iter()
        .map(|r| measure(bank.traces.view(), &bank.factors, observations.row(r), r))
        .collect()
}

/// Like [`stretch`], but the coefficients only compare samples inside the
/// two lobes of `window`. The reference is still stretched as a whole.
pub fn stretch_in_window(
    observations: ArrayView2<f64>,
    reference: ArrayView1<f64>,
    str_range: f64,
    nstr: usize,
    window: &CodaWindow,
) -> AnalysisResult<Vec<DvvMeasurement>> {
    check_lengths(observations, reference)?;
    let [ne, ns, ps, pe] = window.as_array();
    if ne > ns || ns > ps || ps > pe || pe > reference.len() || (ne == ns && ps == pe) {
        return Err(AnalysisError::InvalidWindow(format!(
            "Window {:?} does not select samples of a {}-sample trace",
            window.as_array(),
            reference.len()
        )));
    }
    let columns: Vec<usize> = (ne..ns).chain(ps..pe).collect();

    let bank = build_stretch_bank(reference, str_range, nstr)?;
    let traces = bank.traces.select(Axis(1), &columns);
    let selected = observations.select(Axis(1), &columns);
    tracing::debug!(
        rows = observations.nrows(),
        nstr,
        samples = columns.len(),
        "stretching coda window"
    );

    (0..selected.nrows())
        .into_par_iter()
        .map(|r| measure(traces.view(), &bank.factors, selected.row(r), r))
        .collect()
}

fn check_lengths(observations: ArrayView2<f64>, reference: ArrayView1<f64>) -> AnalysisResult<()> {
    if observations.ncols() != reference.len() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "Observations have {} samples, reference has {}",
            observations.ncols(),
            reference.len()
        )));
    }
    Ok(())
}

fn measure(
    traces: ArrayView2<f64>,
    factors: &Array1<f64>,
    observation: ArrayView1<f64>,
    row: usize,
) -> AnalysisResult<DvvMeasurement> {
    let coefficients = vcorrcoef(traces, observation)?;
    let best = argmax(coefficients.iter().copied()).ok_or_else(|| {
        AnalysisError::EmptyInput("Stretch bank has no rows".to_string())
    })?;

    let error = half_width(coefficients.as_slice().unwrap_or(&[]), best);
    if error.is_none() {
        tracing::warn!(
            row,
            index = best,
            "stretching peak has no interior half-maximum width"
        );
    }

    Ok(DvvMeasurement {
        delta: factors[best],
        coefficient: coefficients[best],
        error,
    })
}

/// Half the full width at half maximum of `curve`, in index units.
///
/// The curve is first shifted so its minimum is non-negative. Returns
/// `None` when the peak is on the boundary, the curve has no positive
/// maximum, or no sample on either side of the peak exceeds half maximum.
fn half_width(curve: &[f64], peak: usize) -> Option<f64> {
    if curve.is_empty() || peak == 0 || peak + 1 == curve.len() {
        return None;
    }
    let min = curve.iter().copied().fold(f64::INFINITY, f64::min);
    let shift = (-min).max(0.0);
    let shifted: Vec<f64> = curve.iter().map(|c| c + shift).collect();
    let half_max = shifted[peak] / 2.0;
    if half_max.is_nan() || half_max <= 0.0 {
        return None;
    }

    let left = shifted.iter().position(|&v| v > half_max)?;
    let right = shifted.iter().rposition(|&v| v > half_max)?;
    if left >= peak || right <= peak {
        return None;
    }
    Some((right - left) as f64 / 2.0)
}

fn validate_grid(str_range: f64, nstr: usize) -> AnalysisResult<()> {
    if nstr < 2 {
        return Err(AnalysisError::InvalidRank {
            requested: nstr,
            available: 2,
        });
    }
    if str_range.is_nan() || str_range <= 0.0 || str_range >= 1.0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "Stretch range must lie in (0, 1), got {}",
            str_range
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// Gaussian-windowed oscillation centered on the trace.
    fn wavelet(n: usize) -> Array1<f64> {
        let center = (n / 2) as f64;
        (0..n)
            .map(|i| {
                let t = i as f64 - center;
                (-(t / 40.0).powi(2)).exp() * (t * 0.3).cos()
            })
            .collect()
    }

    #[test]
    fn unit_factor_is_identity() {
        let reference = wavelet(101);
        let out = stretch_trace(reference.view(), 1.0);
        for (a, b) in out.iter().zip(reference.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn bank_factors_are_symmetric_and_increasing() {
        let bank = build_stretch_bank(wavelet(64).view(), 0.05, 11).unwrap();
        assert_eq!(bank.traces.dim(), (11, 64));
        assert_abs_diff_eq!(bank.factors[0], 0.95, epsilon = 1e-12);
        assert_abs_diff_eq!(bank.factors[5], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bank.factors[10], 1.05, epsilon = 1e-12);
        assert!(bank.factors.windows(2).into_iter().all(|w| w[1] > w[0]));
        assert_abs_diff_eq!(bank.step(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn recovers_known_stretch() {
        let reference = wavelet(401);
        let stretched = stretch_trace(reference.view(), 1.02);
        let observations = stretched.insert_axis(ndarray::Axis(0));

        let result = stretch(observations.view(), reference.view(), 0.05, 101).unwrap();
        assert_eq!(result.len(), 1);
        let m = result[0];
        assert!((m.delta - 1.02).abs() <= 0.001 + 1e-9, "delta {}", m.delta);
        assert!(m.coefficient > 0.999);
        assert!(m.error.is_some());
    }

    #[test]
    fn vcorrcoef_matches_pearson() {
        let matrix = array![[1.0, 2.0, 3.0], [3.0, 2.0, 1.0], [1.0, 1.0, 1.0]];
        let y = array![2.0, 4.0, 6.0];
        let cc = vcorrcoef(matrix.view(), y.view()).unwrap();
        assert_abs_diff_eq!(cc[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cc[1], -1.0, epsilon = 1e-12);
        assert_eq!(cc[2], 0.0);
    }

    #[test]
    fn boundary_peak_has_no_error() {
        assert_eq!(half_width(&[1.0, 0.5, 0.2], 0), None);
        assert_eq!(half_width(&[0.0, 0.0, 0.0], 1), None);
        // shifted: [0, 1.2, 2, 1.2, 0] -> above 1.0 at indices 1..=3
        assert_eq!(half_width(&[-0.5, 0.7, 1.5, 0.7, -0.5], 2), Some(1.0));
    }

    #[test]
    fn isolated_spike_has_no_error() {
        // neighbours sit below half maximum on both sides
        assert_eq!(half_width(&[0.0, 0.1, 1.0, 0.1, 0.0], 2), None);
        // one-sided width is still undefined
        assert_eq!(half_width(&[0.0, 0.8, 1.0, 0.1, 0.0], 2), None);
    }

    #[test]
    fn invalid_grid_is_rejected() {
        let reference = wavelet(32);
        assert!(matches!(
            build_stretch_bank(reference.view(), 0.05, 1),
            Err(AnalysisError::InvalidRank { .. })
        ));
        assert!(matches!(
            build_stretch_bank(reference.view(), 1.5, 11),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn windowed_stretch_recovers_known_stretch() {
        let reference = wavelet(401);
        let stretched = stretch_trace(reference.view(), 0.985);
        let observations = stretched.insert_axis(ndarray::Axis(0));
        let window = CodaWindow {
            neg_end: 100,
            neg_start: 180,
            pos_start: 221,
            pos_end: 301,
        };

        let result =
            stretch_in_window(observations.view(), reference.view(), 0.05, 101, &window).unwrap();
        assert!((result[0].delta - 0.985).abs() <= 0.001 + 1e-9);
        assert!(result[0].coefficient > 0.999);
    }

    #[test]
    fn windowed_stretch_rejects_window_past_trace() {
        let reference = wavelet(50);
        let observations = Array2::<f64>::zeros((1, 50));
        let window = CodaWindow {
            neg_end: 0,
            neg_start: 10,
            pos_start: 40,
            pos_end: 60,
        };
        assert!(matches!(
            stretch_in_window(observations.view(), reference.view(), 0.05, 11, &window),
            Err(AnalysisError::InvalidWindow(_))
        ));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let observations = Array2::<f64>::zeros((2, 10));
        let reference = wavelet(12);
        assert!(matches!(
            stretch(observations.view(), reference.view(), 0.05, 11),
            Err(AnalysisError::ShapeMismatch(_))
        ));
    }
}
