//! Running-mean smoothing used by every spectral normalization.

use super::types::{AnalysisError, AnalysisResult};

/// Smooth `values` with a centered running mean of width `2 * radius + 1`.
///
/// Edges are padded by mirroring `radius` samples (edge sample included),
/// the sum is updated incrementally so the cost is O(n), and any exact-zero
/// output is replaced by 1.0 so the result is always safe as a divisor.
/// The output has the same length as the input.
pub fn moving_average(values: &[f64], radius: usize) -> AnalysisResult<Vec<f64>> {
    if radius == 0 {
        return Err(AnalysisError::InvalidParameter(
            "Smoothing radius must be at least 1".to_string(),
        ));
    }
    let n = values.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let padded: Vec<f64> = (0..n + 2 * radius)
        .map(|i| values[mirror_index(i as isize - radius as isize, n)])
        .collect();
    let width = (2 * radius + 1) as f64;

    let mut smoothed = Vec::with_capacity(n);
    let mut sum: f64 = padded[..=2 * radius].iter().sum();
    for pos in 0..n {
        if pos > 0 {
            sum += padded[pos + 2 * radius] - padded[pos - 1];
        }
        let mean = sum / width;
        smoothed.push(if mean == 0.0 { 1.0 } else { mean });
    }
    Ok(smoothed)
}

/// Map an out-of-range index onto `0..n` by symmetric reflection.
fn mirror_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut j = i.rem_euclid(period);
    if j >= n {
        j = period - 1 - j;
    }
    j as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zeros_become_ones() {
        let out = moving_average(&[0.0; 32], 5).unwrap();
        assert_eq!(out.len(), 32);
        assert!(out.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn constant_input_is_unchanged() {
        let out = moving_average(&[2.5; 10], 3).unwrap();
        for v in out {
            assert_abs_diff_eq!(v, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn interior_matches_direct_mean() {
        let values: Vec<f64> = (0..20).map(|i| (i as f64 * 0.7).sin().abs()).collect();
        let out = moving_average(&values, 2).unwrap();
        for i in 2..18 {
            let direct: f64 = values[i - 2..=i + 2].iter().sum::<f64>() / 5.0;
            assert_abs_diff_eq!(out[i], direct, epsilon = 1e-12);
        }
    }

    #[test]
    fn edges_use_mirrored_samples() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let out = moving_average(&values, 1).unwrap();
        // left pad mirrors the first sample: (1 + 1 + 2) / 3
        assert_abs_diff_eq!(out[0], 4.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[3], 11.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn radius_larger_than_input_still_works() {
        let out = moving_average(&[1.0, 3.0], 5).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn zero_radius_is_rejected() {
        assert!(moving_average(&[1.0], 0).is_err());
    }
}
