//! Core types for noise cross-correlation analysis.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Frequency band used for spectral whitening, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Lower corner frequency (Hz).
    pub fmin: f64,
    /// Upper corner frequency (Hz).
    pub fmax: f64,
}

impl FrequencyBand {
    /// Create a new band. Bounds are validated when the band is used.
    pub fn new(fmin: f64, fmax: f64) -> Self {
        Self { fmin, fmax }
    }

    /// Check that the band is finite, non-negative and ordered.
    pub fn validate(&self) -> AnalysisResult<()> {
        if !self.fmin.is_finite() || !self.fmax.is_finite() || self.fmin < 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "Frequency band [{}, {}] must be finite and non-negative",
                self.fmin, self.fmax
            )));
        }
        if self.fmax <= self.fmin {
            return Err(AnalysisError::InvalidParameter(format!(
                "Frequency band upper bound {} must exceed lower bound {}",
                self.fmax, self.fmin
            )));
        }
        Ok(())
    }
}

/// A single correlation function with its lag axis.
#[derive(Debug, Clone)]
pub struct Correlation {
    /// Correlation values, centered on lag 0.
    pub values: Array1<f64>,
    /// Lag of each sample in time units.
    pub lags: Array1<f64>,
}

impl Correlation {
    /// Number of lag samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the correlation is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lag (time units) at the maximum correlation value.
    pub fn peak_lag(&self) -> Option<f64> {
        argmax(self.values.iter().copied()).map(|i| self.lags[i])
    }
}

/// A batch of correlation functions sharing one lag axis.
///
/// Rows are observations (time windows, days, station pairs).
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    /// Correlation values, one row per observation.
    pub values: Array2<f64>,
    /// Shared lag axis in time units.
    pub lags: Array1<f64>,
}

impl CorrelationMatrix {
    /// Number of observations (rows).
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    /// Extract one row as a standalone correlation.
    pub fn row(&self, index: usize) -> Option<Correlation> {
        if index >= self.values.nrows() {
            return None;
        }
        Some(Correlation {
            values: self.values.row(index).to_owned(),
            lags: self.lags.clone(),
        })
    }
}

/// Stretched copies of a reference trace and their stretch factors.
#[derive(Debug, Clone)]
pub struct StretchBank {
    /// One stretched reference per row.
    pub traces: Array2<f64>,
    /// Stretch factor of each row, increasing and symmetric about 1.0.
    pub factors: Array1<f64>,
}

impl StretchBank {
    /// Number of stretch steps.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Check if the bank has no rows.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Spacing between consecutive stretch factors.
    pub fn step(&self) -> f64 {
        if self.factors.len() < 2 {
            return 0.0;
        }
        self.factors[1] - self.factors[0]
    }
}

/// Result of measuring one observation against a reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DvvMeasurement {
    /// Stretch factor at the best correlation.
    pub delta: f64,
    /// Peak correlation coefficient.
    pub coefficient: f64,
    /// Half the FWHM of the coefficient curve, in stretch-index units.
    /// `None` when the peak sits on the grid boundary or the curve is flat.
    pub error: Option<f64>,
}

impl DvvMeasurement {
    /// Relative velocity change implied by the stretch factor.
    pub fn dv_over_v(&self) -> f64 {
        1.0 - self.delta
    }

    /// Return the error estimate, or `DegenerateInput` when undefined.
    pub fn error_or_degenerate(&self) -> AnalysisResult<f64> {
        self.error.ok_or_else(|| {
            AnalysisError::DegenerateInput(format!(
                "Coefficient curve has no interior peak (delta {:.5}, cc {:.3})",
                self.delta, self.coefficient
            ))
        })
    }
}

/// Output of dynamic time warping.
#[derive(Debug, Clone)]
pub struct WarpPath {
    /// Cumulative distance matrix.
    pub distance_matrix: Array2<f64>,
    /// Distance at the last cell.
    pub total_distance: f64,
    /// Warp path from (last, last) back to (0, 0).
    pub path: Vec<(usize, usize)>,
}

/// Error types for analysis operations.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Coda or lag window exceeds the lag range or misses the axis.
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// Requested rank or step count is unusable for the input.
    #[error("Invalid rank: requested {requested}, available {available}")]
    InvalidRank { requested: usize, available: usize },

    /// Input has no usable signal for the requested measurement.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Rows, spectra or axes do not line up.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Parameter out of its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No samples to work on.
    #[error("Empty input: {0}")]
    EmptyInput(String),
}

/// Type alias for analysis results.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Index of the largest value, ignoring NaN ordering issues.
pub(crate) fn argmax(values: impl Iterator<Item = f64>) -> Option<usize> {
    values
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

/// Check sampling interval is usable.
pub(crate) fn validate_dt(dt: f64) -> AnalysisResult<()> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "Sampling interval must be positive, got {}",
            dt
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn band_rejects_inverted_bounds() {
        assert!(FrequencyBand::new(2.0, 1.0).validate().is_err());
        assert!(FrequencyBand::new(-1.0, 1.0).validate().is_err());
        assert!(FrequencyBand::new(0.1, 1.0).validate().is_ok());
    }

    #[test]
    fn correlation_reports_peak_lag() {
        let corr = Correlation {
            values: array![0.1, 0.3, 1.0, 0.2, 0.0],
            lags: array![-2.0, -1.0, 0.0, 1.0, 2.0],
        };
        assert_eq!(corr.peak_lag(), Some(0.0));
    }

    #[test]
    fn degenerate_measurement_maps_to_error() {
        let m = DvvMeasurement {
            delta: 1.05,
            coefficient: 0.4,
            error: None,
        };
        assert!(matches!(
            m.error_or_degenerate(),
            Err(AnalysisError::DegenerateInput(_))
        ));
    }

    #[test]
    fn dv_over_v_sign() {
        let m = DvvMeasurement {
            delta: 1.02,
            coefficient: 0.99,
            error: Some(3.0),
        };
        assert!((m.dv_over_v() + 0.02).abs() < 1e-12);
    }
}
