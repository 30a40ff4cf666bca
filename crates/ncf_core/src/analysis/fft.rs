//! Transform plumbing shared by the whitener, correlation engine and stacker.
//!
//! Everything here works on plain slices; callers own the ndarray views.

use std::sync::Arc;

use rustfft::{num_complex::Complex64, Fft, FftPlanner};

use super::types::{AnalysisError, AnalysisResult};

/// Smallest 5-smooth integer (2^a * 3^b * 5^c) that is >= `n`.
///
/// These sizes transform quickly with mixed-radix FFTs.
pub fn next_fast_len(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    let mut candidate = n;
    loop {
        let mut m = candidate;
        for p in [2, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        if m == 1 {
            return candidate;
        }
        candidate += 1;
    }
}

/// Exponent of the next power of two: `ceil(log2(|x|))`.
pub fn next_pow2_exponent(x: f64) -> i32 {
    x.abs().log2().ceil() as i32
}

/// Forward and inverse transforms planned once for one `nfft`.
///
/// Plans are shared across rows (and rayon workers) of a batch.
#[derive(Clone)]
pub struct FftPlan {
    nfft: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl FftPlan {
    pub fn new(nfft: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            nfft,
            forward: planner.plan_fft_forward(nfft),
            inverse: planner.plan_fft_inverse(nfft),
        }
    }

    /// Transform length.
    pub fn len(&self) -> usize {
        self.nfft
    }

    pub fn is_empty(&self) -> bool {
        self.nfft == 0
    }

    /// Forward transform of a real signal, zero-padded or truncated to `nfft`.
    pub fn forward_real(&self, signal: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = signal
            .iter()
            .take(self.nfft)
            .map(|&x| Complex64::new(x, 0.0))
            .collect();
        buffer.resize(self.nfft, Complex64::new(0.0, 0.0));
        self.forward.process(&mut buffer);
        buffer
    }

    /// Unnormalized in-place inverse transform of an `nfft`-point buffer.
    pub fn inverse_in_place(&self, buffer: &mut [Complex64]) {
        self.inverse.process(buffer);
    }

    /// Inverse transform keeping the real part, normalized by `1/nfft`,
    /// and rotated so lag 0 sits at index `nfft/2`.
    ///
    /// `spectrum` must hold `nfft` bins.
    pub fn inverse_real_centered(&self, mut spectrum: Vec<Complex64>) -> Vec<f64> {
        let nfft = self.nfft;
        if nfft == 0 {
            return Vec::new();
        }
        self.inverse.process(&mut spectrum);

        let scale = 1.0 / nfft as f64;
        let center = nfft / 2;
        let mut centered = vec![0.0; nfft];
        for (i, value) in spectrum.iter().enumerate() {
            centered[(i + center) % nfft] = value.re * scale;
        }
        centered
    }
}

impl std::fmt::Debug for FftPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftPlan").field("nfft", &self.nfft).finish()
    }
}

/// Build a full Hermitian spectrum from its positive-frequency half.
///
/// Bins `0..nfft/2` of `half` are used. The DC bin and the bin at `nfft/2`
/// (plus its mirror) are zeroed; bin `nfft - k` is `conj(bin k)`.
pub fn hermitian_from_half(half: &[Complex64], nfft: usize) -> Vec<Complex64> {
    let n_half = nfft / 2;
    let mut full = vec![Complex64::new(0.0, 0.0); nfft];
    for k in 1..n_half.min(half.len()) {
        full[k] = half[k];
        full[nfft - k] = half[k].conj();
    }
    full
}

/// Index range `[start, end)` of the re-centered correlation that covers
/// `|lag| <= maxlag`, plus the matching lag axis.
pub fn lag_window(nfft: usize, dt: f64, maxlag: f64) -> AnalysisResult<(usize, usize, Vec<f64>)> {
    if !maxlag.is_finite() || maxlag < 0.0 {
        return Err(AnalysisError::InvalidWindow(format!(
            "maxlag must be non-negative, got {}",
            maxlag
        )));
    }
    let center = nfft / 2;
    let max_samples = (maxlag / dt + 1e-9).floor() as usize;
    if max_samples >= center {
        return Err(AnalysisError::InvalidWindow(format!(
            "maxlag of {} samples must be below Nfft/2 = {}",
            max_samples, center
        )));
    }
    let start = center - max_samples;
    let end = center + max_samples + 1;
    let lags = (start..end)
        .map(|i| (i as f64 - center as f64) * dt)
        .collect();
    Ok((start, end, lags))
}
