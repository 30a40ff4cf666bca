//! Noise cross-correlation analysis.
//!
//! This module turns ambient-noise records into correlation functions and
//! measures relative velocity change between them.
//!
//! # Architecture
//!
//! Every stage is a pure function over `ndarray` values:
//!
//! 1. **Whitening** (`whitening`): Flatten the amplitude spectrum inside a
//!    frequency band, keeping the phase.
//!
//! 2. **Correlation** (`correlation`): Normalize the cross-spectrum
//!    (cross-correlation, deconvolution, coherence, raw) and invert it to a
//!    lag-centered correlation function. `correlate_stacked` averages many
//!    windows before a single inverse transform.
//!
//! 3. **Coda window** (`coda`): Pick the causal and acausal coda lobes for a
//!    station distance, and build C3 cross-spectra from them.
//!
//! 4. **Stacking** (`stacking`): Linear or phase-weighted stack of rows.
//!
//! 5. **Velocity change** (`stretching`, `dtw`): Compare a measurement to a
//!    reference by stretching or by dynamic time warping.
//!
//! 6. **Denoising** (`denoise`): Truncated SVD with Wiener filtering for a
//!    date x lag image, iterative Wiener filtering for a single trace.
//!
//! # Usage
//!
//! ```ignore
//! use ncf_core::analysis::{
//!     correlate_batch, stretch, whiten_batch, linear_stack, CorrelationParams,
//!     FrequencyBand,
//! };
//!
//! let band = FrequencyBand::new(0.1, 1.0);
//! let s1 = whiten_batch(source.view(), dt, &band, None)?;
//! let s2 = whiten_batch(receiver.view(), dt, &band, None)?;
//! let params = CorrelationParams { maxlag: 100.0, dt, nfft: s1.ncols(), method };
//! let ccfs = correlate_batch(s1.view(), s2.view(), &params)?;
//! let reference = linear_stack(ccfs.values.view())?;
//! let dvv = stretch(ccfs.values.view(), reference.view(), 0.05, 1001)?;
//! ```

mod coda;
mod correlation;
mod denoise;
mod dtw;
pub mod fft;
mod interpolation;
mod smoothing;
mod stacking;
mod stats;
mod stretching;
pub mod types;
mod whitening;
mod wiener;

// Re-export main types from types module
pub use types::{
    AnalysisError, AnalysisResult, Correlation, CorrelationMatrix, DvvMeasurement, FrequencyBand,
    StretchBank, WarpPath,
};

pub use fft::{next_fast_len, next_pow2_exponent, FftPlan};
pub use smoothing::moving_average;
pub use whitening::{whiten, whiten_batch, TAPER_BINS};

pub use correlation::{
    correlate, correlate_batch, correlate_stacked, prepare_source, CorrelationParams,
    STACKED_COHERENCE_RADIUS,
};

pub use coda::{c3_spectra, coda_window, C3Spectra, CodaWindow};

pub use stacking::{linear_stack, phase_weighted_stack, stack, PwsParams};

pub use interpolation::CubicSpline;
pub use stretching::{build_stretch_bank, stretch, stretch_in_window, stretch_trace, vcorrcoef};

pub use dtw::{dtw, DEFAULT_STEP_PENALTY};

pub use denoise::{denoise, denoise_image, denoise_trace, DenoiseInput, DenoiseParams, Denoised};
pub use wiener::{wiener1, wiener2};

pub use stats::{abs_max, mad, median};
