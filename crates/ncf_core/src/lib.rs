//! NCF Core - ambient-noise cross-correlation and dv/v measurement.
//!
//! This crate holds the numerical pipeline with no I/O beyond its own
//! settings file: whitening, correlation, stacking, stretching, dynamic
//! time warping and correlation-image denoising.

pub mod analysis;
pub mod config;
pub mod logging;
pub mod models;
pub mod pipeline;

#[cfg(test)]
mod test_support;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
