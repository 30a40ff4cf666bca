//! Selector enums used throughout the pipeline.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Smoothing radius applied to |spec1| by `deconv`.
pub const DEFAULT_DECONV_RADIUS: usize = 10;

/// Smoothing radius applied to each side by `coherence`.
pub const DEFAULT_COHERENCE_RADIUS: usize = 5;

fn default_deconv_radius() -> usize {
    DEFAULT_DECONV_RADIUS
}

fn default_coherence_radius() -> usize {
    DEFAULT_COHERENCE_RADIUS
}

/// Normalization applied to the cross-spectrum before the inverse transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NormalizationMethod {
    /// Plain `conj(spec1) * spec2`.
    #[default]
    CrossCorrelation,
    /// Divide by the smoothed power of spec1.
    Deconv {
        #[serde(default = "default_deconv_radius")]
        radius: usize,
    },
    /// Divide by the smoothed amplitude of both spectra.
    Coherence {
        #[serde(default = "default_coherence_radius")]
        radius: usize,
    },
    /// No normalization.
    Raw,
}

impl NormalizationMethod {
    /// Deconvolution with the default smoothing radius.
    pub fn deconv() -> Self {
        Self::Deconv {
            radius: DEFAULT_DECONV_RADIUS,
        }
    }

    /// Coherence with the default smoothing radius.
    pub fn coherence() -> Self {
        Self::Coherence {
            radius: DEFAULT_COHERENCE_RADIUS,
        }
    }

    /// Short name used in settings and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CrossCorrelation => "cross-correlation",
            Self::Deconv { .. } => "deconv",
            Self::Coherence { .. } => "coherence",
            Self::Raw => "raw",
        }
    }
}

impl std::fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deconv { radius } | Self::Coherence { radius } => {
                write!(f, "{} (radius {})", self.name(), radius)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

impl FromStr for NormalizationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cross-correlation" | "xcorr" | "cc" => Ok(Self::CrossCorrelation),
            "deconv" | "deconvolution" => Ok(Self::deconv()),
            "coherence" => Ok(Self::coherence()),
            "raw" => Ok(Self::Raw),
            other => Err(format!("Unknown normalization method: {}", other)),
        }
    }
}

/// How a set of correlation functions is reduced to one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackMethod {
    /// Arithmetic mean of the rows.
    #[default]
    Linear,
    /// Mean weighted by instantaneous-phase coherence.
    PhaseWeighted,
}

impl std::fmt::Display for StackMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackMethod::Linear => write!(f, "Linear"),
            StackMethod::PhaseWeighted => write!(f, "Phase Weighted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_names() {
        assert_eq!(
            "cross-correlation".parse::<NormalizationMethod>().unwrap(),
            NormalizationMethod::CrossCorrelation
        );
        assert_eq!(
            "DECONV".parse::<NormalizationMethod>().unwrap(),
            NormalizationMethod::Deconv { radius: 10 }
        );
        assert!("phat".parse::<NormalizationMethod>().is_err());
    }

    #[test]
    fn tagged_serde_fills_default_radius() {
        #[derive(Deserialize)]
        struct Wrapper {
            method: NormalizationMethod,
        }
        let parsed: Wrapper = toml::from_str("method = { kind = \"coherence\" }").unwrap();
        assert_eq!(parsed.method, NormalizationMethod::Coherence { radius: 5 });
    }

    #[test]
    fn display_includes_radius() {
        assert_eq!(NormalizationMethod::deconv().to_string(), "deconv (radius 10)");
        assert_eq!(StackMethod::PhaseWeighted.to_string(), "Phase Weighted");
    }
}
