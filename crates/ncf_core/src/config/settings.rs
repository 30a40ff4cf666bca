//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::analysis::{
    next_fast_len, CorrelationParams, DenoiseParams, FrequencyBand, PwsParams,
    DEFAULT_STEP_PENALTY,
};
use crate::logging::{LogConfig, LogLevel};
use crate::models::{NormalizationMethod, StackMethod};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Spectral whitening band.
    #[serde(default)]
    pub whitening: WhiteningSettings,

    /// Correlation lag range and normalization.
    #[serde(default)]
    pub correlation: CorrelationSettings,

    /// Stacking method.
    #[serde(default)]
    pub stacking: StackingSettings,

    /// Stretching grid.
    #[serde(default)]
    pub stretching: StretchingSettings,

    /// Dynamic time warping.
    #[serde(default)]
    pub dtw: DtwSettings,

    /// Correlation-image denoising.
    #[serde(default)]
    pub denoise: DenoiseSettings,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: LogLevel,

    /// Include module paths in log lines.
    #[serde(default = "default_true")]
    pub show_target: bool,

    /// Include worker thread ids in log lines.
    #[serde(default)]
    pub show_thread_ids: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            show_target: true,
            show_thread_ids: false,
        }
    }
}

impl LoggingSettings {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            show_target: self.show_target,
            show_thread_ids: self.show_thread_ids,
        }
    }
}

/// Whitening band and transform length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteningSettings {
    /// Lower corner (Hz).
    #[serde(default = "default_fmin")]
    pub fmin: f64,

    /// Upper corner (Hz).
    #[serde(default = "default_fmax")]
    pub fmax: f64,

    /// Fixed transform length. Derived from the window length when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfft: Option<usize>,
}

fn default_fmin() -> f64 {
    0.05
}

fn default_fmax() -> f64 {
    2.0
}

impl Default for WhiteningSettings {
    fn default() -> Self {
        Self {
            fmin: default_fmin(),
            fmax: default_fmax(),
            nfft: None,
        }
    }
}

impl WhiteningSettings {
    pub fn band(&self) -> FrequencyBand {
        FrequencyBand::new(self.fmin, self.fmax)
    }

    /// Transform length for windows of `samples` points.
    pub fn nfft_for(&self, samples: usize) -> usize {
        self.nfft.unwrap_or_else(|| next_fast_len(samples))
    }
}

/// Correlation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSettings {
    /// Largest lag kept, in seconds.
    #[serde(default = "default_maxlag")]
    pub maxlag: f64,

    /// Cross-spectrum normalization.
    #[serde(default)]
    pub method: NormalizationMethod,
}

fn default_maxlag() -> f64 {
    100.0
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            maxlag: default_maxlag(),
            method: NormalizationMethod::default(),
        }
    }
}

impl CorrelationSettings {
    pub fn params(&self, dt: f64, nfft: usize) -> CorrelationParams {
        CorrelationParams {
            maxlag: self.maxlag,
            dt,
            nfft,
            method: self.method,
        }
    }
}

/// Stacking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackingSettings {
    #[serde(default)]
    pub method: StackMethod,

    /// Phase-weighted stack sharpness.
    #[serde(default = "default_pws_power")]
    pub pws_power: f64,

    /// Phase-coherence smoothing window (seconds).
    #[serde(default = "default_pws_timegate")]
    pub pws_timegate: f64,
}

fn default_pws_power() -> f64 {
    2.0
}

fn default_pws_timegate() -> f64 {
    5.0
}

impl Default for StackingSettings {
    fn default() -> Self {
        Self {
            method: StackMethod::default(),
            pws_power: default_pws_power(),
            pws_timegate: default_pws_timegate(),
        }
    }
}

impl StackingSettings {
    pub fn pws_params(&self, dt: f64) -> PwsParams {
        PwsParams {
            power: self.pws_power,
            sampling_rate: 1.0 / dt,
            timegate: self.pws_timegate,
        }
    }
}

/// Stretching grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StretchingSettings {
    /// One-sided relative stretch range.
    #[serde(default = "default_stretch_range")]
    pub range: f64,

    /// Number of stretch factors.
    #[serde(default = "default_stretch_steps")]
    pub steps: usize,

    /// Slowest ballistic velocity (km/s). When set, only the coda lobes
    /// after `distance / coda_vmin` are compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coda_vmin: Option<f64>,

    /// Coda window length (s).
    #[serde(default = "default_coda_width")]
    pub coda_width: f64,
}

fn default_coda_width() -> f64 {
    30.0
}

fn default_stretch_range() -> f64 {
    0.05
}

fn default_stretch_steps() -> usize {
    1001
}

impl Default for StretchingSettings {
    fn default() -> Self {
        Self {
            range: default_stretch_range(),
            steps: default_stretch_steps(),
            coda_vmin: None,
            coda_width: default_coda_width(),
        }
    }
}

/// Dynamic time warping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtwSettings {
    /// Penalty on non-diagonal steps.
    #[serde(default = "default_step_penalty")]
    pub step_penalty: f64,
}

fn default_step_penalty() -> f64 {
    DEFAULT_STEP_PENALTY
}

impl Default for DtwSettings {
    fn default() -> Self {
        Self {
            step_penalty: default_step_penalty(),
        }
    }
}

/// Denoising settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenoiseSettings {
    /// Denoise the per-window correlation image before stacking.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_window")]
    pub window_date: usize,

    #[serde(default = "default_window")]
    pub window_lag: usize,

    #[serde(default = "default_num_singular_values")]
    pub num_singular_values: usize,
}

fn default_window() -> usize {
    5
}

fn default_num_singular_values() -> usize {
    3
}

impl Default for DenoiseSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            window_date: default_window(),
            window_lag: default_window(),
            num_singular_values: default_num_singular_values(),
        }
    }
}

impl DenoiseSettings {
    pub fn params(&self) -> DenoiseParams {
        DenoiseParams {
            window_date: self.window_date,
            window_lag: self.window_lag,
            num_singular_values: self.num_singular_values,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Logging,
    Whitening,
    Correlation,
    Stacking,
    Stretching,
    Dtw,
    Denoise,
}

impl ConfigSection {
    /// Every section, in file order.
    pub const ALL: [ConfigSection; 7] = [
        ConfigSection::Logging,
        ConfigSection::Whitening,
        ConfigSection::Correlation,
        ConfigSection::Stacking,
        ConfigSection::Stretching,
        ConfigSection::Dtw,
        ConfigSection::Denoise,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Logging => "logging",
            ConfigSection::Whitening => "whitening",
            ConfigSection::Correlation => "correlation",
            ConfigSection::Stacking => "stacking",
            ConfigSection::Stretching => "stretching",
            ConfigSection::Dtw => "dtw",
            ConfigSection::Denoise => "denoise",
        }
    }

    /// Comment written above the table.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Whitening => "Spectral whitening band (Hz)",
            ConfigSection::Correlation => "Cross-correlation lag range (s) and normalization",
            ConfigSection::Stacking => "Stacking of window correlations",
            ConfigSection::Stretching => "Stretching dv/v grid",
            ConfigSection::Dtw => "Dynamic time warping",
            ConfigSection::Denoise => "SVD + Wiener denoising of the correlation image",
        }
    }
}
