//! Data models shared across analysis, configuration and pipeline.

mod enums;

pub use enums::{
    NormalizationMethod, StackMethod, DEFAULT_COHERENCE_RADIUS, DEFAULT_DECONV_RADIUS,
};
