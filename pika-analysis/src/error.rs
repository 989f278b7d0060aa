//! Errors raised by the feature-extraction stages

use thiserror::Error;

/// Failures that abort a whole analysis
///
/// Per-frame numerical problems never surface here; they degrade to zero
/// summaries inside the stage that hit them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("waveform is empty")]
    EmptyWaveform,
    #[error("waveform contains non-finite samples")]
    NonFiniteSamples,
}
