//! Analysis engine for Pika
//!
//! Loads audio into the analysis waveform format, runs the feature
//! extractor, and turns every outcome (including failures) into a flat
//! result record.

mod config;
mod engine;
mod loader;
mod result;

pub use config::{AnalysisConfig, Config, ConfigError, LoggingConfig, ServerConfig};
pub use engine::{AnalysisEngine, SILENCE_THRESHOLD, SILENT_MESSAGE};
pub use loader::{LoadError, WaveformLoader};
pub use result::{
    round1, AnalysisFailure, AnalysisOutcome, AnalysisRecord, FailureKind, TrackMetrics,
};
