//! Analysis orchestration: load, silence check, extract, assemble

use crate::config::AnalysisConfig;
use crate::loader::{LoadError, WaveformLoader};
use crate::result::{AnalysisOutcome, FailureKind, TrackMetrics};
use pika_analysis::{FeatureExtractor, TrackFeatures, Waveform};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

/// Peak amplitude below which a track counts as silent
pub const SILENCE_THRESHOLD: f32 = 0.01;

pub const SILENT_MESSAGE: &str = "Audio file appears to be silent";

/// Runs the full analysis of one track per call
///
/// Holds only immutable tables, so a single engine can be shared between
/// threads and used for any number of concurrent analyses.
#[derive(Default)]
pub struct AnalysisEngine {
    loader: WaveformLoader,
    extractor: FeatureExtractor,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &AnalysisConfig) -> Self {
        Self {
            loader: WaveformLoader::with_max_duration(config.max_duration_secs),
            extractor: FeatureExtractor::new(),
        }
    }

    pub fn loader(&self) -> &WaveformLoader {
        &self.loader
    }

    /// Analyze an audio file
    ///
    /// Expected conditions (missing file, undecodable audio, silence) come
    /// back as a failure outcome; this never returns an error or panics.
    pub fn analyze_file(&self, path: &Path) -> AnalysisOutcome {
        let start = Instant::now();
        tracing::debug!(path = %path.display(), "analyzing file");

        let waveform = match self.loader.load(path) {
            Ok(w) => w,
            Err(e) => return load_failure(e),
        };

        let outcome = self.analyze_waveform(&waveform);
        log_outcome(&outcome, start);
        outcome
    }

    /// Analyze a pre-decoded interleaved buffer
    pub fn analyze_samples(&self, samples: &[f32], sample_rate: u32, channels: u16) -> AnalysisOutcome {
        let start = Instant::now();

        let waveform = match self.loader.from_samples(samples, sample_rate, channels) {
            Ok(w) => w,
            Err(e) => return load_failure(e),
        };

        let outcome = self.analyze_waveform(&waveform);
        log_outcome(&outcome, start);
        outcome
    }

    /// Silence check plus feature extraction on a loaded waveform
    pub fn analyze_waveform(&self, waveform: &Waveform) -> AnalysisOutcome {
        tracing::debug!(
            samples = waveform.len(),
            duration_secs = waveform.duration_secs(),
            "waveform loaded"
        );

        let peak = waveform.peak();
        // NaN peaks fall through to extraction, which rejects them
        if peak < SILENCE_THRESHOLD {
            tracing::debug!(peak, "below silence threshold");
            return AnalysisOutcome::failure(FailureKind::Silent, SILENT_MESSAGE);
        }

        match self.extract_guarded(waveform) {
            Ok(features) => AnalysisOutcome::Success(TrackMetrics::from(&features)),
            Err(message) => AnalysisOutcome::failure(FailureKind::AnalysisError, message),
        }
    }

    /// Run extraction, turning errors and panics into a message
    fn extract_guarded(&self, waveform: &Waveform) -> Result<TrackFeatures, String> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.extractor.extract(waveform))) {
            Ok(Ok(features)) => Ok(features),
            Ok(Err(e)) => Err(format!("Analysis failed: {}", e)),
            Err(payload) => Err(format!("Analysis failed: {}", panic_message(payload.as_ref()))),
        }
    }
}

fn load_failure(error: LoadError) -> AnalysisOutcome {
    let kind = match error {
        LoadError::NotFound(_) => FailureKind::NotFound,
        _ => FailureKind::DecodeError,
    };
    let message = error.to_string();
    tracing::warn!(%kind, %message, "analysis failed");
    AnalysisOutcome::failure(kind, message)
}

fn log_outcome(outcome: &AnalysisOutcome, start: Instant) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match outcome {
        AnalysisOutcome::Success(metrics) => {
            tracing::info!(
                bpm = metrics.bpm,
                key = %metrics.key,
                elapsed_ms,
                "analysis complete"
            );
        }
        AnalysisOutcome::Failure(failure) => {
            tracing::warn!(
                kind = %failure.kind,
                message = %failure.message,
                elapsed_ms,
                "analysis failed"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "internal panic"
    }
}
