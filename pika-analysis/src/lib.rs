//! Audio feature extraction for Pika
//!
//! Turns a mono 22050 Hz waveform into tempo, key, loudness, and the
//! fingerprint scores (danceability, brightness, acousticness, groove).
//! Every stage is a pure function of its input; nothing is cached between
//! waveforms.

mod error;
mod extractor;
mod key;
mod metrics;
mod onset;
mod spectral;
mod tempo;
mod waveform;

pub use error::AnalysisError;
pub use extractor::{FeatureExtractor, TrackFeatures};
pub use key::{
    estimate_key, key_label, Mode, MusicalKey, PitchClassHistogram, PITCH_CLASS_NAMES,
    UNKNOWN_KEY,
};
pub use metrics::{
    acousticness_score, brightness_score, clamp_score, danceability_score, energy_score,
    groove_score, FingerprintScores,
};
pub use onset::{onset_envelope, OnsetEnvelope};
pub use spectral::{
    FrameGrid, SpectralAnalyzer, SpectralFrame, Spectrogram, FRAME_LENGTH, HOP_LENGTH,
};
pub use tempo::{TempoEstimate, TempoEstimator, Tempogram, MAX_BPM, MIN_BPM};
pub use waveform::{max_samples, Waveform, ANALYSIS_SAMPLE_RATE, MAX_DURATION_SECS};
