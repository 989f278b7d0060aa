//! Feature extraction pipeline over one waveform

use crate::error::AnalysisError;
use crate::key::{estimate_key, MusicalKey};
use crate::metrics::{
    acousticness_score, brightness_score, danceability_score, energy_score, groove_score,
    FingerprintScores,
};
use crate::onset::onset_envelope;
use crate::spectral::SpectralAnalyzer;
use crate::tempo::TempoEstimator;
use crate::waveform::Waveform;

/// Unrounded features of one waveform
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeatures {
    /// Estimated tempo; 0.0 when no periodicity was found
    pub bpm: f32,
    /// Tonal center and mode; None when the chroma was degenerate
    pub key: Option<MusicalKey>,
    pub scores: FingerprintScores,
}

/// Runs spectral analysis, onset/tempo estimation, key estimation, and
/// score synthesis in sequence
///
/// Holds only immutable precomputed tables (FFT plans, windows, chroma
/// folding), so one extractor can serve any number of waveforms.
#[derive(Default)]
pub struct FeatureExtractor {
    spectral: SpectralAnalyzer,
    tempo: TempoEstimator,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every feature from a waveform
    pub fn extract(&self, waveform: &Waveform) -> Result<TrackFeatures, AnalysisError> {
        let spectrogram = self.spectral.analyze(waveform)?;

        let envelope = onset_envelope(&spectrogram);
        let tempogram = self.tempo.tempogram(&envelope);
        let tempo = self.tempo.estimate(&envelope, &tempogram);

        let key = estimate_key(&spectrogram.pitch_class_histogram());

        let scores = FingerprintScores {
            energy: energy_score(spectrogram.mean_rms()),
            brightness: brightness_score(spectrogram.mean_centroid()),
            acousticness: acousticness_score(spectrogram.mean_flatness()),
            danceability: danceability_score(tempogram.peak_to_mean_ratio()),
            groove: groove_score(envelope.mean()),
        };

        tracing::debug!(
            bpm = tempo.bpm,
            periodicity = tempo.periodicity,
            key = ?key,
            ?scores,
            "extracted features"
        );

        Ok(TrackFeatures {
            bpm: tempo.bpm,
            key,
            scores,
        })
    }
}
