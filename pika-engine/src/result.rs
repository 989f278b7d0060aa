//! Analysis result record

use pika_analysis::{key_label, TrackFeatures};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an analysis produced no metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Silent,
    DecodeError,
    AnalysisError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::NotFound => "not_found",
            FailureKind::Silent => "silent",
            FailureKind::DecodeError => "decode_error",
            FailureKind::AnalysisError => "analysis_error",
        };
        f.write_str(name)
    }
}

/// Final metrics of one track, rounded to one decimal place
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetrics {
    pub bpm: f32,
    pub energy: f32,
    pub key: String,
    pub danceability: f32,
    pub brightness: f32,
    pub acousticness: f32,
    pub groove: f32,
}

impl From<&TrackFeatures> for TrackMetrics {
    fn from(features: &TrackFeatures) -> Self {
        let scores = &features.scores;
        Self {
            bpm: round1(features.bpm),
            energy: round1(scores.energy),
            key: key_label(features.key),
            danceability: round1(scores.danceability),
            brightness: round1(scores.brightness),
            acousticness: round1(scores.acousticness),
            groove: round1(scores.groove),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFailure {
    pub kind: FailureKind,
    /// Short human-readable message
    pub message: String,
}

/// Outcome of one analysis call: either every metric or a failure, never both
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success(TrackMetrics),
    Failure(AnalysisFailure),
}

impl AnalysisOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        AnalysisOutcome::Failure(AnalysisFailure {
            kind,
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success(_))
    }

    pub fn metrics(&self) -> Option<&TrackMetrics> {
        match self {
            AnalysisOutcome::Success(metrics) => Some(metrics),
            AnalysisOutcome::Failure(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AnalysisOutcome::Success(_) => None,
            AnalysisOutcome::Failure(failure) => Some(failure.kind),
        }
    }

    /// Failure message, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Success(_) => None,
            AnalysisOutcome::Failure(failure) => Some(&failure.message),
        }
    }

    /// Flatten into the wire record
    pub fn to_record(&self) -> AnalysisRecord {
        match self {
            AnalysisOutcome::Success(m) => AnalysisRecord {
                bpm: Some(m.bpm),
                energy: Some(m.energy),
                key: Some(m.key.clone()),
                danceability: Some(m.danceability),
                brightness: Some(m.brightness),
                acousticness: Some(m.acousticness),
                groove: Some(m.groove),
                error: None,
            },
            AnalysisOutcome::Failure(failure) => AnalysisRecord {
                error: Some(failure.message.clone()),
                ..AnalysisRecord::default()
            },
        }
    }
}

impl Serialize for AnalysisOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

/// Flat key-value form of an outcome
///
/// Absent fields serialize as `null` so "not computed" never reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub bpm: Option<f32>,
    pub energy: Option<f32>,
    pub key: Option<String>,
    pub danceability: Option<f32>,
    pub brightness: Option<f32>,
    pub acousticness: Option<f32>,
    pub groove: Option<f32>,
    pub error: Option<String>,
}

/// Round to one decimal place
pub fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pika_analysis::{FingerprintScores, Mode, MusicalKey};

    fn features() -> TrackFeatures {
        TrackFeatures {
            bpm: 119.96,
            key: Some(MusicalKey {
                tonic: 9,
                mode: Mode::Minor,
            }),
            scores: FingerprintScores {
                energy: 42.04,
                brightness: 12.35,
                acousticness: 88.88,
                danceability: 50.0,
                groove: 0.04,
            },
        }
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(119.96), 120.0);
        assert_eq!(round1(42.04), 42.0);
        assert_eq!(round1(0.04), 0.0);
        assert_eq!(round1(88.88), 88.9);
    }

    #[test]
    fn test_metrics_from_features() {
        let metrics = TrackMetrics::from(&features());
        assert_eq!(metrics.bpm, 120.0);
        assert_eq!(metrics.key, "Am");
        assert_eq!(metrics.acousticness, 88.9);
        assert_eq!(metrics.groove, 0.0);
    }

    #[test]
    fn test_unknown_key_label() {
        let mut f = features();
        f.key = None;
        assert_eq!(TrackMetrics::from(&f).key, "Unknown");
    }

    #[test]
    fn test_success_record() {
        let outcome = AnalysisOutcome::Success(TrackMetrics::from(&features()));
        let record = outcome.to_record();
        assert_eq!(record.bpm, Some(120.0));
        assert_eq!(record.key.as_deref(), Some("Am"));
        assert!(record.error.is_none());
        assert!(outcome.is_success());
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_failure_record_has_only_error() {
        let outcome = AnalysisOutcome::failure(FailureKind::Silent, "Audio file appears to be silent");
        let record = outcome.to_record();
        assert_eq!(
            record,
            AnalysisRecord {
                error: Some("Audio file appears to be silent".into()),
                ..AnalysisRecord::default()
            }
        );
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Silent));
        assert!(outcome.metrics().is_none());
    }

    #[test]
    fn test_failure_serializes_nulls() {
        let outcome = AnalysisOutcome::failure(FailureKind::NotFound, "File not found: /x.mp3");
        let json = serde_json::to_value(&outcome).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj.len(), 8);
        for field in [
            "bpm",
            "energy",
            "key",
            "danceability",
            "brightness",
            "acousticness",
            "groove",
        ] {
            assert!(obj[field].is_null(), "{} should be null", field);
        }
        assert_eq!(obj["error"], "File not found: /x.mp3");
    }

    #[test]
    fn test_success_serializes_zero_as_number() {
        let outcome = AnalysisOutcome::Success(TrackMetrics::from(&features()));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["groove"], serde_json::json!(0.0));
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::DecodeError.to_string(), "decode_error");
        assert_eq!(
            serde_json::to_string(&FailureKind::NotFound).unwrap(),
            "\"not_found\""
        );
    }
}
