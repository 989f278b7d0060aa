//! End-to-end analysis of WAV files written with hound

use pika_engine::{AnalysisEngine, AnalysisRecord, FailureKind, SILENT_MESSAGE};
use std::f32::consts::PI;
use std::path::PathBuf;

/// Temp file removed on drop
struct Fixture(PathBuf);

impl Fixture {
    fn path(name: &str) -> Self {
        Self(std::env::temp_dir().join(format!(
            "pika_engine_{}_{}",
            std::process::id(),
            name
        )))
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_file(&self.0).ok();
    }
}

fn write_wav(name: &str, sample_rate: u32, channels: u16, frames: &[f32]) -> Fixture {
    let fixture = Fixture::path(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&fixture.0, spec).unwrap();
    for &s in frames {
        let value = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
    fixture
}

fn sine(freq: f32, sample_rate: u32, secs: f32, amplitude: f32) -> Vec<f32> {
    let n = (secs * sample_rate as f32) as usize;
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn assert_fingerprint_in_range(record: &AnalysisRecord) {
    for (name, value) in [
        ("energy", record.energy),
        ("danceability", record.danceability),
        ("brightness", record.brightness),
        ("acousticness", record.acousticness),
        ("groove", record.groove),
    ] {
        let v = value.unwrap_or_else(|| panic!("{} missing", name));
        assert!((0.0..=100.0).contains(&v), "{} out of range: {}", name, v);
    }
}

#[test]
fn test_mono_sine_at_analysis_rate() {
    let wav = write_wav("a440_mono.wav", 22050, 1, &sine(440.0, 22050, 5.0, 0.9));
    let outcome = AnalysisEngine::new().analyze_file(&wav.0);

    let record = outcome.to_record();
    assert!(record.error.is_none(), "unexpected error: {:?}", record.error);
    assert_eq!(record.key.as_deref(), Some("A"));
    assert!(record.acousticness.unwrap() > 70.0);
    assert!(record.bpm.is_some());
    assert_fingerprint_in_range(&record);
}

#[test]
fn test_stereo_cd_rate_is_resampled() {
    let wav = write_wav("a440_stereo.wav", 44100, 2, &sine(440.0, 44100, 3.0, 0.8));
    let outcome = AnalysisEngine::new().analyze_file(&wav.0);

    let metrics = outcome.metrics().expect("stereo file should analyze");
    assert_eq!(metrics.key, "A");
}

#[test]
fn test_silent_file() {
    let wav = write_wav("silence.wav", 22050, 1, &vec![0.0; 22050 * 2]);
    let outcome = AnalysisEngine::new().analyze_file(&wav.0);

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Silent));
    let record = outcome.to_record();
    assert_eq!(record.error.as_deref(), Some(SILENT_MESSAGE));
    assert!(record.bpm.is_none());
    assert!(record.energy.is_none());
    assert!(record.key.is_none());
}

#[test]
fn test_missing_file_mentions_path() {
    let fixture = Fixture::path("never_written.wav");
    let outcome = AnalysisEngine::new().analyze_file(&fixture.0);

    assert_eq!(outcome.failure_kind(), Some(FailureKind::NotFound));
    let message = outcome.error().unwrap();
    assert!(message.contains(&fixture.0.display().to_string()));
}

#[test]
fn test_corrupt_file_is_decode_error() {
    let fixture = Fixture::path("corrupt.wav");
    std::fs::write(&fixture.0, b"RIFF\x00\x00\x00\x00not really a wave file").unwrap();

    let outcome = AnalysisEngine::new().analyze_file(&fixture.0);
    assert_eq!(outcome.failure_kind(), Some(FailureKind::DecodeError));
    assert!(outcome.metrics().is_none());
}

#[test]
fn test_record_json_shape() {
    let wav = write_wav("json_shape.wav", 22050, 1, &sine(220.0, 22050, 2.0, 0.5));
    let outcome = AnalysisEngine::new().analyze_file(&wav.0);

    let json = serde_json::to_value(&outcome).unwrap();
    let obj = json.as_object().unwrap();
    assert_eq!(obj.len(), 8);
    assert!(obj["error"].is_null());
    assert!(obj["bpm"].is_number());
    assert!(obj["key"].is_string());

    let record: AnalysisRecord = serde_json::from_value(json).unwrap();
    assert_eq!(record, outcome.to_record());
}
