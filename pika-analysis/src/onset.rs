//! Onset-strength envelope from log-compressed spectral flux
//!
//! Each frame's power spectrum is converted to dB (clipped 80 dB below the
//! loudest bin of the whole spectrogram), and the onset strength of frame `t`
//! is the mean over bins of the positive change from frame `t - 1`.
//! Decreases in level are ignored; they do not mark new events.

use crate::spectral::{Spectrogram, POWER_FLOOR};

/// Dynamic range kept below the loudest bin (dB)
const TOP_DB: f32 = 80.0;

/// One onset-strength value per analysis frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnsetEnvelope {
    pub values: Vec<f32>,
    /// Envelope samples per second
    pub frame_rate: f32,
}

impl OnsetEnvelope {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean onset strength (0.0 for an empty envelope)
    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    /// True when no frame carries any onset energy
    pub fn is_silent(&self) -> bool {
        self.values.iter().all(|&v| v <= 1e-6)
    }
}

/// Compute the onset envelope of a spectrogram
pub fn onset_envelope(spectrogram: &Spectrogram) -> OnsetEnvelope {
    let frame_rate = spectrogram.grid.frame_rate();
    let frames = &spectrogram.frames;
    if frames.is_empty() {
        return OnsetEnvelope {
            values: Vec::new(),
            frame_rate,
        };
    }

    let to_db = |mag: f32| 10.0 * (mag * mag).max(POWER_FLOOR).log10();

    let max_db = frames
        .iter()
        .flat_map(|f| f.magnitudes.iter())
        .map(|&m| to_db(m))
        .fold(f32::MIN, f32::max);
    let floor_db = max_db - TOP_DB;

    let mut values = Vec::with_capacity(frames.len());
    values.push(0.0);

    let mut prev: Vec<f32> = frames[0]
        .magnitudes
        .iter()
        .map(|&m| to_db(m).max(floor_db))
        .collect();

    for frame in &frames[1..] {
        let current: Vec<f32> = frame
            .magnitudes
            .iter()
            .map(|&m| to_db(m).max(floor_db))
            .collect();

        let flux: f32 = current
            .iter()
            .zip(prev.iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        values.push(flux / current.len().max(1) as f32);

        prev = current;
    }

    OnsetEnvelope { values, frame_rate }
}
