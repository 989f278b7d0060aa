//! Fixed heuristic transforms from raw statistics to 0-100 scores
//!
//! The scale factors are calibration constants shared with the desktop
//! client. Changing any of them changes every stored fingerprint.

/// `energy = mean_rms * ENERGY_SCALE`
pub const ENERGY_SCALE: f32 = 500.0;
/// `brightness = mean_centroid / BRIGHTNESS_REFERENCE_HZ * 100`
pub const BRIGHTNESS_REFERENCE_HZ: f32 = 4000.0;
/// `danceability = tempo peak-to-mean ratio * DANCEABILITY_SCALE`
pub const DANCEABILITY_SCALE: f32 = 15.0;
/// `groove = mean onset strength * GROOVE_SCALE`
pub const GROOVE_SCALE: f32 = 25.0;
/// Danceability reported when the tempogram has no strength at all
pub const DEFAULT_DANCEABILITY: f32 = 50.0;

pub const SCORE_MIN: f32 = 0.0;
pub const SCORE_MAX: f32 = 100.0;

/// Clamp a score into [0, 100]; NaN maps to 0
pub fn clamp_score(value: f32) -> f32 {
    if value.is_nan() {
        return SCORE_MIN;
    }
    SCORE_MIN.max(SCORE_MAX.min(value))
}

/// Loudness from mean frame RMS
pub fn energy_score(mean_rms: f32) -> f32 {
    clamp_score(mean_rms * ENERGY_SCALE)
}

/// Treble presence from mean spectral centroid (Hz)
pub fn brightness_score(mean_centroid: f32) -> f32 {
    clamp_score((mean_centroid / BRIGHTNESS_REFERENCE_HZ) * 100.0)
}

/// Tonal vs noise-like character from mean spectral flatness
pub fn acousticness_score(mean_flatness: f32) -> f32 {
    clamp_score((1.0 - mean_flatness) * 100.0)
}

/// Rhythmic pulse strength from the tempogram peak-to-mean ratio
///
/// `None` (no tempogram strength) maps to [`DEFAULT_DANCEABILITY`].
pub fn danceability_score(peak_to_mean: Option<f32>) -> f32 {
    match peak_to_mean {
        Some(ratio) => clamp_score(ratio * DANCEABILITY_SCALE),
        None => DEFAULT_DANCEABILITY,
    }
}

/// Percussive punch from mean onset strength
pub fn groove_score(mean_onset_strength: f32) -> f32 {
    clamp_score(mean_onset_strength * GROOVE_SCALE)
}

/// The five synthesized scores, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerprintScores {
    pub energy: f32,
    pub brightness: f32,
    pub acousticness: f32,
    pub danceability: f32,
    pub groove: f32,
}
