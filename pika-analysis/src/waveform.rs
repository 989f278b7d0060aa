//! Mono analysis waveform at the fixed analysis sample rate

/// Sample rate every analysis stage assumes (Hz)
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

/// Longest prefix of a recording that is analyzed (seconds)
pub const MAX_DURATION_SECS: f32 = 60.0;

/// A decoded, mono, 22050 Hz sample buffer
///
/// Construction truncates to the maximum analysis duration, so every
/// `Waveform` holds at most 60 seconds of audio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
}

impl Waveform {
    /// Wrap mono samples that are already at [`ANALYSIS_SAMPLE_RATE`]
    pub fn new(samples: Vec<f32>) -> Self {
        Self::with_max_duration(samples, MAX_DURATION_SECS)
    }

    /// Wrap mono samples, keeping at most `max_secs` seconds
    ///
    /// `max_secs` is capped at [`MAX_DURATION_SECS`].
    pub fn with_max_duration(mut samples: Vec<f32>, max_secs: f32) -> Self {
        samples.truncate(max_samples(max_secs));
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        ANALYSIS_SAMPLE_RATE
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / ANALYSIS_SAMPLE_RATE as f32
    }

    /// Peak absolute amplitude (0.0 for an empty waveform)
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }
}

/// Number of samples at the analysis rate that fit in `max_secs`
pub fn max_samples(max_secs: f32) -> usize {
    let secs = max_secs.clamp(0.0, MAX_DURATION_SECS);
    (secs * ANALYSIS_SAMPLE_RATE as f32) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncates_to_max_duration() {
        let samples = vec![0.1f32; ANALYSIS_SAMPLE_RATE as usize * 61];
        let waveform = Waveform::new(samples);
        assert_eq!(waveform.len(), ANALYSIS_SAMPLE_RATE as usize * 60);
        assert!((waveform.duration_secs() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_custom_duration_is_capped() {
        let samples = vec![0.0f32; ANALYSIS_SAMPLE_RATE as usize * 70];
        let waveform = Waveform::with_max_duration(samples.clone(), 10.0);
        assert_eq!(waveform.len(), ANALYSIS_SAMPLE_RATE as usize * 10);

        let waveform = Waveform::with_max_duration(samples, 600.0);
        assert_eq!(waveform.len(), ANALYSIS_SAMPLE_RATE as usize * 60);
    }

    #[test]
    fn test_peak() {
        let waveform = Waveform::new(vec![0.1, -0.7, 0.3]);
        assert!((waveform.peak() - 0.7).abs() < 1e-6);
        assert_eq!(Waveform::default().peak(), 0.0);
    }
}
