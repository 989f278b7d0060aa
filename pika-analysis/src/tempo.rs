//! Tempogram and tempo estimation over the onset envelope
//!
//! The tempogram is a windowed autocorrelation of the onset envelope: for
//! every frame, a Hann-weighted window of `TEMPOGRAM_WIN_LENGTH` envelope
//! values centered on that frame is autocorrelated (via FFT) and normalized by
//! its lag-0 strength. Averaging each lag bin over time gives the periodicity
//! profile used for both the tempo decision and the danceability ratio.
//!
//! Tempo selection:
//! 1. Smooth the periodicity profile across neighbouring lags so beat periods
//!    that fall between two integer lags are not split in half.
//! 2. Weight each lag in the 30-300 BPM range by a log-normal prior centered
//!    on 120 BPM (one octave standard deviation) and take the best lag.
//! 3. Refine to sub-frame precision with parabolic interpolation, then again
//!    on the largest multiple of the period that fits in the envelope.

use crate::onset::OnsetEnvelope;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Autocorrelation window length in envelope frames (~8.9 s at 22050/512)
pub const TEMPOGRAM_WIN_LENGTH: usize = 384;

/// Plausible tempo range (BPM)
pub const MIN_BPM: f32 = 30.0;
pub const MAX_BPM: f32 = 300.0;

/// Center of the tempo prior (BPM)
const PRIOR_CENTER_BPM: f32 = 120.0;
/// Standard deviation of the tempo prior (octaves)
const PRIOR_STD_OCTAVES: f32 = 1.0;

/// Peak periodicity, relative to lag 0, below which no tempo is reported
const MIN_PERIODICITY: f32 = 0.1;

/// Smoothing kernel applied across lag bins
const LAG_KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

const EPSILON: f32 = 1e-10;

/// Periodicity strength per (lag, frame)
#[derive(Debug, Clone)]
pub struct Tempogram {
    /// One column per envelope frame, `win_length` lag bins each
    pub columns: Vec<Vec<f32>>,
    pub win_length: usize,
    /// Envelope frames per second
    pub frame_rate: f32,
}

impl Tempogram {
    /// Mean strength of each lag bin across time
    pub fn mean_strength(&self) -> Vec<f32> {
        let mut mean = vec![0.0f32; self.win_length];
        if self.columns.is_empty() {
            return mean;
        }
        for column in &self.columns {
            for (acc, &v) in mean.iter_mut().zip(column.iter()) {
                *acc += v;
            }
        }
        let n = self.columns.len() as f32;
        for v in &mut mean {
            *v /= n;
        }
        mean
    }

    /// Tempo in BPM represented by a (fractional) lag
    pub fn lag_to_bpm(&self, lag: f32) -> f32 {
        if lag <= 0.0 {
            return 0.0;
        }
        60.0 * self.frame_rate / lag
    }

    /// Peak-to-mean ratio of the per-lag strength
    ///
    /// Returns None when the mean strength is not positive (no periodicity at all).
    pub fn peak_to_mean_ratio(&self) -> Option<f32> {
        let strength = self.mean_strength();
        if strength.is_empty() {
            return None;
        }
        let mean = strength.iter().sum::<f32>() / strength.len() as f32;
        if mean.is_nan() || mean <= 0.0 {
            return None;
        }
        let peak = strength.iter().cloned().fold(0.0f32, f32::max);
        Some(peak / mean)
    }
}

/// Result of tempo estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    /// Estimated tempo; 0.0 when no periodicity was found
    pub bpm: f32,
    /// Peak periodicity relative to lag 0 (0.0 - 1.0)
    pub periodicity: f32,
}

impl TempoEstimate {
    fn none() -> Self {
        Self {
            bpm: 0.0,
            periodicity: 0.0,
        }
    }
}

/// Tempogram builder and tempo estimator
pub struct TempoEstimator {
    win_length: usize,
    fft_size: usize,
    forward: Arc<dyn rustfft::Fft<f32>>,
    inverse: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoEstimator {
    pub fn new() -> Self {
        let win_length = TEMPOGRAM_WIN_LENGTH;
        // Zero-pad to 2x so the circular autocorrelation equals the linear one
        let fft_size = win_length * 2;
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let window: Vec<f32> = (0..win_length)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / win_length as f32).cos()))
            .collect();

        Self {
            win_length,
            fft_size,
            forward,
            inverse,
            window,
        }
    }

    /// Build the tempogram of an onset envelope
    pub fn tempogram(&self, envelope: &OnsetEnvelope) -> Tempogram {
        let values = &envelope.values;
        let half = self.win_length / 2;
        let mut columns = Vec::with_capacity(values.len());
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];

        for t in 0..values.len() {
            for slot in buffer.iter_mut() {
                *slot = Complex::new(0.0, 0.0);
            }
            for (i, &w) in self.window.iter().enumerate() {
                let idx = (t + i).checked_sub(half);
                let v = idx.and_then(|idx| values.get(idx)).copied().unwrap_or(0.0);
                buffer[i] = Complex::new(v * w, 0.0);
            }

            self.forward.process(&mut buffer);
            for c in buffer.iter_mut() {
                *c = Complex::new(c.norm_sqr(), 0.0);
            }
            self.inverse.process(&mut buffer);

            let mut column: Vec<f32> = buffer[..self.win_length]
                .iter()
                .map(|c| c.re / self.fft_size as f32)
                .collect();

            let max = column.iter().map(|v| v.abs()).fold(0.0f32, f32::max);
            if max > EPSILON {
                for v in &mut column {
                    *v /= max;
                }
            } else {
                column.iter_mut().for_each(|v| *v = 0.0);
            }
            columns.push(column);
        }

        Tempogram {
            columns,
            win_length: self.win_length,
            frame_rate: envelope.frame_rate,
        }
    }

    /// Estimate the dominant tempo
    ///
    /// A silent envelope, or one whose periodicity peak is indistinguishable
    /// from noise, yields 0.0 BPM rather than an error.
    pub fn estimate(&self, envelope: &OnsetEnvelope, tempogram: &Tempogram) -> TempoEstimate {
        if envelope.is_silent() || tempogram.columns.is_empty() {
            return TempoEstimate::none();
        }

        let profile = smooth_across_lags(&tempogram.mean_strength());
        let reference = profile[0];
        if reference <= EPSILON {
            return TempoEstimate::none();
        }

        let frame_rate = tempogram.frame_rate;
        let min_lag = ((frame_rate * 60.0 / MAX_BPM).ceil() as usize).max(1);
        let max_lag = ((frame_rate * 60.0 / MIN_BPM).floor() as usize).min(profile.len() - 2);
        if min_lag >= max_lag {
            return TempoEstimate::none();
        }

        let mut best_lag = min_lag;
        let mut best_score = f32::MIN;
        for lag in min_lag..=max_lag {
            let score = profile[lag] * tempo_prior(tempogram.lag_to_bpm(lag as f32));
            if score > best_score {
                best_score = score;
                best_lag = lag;
            }
        }

        let periodicity = (profile[best_lag] / reference).clamp(0.0, 1.0);
        if periodicity < MIN_PERIODICITY {
            tracing::debug!(periodicity, "no periodicity above noise");
            return TempoEstimate {
                bpm: 0.0,
                periodicity,
            };
        }

        let coarse = best_lag as f32 + parabolic_offset(&profile, best_lag);
        let period = refine_with_multiples(&envelope.values, coarse);
        let bpm = tempogram.lag_to_bpm(period);

        tracing::debug!(best_lag, coarse, period, bpm, "estimated tempo");

        TempoEstimate { bpm, periodicity }
    }
}

/// Log-normal tempo prior centered on 120 BPM
fn tempo_prior(bpm: f32) -> f32 {
    if bpm <= 0.0 {
        return 0.0;
    }
    let octaves = (bpm / PRIOR_CENTER_BPM).log2() / PRIOR_STD_OCTAVES;
    (-0.5 * octaves * octaves).exp()
}

/// Convolve a lag profile with `LAG_KERNEL`, treating out-of-range lags as 0
fn smooth_across_lags(profile: &[f32]) -> Vec<f32> {
    let reach = LAG_KERNEL.len() / 2;
    (0..profile.len())
        .map(|lag| {
            LAG_KERNEL
                .iter()
                .enumerate()
                .filter_map(|(k, &w)| {
                    (lag + k)
                        .checked_sub(reach)
                        .and_then(|idx| profile.get(idx))
                        .map(|&v| v * w)
                })
                .sum()
        })
        .collect()
}

/// Sub-bin offset of a peak from a parabola through its neighbours (-0.5..0.5)
fn parabolic_offset(values: &[f32], idx: usize) -> f32 {
    if idx == 0 || idx + 1 >= values.len() {
        return 0.0;
    }
    let (a, b, c) = (values[idx - 1], values[idx], values[idx + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() <= EPSILON {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
}

/// Normalized autocorrelation of the envelope at one lag
fn correlation_at_lag(values: &[f32], lag: usize) -> f32 {
    if lag == 0 || lag >= values.len() {
        return 0.0;
    }

    let mut correlation = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..(values.len() - lag) {
        correlation += values[i] * values[i + lag];
        norm_a += values[i] * values[i];
        norm_b += values[i + lag] * values[i + lag];
    }

    let norm = (norm_a * norm_b).sqrt();
    if norm > 0.0 {
        correlation / norm
    } else {
        0.0
    }
}

/// Sharpen a period estimate using the largest multiple that fits in the envelope
///
/// Errors in the coarse period grow with the multiple, so the search radius
/// grows with it too. Falls back to the coarse period when the multiple shows
/// no periodicity.
fn refine_with_multiples(values: &[f32], period: f32) -> f32 {
    const MAX_MULTIPLE: usize = 8;
    let reach = LAG_KERNEL.len() / 2;

    let multiple = (2..=MAX_MULTIPLE).rev().find(|&k| {
        let radius = k.div_ceil(2) + 1;
        (period * k as f32).round() as usize + radius + reach < values.len() / 2
    });
    let Some(k) = multiple else {
        return period;
    };

    let radius = k.div_ceil(2) + 1;
    let center = (period * k as f32).round() as usize;
    let lo = center.saturating_sub(radius + reach).max(1);
    let hi = center + radius + reach;

    let raw: Vec<f32> = (lo..=hi).map(|lag| correlation_at_lag(values, lag)).collect();
    let smoothed = smooth_across_lags(&raw);

    // Only the inner window is trusted; the edges lack full kernel support
    let inner_lo = center.saturating_sub(radius).max(lo) - lo;
    let inner_hi = (center + radius - lo).min(smoothed.len() - 1);
    let Some((peak_idx, &peak)) = smoothed[inner_lo..=inner_hi]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, v)| (i + inner_lo, v))
    else {
        return period;
    };

    if peak < MIN_PERIODICITY {
        return period;
    }

    let peak_lag = (lo + peak_idx) as f32 + parabolic_offset(&smoothed, peak_idx);
    peak_lag / k as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_RATE: f32 = 22050.0 / 512.0;

    /// Spike train at `bpm`, one spike per beat, sampled at the envelope frame rate
    fn spike_envelope(bpm: f32, secs: f32) -> OnsetEnvelope {
        let n = (secs * FRAME_RATE) as usize;
        let period = FRAME_RATE * 60.0 / bpm;
        let mut values = vec![0.0f32; n];
        let mut beat = 0.0f32;
        while (beat.round() as usize) < n {
            values[beat.round() as usize] = 50.0;
            beat += period;
        }
        OnsetEnvelope {
            values,
            frame_rate: FRAME_RATE,
        }
    }

    #[test]
    fn test_prior_peaks_at_center() {
        assert!((tempo_prior(120.0) - 1.0).abs() < 1e-6);
        assert!(tempo_prior(60.0) < tempo_prior(100.0));
        assert!(tempo_prior(240.0) < tempo_prior(140.0));
        assert_eq!(tempo_prior(0.0), 0.0);
    }

    #[test]
    fn test_parabolic_offset() {
        // Symmetric peak: no offset
        assert_eq!(parabolic_offset(&[1.0, 2.0, 1.0], 1), 0.0);
        // Right neighbour stronger: peak shifts right
        assert!(parabolic_offset(&[1.0, 2.0, 1.8], 1) > 0.0);
        // Edges are left alone
        assert_eq!(parabolic_offset(&[2.0, 1.0], 0), 0.0);
    }

    #[test]
    fn test_smoothing_preserves_mass_in_interior() {
        let mut profile = vec![0.0f32; 20];
        profile[10] = 1.0;
        let smoothed = smooth_across_lags(&profile);
        let total: f32 = smoothed.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((smoothed[10] - 6.0 / 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_tempogram_shape_and_normalization() {
        let envelope = spike_envelope(120.0, 5.0);
        let estimator = TempoEstimator::new();
        let tempogram = estimator.tempogram(&envelope);

        assert_eq!(tempogram.columns.len(), envelope.len());
        for column in &tempogram.columns {
            assert_eq!(column.len(), TEMPOGRAM_WIN_LENGTH);
            let max = column.iter().cloned().fold(0.0f32, f32::max);
            assert!(max <= 1.0 + 1e-4);
        }
        let strength = tempogram.mean_strength();
        assert!(strength[0] > 0.9);
    }

    #[test]
    fn test_spike_train_tempo() {
        let estimator = TempoEstimator::new();
        for bpm in [90.0f32, 120.0, 128.0, 150.0] {
            let envelope = spike_envelope(bpm, 10.0);
            let tempogram = estimator.tempogram(&envelope);
            let estimate = estimator.estimate(&envelope, &tempogram);
            assert!(
                (estimate.bpm - bpm).abs() < 2.0,
                "expected ~{} BPM, got {}",
                bpm,
                estimate.bpm
            );
            assert!(estimate.periodicity >= MIN_PERIODICITY);
        }
    }

    #[test]
    fn test_silent_envelope_has_no_tempo() {
        let envelope = OnsetEnvelope {
            values: vec![0.0; 400],
            frame_rate: FRAME_RATE,
        };
        let estimator = TempoEstimator::new();
        let tempogram = estimator.tempogram(&envelope);
        let estimate = estimator.estimate(&envelope, &tempogram);
        assert_eq!(estimate.bpm, 0.0);
        assert_eq!(tempogram.peak_to_mean_ratio(), None);
    }

    #[test]
    fn test_single_onset_has_no_tempo() {
        let mut values = vec![0.0f32; 300];
        values[2] = 40.0;
        values[3] = 10.0;
        let envelope = OnsetEnvelope {
            values,
            frame_rate: FRAME_RATE,
        };
        let estimator = TempoEstimator::new();
        let tempogram = estimator.tempogram(&envelope);
        assert_eq!(estimator.estimate(&envelope, &tempogram).bpm, 0.0);
    }

    #[test]
    fn test_peak_to_mean_ratio_of_periodic_envelope() {
        let envelope = spike_envelope(120.0, 8.0);
        let tempogram = TempoEstimator::new().tempogram(&envelope);
        let ratio = tempogram.peak_to_mean_ratio().unwrap();
        assert!(ratio > 1.0);
    }
}
