//! Framed STFT analysis shared by every downstream estimator
//!
//! One pass over the waveform produces, per frame:
//! - the magnitude spectrum (periodic Hann window, 2048-point FFT)
//! - spectral centroid and spectral flatness
//! - RMS of the raw (unwindowed) frame
//! - a 12-bin chroma vector folded from the linear FFT bins
//!
//! Frames are centered on `t * HOP_LENGTH` with zero padding at both ends, so
//! all time axes line up across features.

use crate::error::AnalysisError;
use crate::key::PitchClassHistogram;
use crate::waveform::Waveform;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Analysis window length in samples
pub const FRAME_LENGTH: usize = 2048;

/// Distance between frame centers in samples
pub const HOP_LENGTH: usize = 512;

/// Reference frequency for A4
const A4_FREQ: f32 = 440.0;

/// Chroma folding range: ~C2 up to the top of the melodic range
const CHROMA_MIN_FREQ: f32 = 65.0;
const CHROMA_MAX_FREQ: f32 = 4000.0;

/// Chroma bins below this fraction of the frame maximum are dropped, so
/// window leakage alone never decides a mode
pub const CHROMA_FLOOR: f32 = 0.05;

/// Floor applied to power values before taking logarithms
pub(crate) const POWER_FLOOR: f32 = 1e-10;

/// Time layout of the analysis frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGrid {
    pub frame_length: usize,
    pub hop_length: usize,
    pub n_frames: usize,
    pub sample_rate: u32,
}

impl FrameGrid {
    /// Grid covering `n_samples` samples (centered framing)
    pub fn for_samples(n_samples: usize, sample_rate: u32) -> Self {
        Self {
            frame_length: FRAME_LENGTH,
            hop_length: HOP_LENGTH,
            n_frames: 1 + n_samples / HOP_LENGTH,
            sample_rate,
        }
    }

    /// Frames per second
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop_length as f32
    }

    /// Number of magnitude bins per frame (DC through Nyquist)
    pub fn n_bins(&self) -> usize {
        self.frame_length / 2 + 1
    }

    /// Center frequency of a magnitude bin (Hz)
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.frame_length as f32
    }
}

/// Spectrum and scalar summaries of one analysis frame
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    /// Magnitude per bin (`FRAME_LENGTH / 2 + 1` values)
    pub magnitudes: Vec<f32>,
    /// Energy-weighted mean frequency (Hz)
    pub centroid: f32,
    /// Geometric/arithmetic mean ratio of the power spectrum (0.0 - 1.0)
    pub flatness: f32,
    /// Root-mean-square amplitude of the raw frame
    pub rms: f32,
    /// Pitch-class energies (C..B), scaled so the strongest class is 1.0
    pub chroma: [f32; 12],
}

/// All frames of one waveform
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub grid: FrameGrid,
    pub frames: Vec<SpectralFrame>,
}

impl Spectrogram {
    /// Mean spectral centroid across frames (Hz)
    pub fn mean_centroid(&self) -> f32 {
        mean(self.frames.iter().map(|f| f.centroid))
    }

    /// Mean spectral flatness across frames
    pub fn mean_flatness(&self) -> f32 {
        mean(self.frames.iter().map(|f| f.flatness))
    }

    /// Mean frame RMS
    pub fn mean_rms(&self) -> f32 {
        mean(self.frames.iter().map(|f| f.rms))
    }

    /// Chroma summed over every frame
    pub fn pitch_class_histogram(&self) -> PitchClassHistogram {
        let mut energies = [0.0f32; 12];
        for frame in &self.frames {
            for (acc, &value) in energies.iter_mut().zip(frame.chroma.iter()) {
                *acc += value;
            }
        }
        PitchClassHistogram::new(energies)
    }
}

/// STFT analyzer with precomputed window and pitch-class folding tables
pub struct SpectralAnalyzer {
    sample_rate: u32,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    /// Pitch class per magnitude bin (None outside the chroma range)
    bin_to_pitch_class: Vec<Option<u8>>,
    /// Folding weight per magnitude bin (detune and octave decay)
    bin_weights: Vec<f32>,
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralAnalyzer {
    /// Create an analyzer for the fixed analysis sample rate
    pub fn new() -> Self {
        Self::with_sample_rate(crate::ANALYSIS_SAMPLE_RATE)
    }

    fn with_sample_rate(sample_rate: u32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_LENGTH);

        // Periodic Hann window
        let window: Vec<f32> = (0..FRAME_LENGTH)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / FRAME_LENGTH as f32).cos()))
            .collect();

        let (bin_to_pitch_class, bin_weights) = Self::compute_pitch_class_mapping(sample_rate);

        Self {
            sample_rate,
            fft,
            window,
            bin_to_pitch_class,
            bin_weights,
        }
    }

    /// Map every magnitude bin to its nearest equal-tempered pitch class
    ///
    /// Bins sitting exactly on a semitone get weight 1.0, bins half a semitone
    /// away get 0.0. Above 500 Hz the weight also decays by ~3 dB per octave so
    /// upper harmonics do not outvote the fundamentals.
    fn compute_pitch_class_mapping(sample_rate: u32) -> (Vec<Option<u8>>, Vec<f32>) {
        let n_bins = FRAME_LENGTH / 2 + 1;
        let nyquist = sample_rate as f32 / 2.0;

        let mut mapping = Vec::with_capacity(n_bins);
        let mut weights = Vec::with_capacity(n_bins);

        for bin in 0..n_bins {
            let freq = bin as f32 * sample_rate as f32 / FRAME_LENGTH as f32;

            if freq < CHROMA_MIN_FREQ || freq > CHROMA_MAX_FREQ || freq >= nyquist {
                mapping.push(None);
                weights.push(0.0);
                continue;
            }

            // MIDI note number: 69 = A4
            let midi_note = 12.0 * (freq / A4_FREQ).log2() + 69.0;
            let exact_note = midi_note.round();
            let pitch_class = ((exact_note as i32 % 12 + 12) % 12) as u8;

            let detune = (midi_note - exact_note).abs();
            let detune_weight = (1.0 - detune.min(0.5) * 2.0).max(0.0);
            let octave_decay = (500.0 / freq.max(500.0)).sqrt();

            mapping.push(Some(pitch_class));
            weights.push(detune_weight * octave_decay);
        }

        (mapping, weights)
    }

    /// Run the STFT over a waveform
    ///
    /// Fails only on an empty waveform or non-finite input; degenerate frames
    /// yield zero summaries.
    pub fn analyze(&self, waveform: &Waveform) -> Result<Spectrogram, AnalysisError> {
        let samples = waveform.samples();
        if samples.is_empty() {
            return Err(AnalysisError::EmptyWaveform);
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(AnalysisError::NonFiniteSamples);
        }

        let grid = FrameGrid::for_samples(samples.len(), self.sample_rate);
        let mut frames = Vec::with_capacity(grid.n_frames);

        // Scratch buffers reused for every frame of this call
        let mut raw = vec![0.0f32; FRAME_LENGTH];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); FRAME_LENGTH];

        for t in 0..grid.n_frames {
            fill_centered_frame(samples, t * HOP_LENGTH, &mut raw);

            for ((slot, &s), &w) in buffer.iter_mut().zip(raw.iter()).zip(self.window.iter()) {
                *slot = Complex::new(s * w, 0.0);
            }
            self.fft.process(&mut buffer);

            let magnitudes: Vec<f32> = buffer[..grid.n_bins()].iter().map(|c| c.norm()).collect();

            frames.push(SpectralFrame {
                centroid: spectral_centroid(&magnitudes, &grid),
                flatness: spectral_flatness(&magnitudes),
                rms: frame_rms(&raw),
                chroma: self.fold_chroma(&magnitudes),
                magnitudes,
            });
        }

        tracing::debug!(
            frames = grid.n_frames,
            bins = grid.n_bins(),
            "computed spectrogram"
        );

        Ok(Spectrogram { grid, frames })
    }

    /// Fold a magnitude spectrum into 12 pitch classes (power-weighted)
    fn fold_chroma(&self, magnitudes: &[f32]) -> [f32; 12] {
        let mut chroma = [0.0f32; 12];

        for (bin, &magnitude) in magnitudes.iter().enumerate() {
            if let Some(pitch_class) = self.bin_to_pitch_class[bin] {
                chroma[pitch_class as usize] += magnitude * magnitude * self.bin_weights[bin];
            }
        }

        let max = chroma.iter().cloned().fold(0.0f32, f32::max);
        if max > 0.0 && max.is_finite() {
            for v in &mut chroma {
                *v /= max;
                if *v < CHROMA_FLOOR {
                    *v = 0.0;
                }
            }
        } else {
            chroma = [0.0; 12];
        }

        chroma
    }
}

/// Copy the frame centered on `center` into `out`, zero-padding outside the signal
fn fill_centered_frame(samples: &[f32], center: usize, out: &mut [f32]) {
    let half = out.len() / 2;
    for (i, slot) in out.iter_mut().enumerate() {
        let idx = (center + i).checked_sub(half);
        *slot = idx.and_then(|idx| samples.get(idx)).copied().unwrap_or(0.0);
    }
}

/// Energy-weighted mean frequency; 0.0 for a silent frame
pub fn spectral_centroid(magnitudes: &[f32], grid: &FrameGrid) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= 1e-10 {
        return 0.0;
    }
    let weighted: f32 = magnitudes
        .iter()
        .enumerate()
        .map(|(bin, &mag)| grid.bin_frequency(bin) * mag)
        .sum();
    weighted / total
}

/// Geometric-to-arithmetic mean ratio of the power spectrum
///
/// Low values mean a tonal (peaked) spectrum, values near 1.0 a noise-like one.
/// An all-zero frame yields 0.0.
pub fn spectral_flatness(magnitudes: &[f32]) -> f32 {
    if magnitudes.is_empty() || magnitudes.iter().all(|&m| m == 0.0) {
        return 0.0;
    }

    let n = magnitudes.len() as f64;
    let mut log_sum = 0.0f64;
    let mut sum = 0.0f64;
    for &mag in magnitudes {
        let power = (mag * mag).max(POWER_FLOOR) as f64;
        log_sum += power.ln();
        sum += power;
    }

    let geometric = (log_sum / n).exp();
    let arithmetic = sum / n;
    if arithmetic <= 0.0 || !geometric.is_finite() {
        return 0.0;
    }
    ((geometric / arithmetic) as f32).clamp(0.0, 1.0)
}

/// Root-mean-square of a raw frame
pub fn frame_rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let energy: f32 = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
    energy.sqrt()
}

fn mean(values: impl ExactSizeIterator<Item = f32>) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f32>() / n as f32
}
