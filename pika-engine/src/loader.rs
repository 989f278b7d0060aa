//! Audio file loading, downmixing, and resampling to the analysis format

use pika_analysis::{Waveform, ANALYSIS_SAMPLE_RATE, MAX_DURATION_SECS};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Frames per resampler chunk
const RESAMPLE_CHUNK: usize = 1024;

/// Errors that can occur while producing a waveform
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("No audio samples could be decoded")]
    NoSamples,
    #[error("Invalid stream layout: {0}")]
    InvalidLayout(String),
    #[error("Failed to decode audio: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// Produces mono 22050 Hz waveforms from files or raw sample buffers
#[derive(Debug, Clone)]
pub struct WaveformLoader {
    max_duration_secs: f32,
}

impl Default for WaveformLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformLoader {
    /// Loader keeping the first 60 seconds
    pub fn new() -> Self {
        Self::with_max_duration(MAX_DURATION_SECS)
    }

    /// Loader keeping at most `max_duration_secs` (capped at 60)
    pub fn with_max_duration(max_duration_secs: f32) -> Self {
        Self {
            max_duration_secs: max_duration_secs.clamp(0.0, MAX_DURATION_SECS),
        }
    }

    pub fn max_duration_secs(&self) -> f32 {
        self.max_duration_secs
    }

    /// Decode an audio file into an analysis waveform
    pub fn load(&self, path: &Path) -> Result<Waveform, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_rate = codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("unknown sample rate".into()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        // Only the analysis prefix is decoded
        let frame_limit = (self.max_duration_secs as f64 * source_rate as f64).ceil() as usize;
        let mut mono: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(symphonia::core::errors::Error::ResetRequired) => break,
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                // Corrupt packets are skipped; the rest of the stream may be fine
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    tracing::debug!(error = e, "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            downmix_into(sample_buf.samples(), channels, &mut mono);

            if mono.len() >= frame_limit {
                break;
            }
        }

        mono.truncate(frame_limit);
        if mono.is_empty() {
            return Err(LoadError::NoSamples);
        }

        tracing::debug!(
            path = %path.display(),
            source_rate,
            frames = mono.len(),
            "decoded audio prefix"
        );

        self.finish(mono, source_rate)
    }

    /// Build a waveform from a pre-decoded interleaved buffer
    pub fn from_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
    ) -> Result<Waveform, LoadError> {
        if sample_rate == 0 {
            return Err(LoadError::InvalidLayout("sample rate must be positive".into()));
        }
        if channels == 0 {
            return Err(LoadError::InvalidLayout("channel count must be positive".into()));
        }

        let mut mono = Vec::with_capacity(samples.len() / channels as usize);
        downmix_into(samples, channels as usize, &mut mono);

        let frame_limit = (self.max_duration_secs as f64 * sample_rate as f64).ceil() as usize;
        mono.truncate(frame_limit);

        self.finish(mono, sample_rate)
    }

    /// Resample to the analysis rate and apply the duration cap
    fn finish(&self, mono: Vec<f32>, source_rate: u32) -> Result<Waveform, LoadError> {
        let mono = if source_rate != ANALYSIS_SAMPLE_RATE && !mono.is_empty() {
            resample(&mono, source_rate, ANALYSIS_SAMPLE_RATE)?
        } else {
            mono
        };
        Ok(Waveform::with_max_duration(mono, self.max_duration_secs))
    }
}

/// Average interleaved channels into mono, appending to `out`
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Resample a mono buffer with a band-limited FFT resampler
///
/// The output is aligned with the input: the filter delay is skipped at the
/// start and flushed with zero chunks at the end.
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        1,
    )
    .map_err(|e| LoadError::Resample(e.to_string()))?;

    let chunk_size = resampler.input_frames_next();
    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * target_rate as u64 / source_rate as u64) as usize;
    let mut output: Vec<f32> = Vec::with_capacity(delay + expected + 2 * chunk_size);

    let mut chunks = samples.chunks_exact(chunk_size);
    for chunk in &mut chunks {
        let resampled = resampler
            .process(&[chunk], None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        output.extend_from_slice(&resampled[0]);
    }

    let mut tail = chunks.remainder().to_vec();
    tail.resize(chunk_size, 0.0);
    let zeros = vec![0.0f32; chunk_size];
    let mut next: &[f32] = &tail;
    while output.len() < delay + expected {
        let resampled = resampler
            .process(&[next], None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        output.extend_from_slice(&resampled[0]);
        next = &zeros;
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}
