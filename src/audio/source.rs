use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// One bounded-duration unit of captured audio (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl AudioSegment {
    /// Wall-clock duration of this segment
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

/// Accumulated session audio, the concatenation of all captured segments
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    /// Concatenate captured segments into a single buffer.
    ///
    /// Returns `None` for an empty capture. All segments of a session come
    /// from one source, so the first segment's format is authoritative.
    pub fn concat(segments: &[AudioSegment]) -> Option<Self> {
        let first = segments.first()?;
        let total: usize = segments.iter().map(|s| s.samples.len()).sum();

        let mut samples = Vec::with_capacity(total);
        for segment in segments {
            samples.extend_from_slice(&segment.samples);
        }

        Some(Self {
            samples,
            sample_rate: first.sample_rate,
            channels: first.channels,
        })
    }

    /// Total duration of the buffer
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Encode the buffer as an in-memory WAV file (for the transcription upload)
    pub fn wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .context("Failed to create WAV writer")?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV")?;
        }

        Ok(cursor.into_inner())
    }

    /// Save the buffer as a WAV file on disk
    pub fn save_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create recordings directory")?;
        }

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
        for &sample in &self.samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV file")?;

        Ok(())
    }
}

/// Per-segment capture failures.
///
/// `NoSpeech` is recoverable: the session skips the segment and keeps
/// capturing. `Unavailable` outside of `open()` is logged and skipped too;
/// a source that cannot be opened at all fails the session at start.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no speech detected within {0:?}")]
    NoSpeech(Duration),
    #[error("audio source unavailable: {0}")]
    Unavailable(String),
}

/// Audio capture source trait
///
/// Implementations:
/// - `MicSource`: cpal microphone input
/// - `FileSource`: decoded audio file served in segment-sized slices
#[async_trait::async_trait]
pub trait AudioSource: Send {
    /// Initialize the underlying device or input.
    ///
    /// Called once before the first capture; a failure here is fatal for the
    /// session and is surfaced before it ever transitions to recording.
    async fn open(&mut self) -> Result<()>;

    /// Capture one segment of at most `max_duration`.
    ///
    /// Returns `Ok(None)` when the source has no more audio to give (end of
    /// a file); live sources never return `None`. Must return within roughly
    /// `max_duration`: stop and pause are cooperative and only take effect
    /// between segment requests.
    async fn capture(&mut self, max_duration: Duration)
        -> Result<Option<AudioSegment>, CaptureError>;

    /// Release the underlying device or input.
    ///
    /// Called once the capture loop exits, before finalization, so a live
    /// device is not left capturing while transcription runs. A subsequent
    /// `open` must make the source usable again.
    async fn close(&mut self) {}

    /// Source name for logging
    fn name(&self) -> &str;
}
