use anyhow::{Context, Result};
use hound::WavReader;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{info, warn};

use super::source::{AudioSegment, AudioSource, CaptureError};

/// A fully decoded audio file
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    /// Open and decode an audio file.
    ///
    /// WAV goes through hound; everything else (MP3, M4A, FLAC, OGG) through
    /// symphonia.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);

        let (samples, sample_rate, channels) = if is_wav {
            Self::decode_wav(path)?
        } else {
            Self::decode_compressed(path)?
        };

        let duration_seconds =
            samples.len() as f64 / (sample_rate as f64 * channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            sample_rate,
            channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate,
            channels,
            samples,
        })
    }

    fn decode_wav(path: &Path) -> Result<(Vec<i16>, u32, u16)> {
        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        Ok((samples, spec.sample_rate, spec.channels))
    }

    fn decode_compressed(path: &Path) -> Result<(Vec<i16>, u32, u16)> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
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
            .context("Unsupported or corrupt audio format")?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No audio track found")?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create decoder")?;

        let mut samples: Vec<i16> = Vec::new();
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;

                    let mut buf =
                        SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            }
        }

        anyhow::ensure!(!samples.is_empty(), "Audio file contains no samples");
        anyhow::ensure!(sample_rate > 0 && channels > 0, "Missing audio format info");

        Ok((samples, sample_rate, channels))
    }

    /// Downmix to mono by averaging channels
    pub fn to_mono(&self) -> Vec<i16> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        let channels = self.channels as usize;
        let mut mono = Vec::with_capacity(self.samples.len() / channels);

        for frame in self.samples.chunks_exact(channels) {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            mono.push((sum / channels as i32) as i16);
        }

        mono
    }
}

/// Audio source backed by a decoded file, served in segment-sized slices.
///
/// Used for the "select audio file" flow and for batch transcription; returns
/// `Ok(None)` when the file is exhausted so the session finalizes on its own.
pub struct FileSource {
    samples: Vec<i16>,
    sample_rate: u32,
    cursor: usize,
    name: String,
}

impl FileSource {
    pub fn new(file: &AudioFile) -> Self {
        Self {
            samples: file.to_mono(),
            sample_rate: file.sample_rate,
            cursor: 0,
            name: format!("file:{}", file.path),
        }
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = AudioFile::open(path)?;
        Ok(Self::new(&file))
    }
}

#[async_trait::async_trait]
impl AudioSource for FileSource {
    async fn open(&mut self) -> Result<()> {
        anyhow::ensure!(!self.samples.is_empty(), "Audio file contains no samples");
        Ok(())
    }

    async fn capture(
        &mut self,
        max_duration: Duration,
    ) -> Result<Option<AudioSegment>, CaptureError> {
        if self.cursor >= self.samples.len() {
            return Ok(None);
        }

        let max_samples =
            (max_duration.as_secs_f64() * self.sample_rate as f64).ceil() as usize;
        let end = (self.cursor + max_samples.max(1)).min(self.samples.len());

        let segment = AudioSegment {
            samples: self.samples[self.cursor..end].to_vec(),
            sample_rate: self.sample_rate,
            channels: 1,
        };
        self.cursor = end;

        Ok(Some(segment))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
