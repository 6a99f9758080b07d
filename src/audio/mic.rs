use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::source::{AudioSegment, AudioSource, CaptureError};

/// Chunk backlog limit between the capture thread and `capture()`. The
/// callback drops chunks once the queue is full, so audio nobody drains
/// (a long pause, a finished session) occupies bounded memory.
const CHUNK_QUEUE_LIMIT: usize = 256;

/// Configuration for the microphone source
#[derive(Debug, Clone)]
pub struct MicConfig {
    /// Input device name, or `None` for the system default
    pub device: Option<String>,
    /// Peak amplitude (0.0 to 1.0) below which a window counts as silence
    pub silence_threshold: f32,
}

impl Default for MicConfig {
    fn default() -> Self {
        Self {
            device: None,
            silence_threshold: 0.01,
        }
    }
}

/// Microphone capture source.
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread that
/// forwards mono i16 chunks over a channel. `capture` drains the channel
/// until the window deadline, then applies the silence check.
pub struct MicSource {
    config: MicConfig,
    chunk_rx: Option<mpsc::Receiver<Vec<i16>>>,
    /// Stop flag for the capture thread of the current run
    shutdown: Arc<AtomicBool>,
    sample_rate: u32,
}

impl MicSource {
    pub fn new(config: MicConfig) -> Self {
        Self {
            config,
            chunk_rx: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            sample_rate: 0,
        }
    }

    fn peak_amplitude(samples: &[i16]) -> f32 {
        samples
            .iter()
            .map(|&s| (s as f32 / 32768.0).abs())
            .fold(0.0, f32::max)
    }
}

#[async_trait::async_trait]
impl AudioSource for MicSource {
    async fn open(&mut self) -> Result<()> {
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE_LIMIT);
        let (ready_tx, ready_rx) = oneshot::channel();

        // Stop any thread from a previous run; this run gets its own flag
        self.shutdown.store(true, Ordering::SeqCst);
        self.shutdown = Arc::new(AtomicBool::new(false));

        let device_name = self.config.device.clone();
        let shutdown = Arc::clone(&self.shutdown);

        std::thread::spawn(move || {
            run_capture_thread(device_name, chunk_tx, ready_tx, shutdown);
        });

        let sample_rate = ready_rx
            .await
            .context("Capture thread exited before reporting readiness")?
            .map_err(|e| anyhow::anyhow!(e))?;

        info!("Microphone opened at {} Hz", sample_rate);

        self.sample_rate = sample_rate;
        self.chunk_rx = Some(chunk_rx);

        Ok(())
    }

    async fn capture(
        &mut self,
        max_duration: Duration,
    ) -> Result<Option<AudioSegment>, CaptureError> {
        let rx = self
            .chunk_rx
            .as_mut()
            .ok_or_else(|| CaptureError::Unavailable("microphone not opened".to_string()))?;

        // Discard audio buffered between capture windows; the stream keeps
        // producing while the session is paused and none of that may end up
        // in the recording or the active-duration accounting.
        while rx.try_recv().is_ok() {}

        let deadline = tokio::time::Instant::now() + max_duration;
        let mut samples = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(chunk)) => samples.extend_from_slice(&chunk),
                // Capture thread is gone: treat as end of input
                Ok(None) => {
                    if samples.is_empty() {
                        return Ok(None);
                    }
                    break;
                }
                // Window elapsed
                Err(_) => break,
            }
        }

        if samples.is_empty() || Self::peak_amplitude(&samples) < self.config.silence_threshold {
            return Err(CaptureError::NoSpeech(max_duration));
        }

        Ok(Some(AudioSegment {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        }))
    }

    async fn close(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.chunk_rx = None;
        info!("Microphone released");
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Get input device by name, or the default device
fn get_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    match device_name {
        Some(name) if name != "default" => {
            for device in host
                .input_devices()
                .context("Failed to enumerate input devices")?
            {
                if device.name().map(|n| n == name).unwrap_or(false) {
                    return Ok(device);
                }
            }
            anyhow::bail!("Input device not found: {}", name);
        }
        _ => host
            .default_input_device()
            .context("No default input device available"),
    }
}

/// Select an input configuration, preferring mono
fn select_input_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
    if let Ok(supported) = device.supported_input_configs() {
        for config_range in supported {
            if config_range.channels() == 1 {
                let supported_config = config_range.with_max_sample_rate();
                debug!(
                    "Selected mono config: {} Hz, format {:?}",
                    supported_config.sample_rate().0,
                    supported_config.sample_format()
                );
                return Ok((
                    supported_config.clone().into(),
                    supported_config.sample_format(),
                ));
            }
        }
    }

    // Fall back to default (first channel is taken in the callback)
    let supported_config = device
        .default_input_config()
        .context("No default input config")?;
    debug!(
        "Using default config: {} Hz, {} channels, format {:?}",
        supported_config.sample_rate().0,
        supported_config.channels(),
        supported_config.sample_format()
    );
    Ok((
        supported_config.clone().into(),
        supported_config.sample_format(),
    ))
}

/// Owns the cpal stream for the lifetime of a session.
///
/// Reports the device sample rate (or the open error) through `ready_tx`,
/// then parks until the shutdown flag is set.
fn run_capture_thread(
    device_name: Option<String>,
    chunk_tx: mpsc::Sender<Vec<i16>>,
    ready_tx: oneshot::Sender<std::result::Result<u32, String>>,
    shutdown: Arc<AtomicBool>,
) {
    let result = (|| -> Result<(cpal::Stream, u32)> {
        let device = get_device(device_name.as_deref())?;
        let (config, sample_format) = select_input_config(&device)?;

        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        info!(
            "Building input stream: {} Hz, {} channels, format {:?}",
            sample_rate, channels, sample_format
        );

        let error_callback = |err| {
            error!("Audio stream error: {}", err);
        };

        let stream = match sample_format {
            SampleFormat::F32 => {
                let tx = chunk_tx.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        let chunk: Vec<i16> = data
                            .chunks(channels)
                            .map(|frame| {
                                (frame[0].clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                            })
                            .collect();
                        // Queue full (nobody draining) or closed: drop the chunk
                        let _ = tx.try_send(chunk);
                    },
                    error_callback,
                    None,
                )
            }
            SampleFormat::I16 => {
                let tx = chunk_tx.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        let chunk: Vec<i16> =
                            data.chunks(channels).map(|frame| frame[0]).collect();
                        let _ = tx.try_send(chunk);
                    },
                    error_callback,
                    None,
                )
            }
            SampleFormat::U8 => {
                let tx = chunk_tx.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[u8], _| {
                        // u8 is unsigned: 0-255, with 128 as center
                        let chunk: Vec<i16> = data
                            .chunks(channels)
                            .map(|frame| ((frame[0] as i16) - 128) * 256)
                            .collect();
                        let _ = tx.try_send(chunk);
                    },
                    error_callback,
                    None,
                )
            }
            other => anyhow::bail!("Unsupported sample format: {:?}", other),
        }
        .context("Failed to build input stream")?;

        stream.play().context("Failed to start audio stream")?;

        Ok((stream, sample_rate))
    })();

    match result {
        Ok((stream, sample_rate)) => {
            if ready_tx.send(Ok(sample_rate)).is_err() {
                warn!("Microphone opened but the session is already gone");
                return;
            }

            while !shutdown.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(100));
            }

            drop(stream);
            info!("Microphone capture thread stopped");
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
        }
    }
}
