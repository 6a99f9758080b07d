use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use super::Transcriber;
use crate::audio::AudioBuffer;

/// Response from the transcription service
#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    transcript: String,
}

/// Transcriber backed by the HTTP transcription service.
///
/// Uploads the session audio as a WAV file (multipart field `audio`) to
/// `POST {base_url}/api/upload-audio` and reads the `transcript` field of
/// the JSON response.
pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranscriber {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String> {
        let wav = audio.wav_bytes()?;

        info!(
            "Uploading {:.1}s of audio ({} bytes) for transcription",
            audio.duration().as_secs_f64(),
            wav.len()
        );

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .context("Failed to build multipart body")?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(format!("{}/api/upload-audio", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("Failed to reach transcription service")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Transcription service returned {}: {}", status, body);
        }

        let body: TranscriptResponse = response
            .json()
            .await
            .context("Invalid response from transcription service")?;

        info!("Transcript received ({} chars)", body.transcript.len());

        Ok(body.transcript)
    }
}
