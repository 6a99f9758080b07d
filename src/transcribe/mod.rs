//! Transcription collaborator: turns accumulated session audio into text

mod http;

use crate::audio::AudioBuffer;
use anyhow::Result;

pub use http::HttpTranscriber;

/// Speech-to-text seam for the session controller.
///
/// A failure here is terminal for the session; no retries are attempted.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the accumulated session audio
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String>;
}
