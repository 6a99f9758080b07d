//! Notes collaborator: turns a transcript into formatted Markdown notes

mod chat;

use anyhow::Result;

pub use chat::{ChatNotesGenerator, NotesApiConfig};

/// Notes-generation seam for the session controller.
///
/// A failure here is terminal for the session; no retries are attempted.
#[async_trait::async_trait]
pub trait NotesGenerator: Send + Sync {
    /// Generate formatted notes from a transcript
    async fn generate(&self, transcript: &str) -> Result<String>;
}
