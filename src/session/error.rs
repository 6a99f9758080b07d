use thiserror::Error;

/// Terminal and admission errors for a capture session.
///
/// Per-segment conditions (no speech, transient source trouble) are not
/// represented here; they are skipped inside the capture loop and the session
/// continues. Nothing in this taxonomy is retried automatically.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already running")]
    AlreadyActive,

    #[error("no session is running")]
    NotActive,

    #[error("audio source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("no audio recorded")]
    EmptyCapture,

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("notes generation failed: {0}")]
    NotesGeneration(String),

    #[error("session worker failed: {0}")]
    Worker(String),
}
