pub mod audio;
pub mod config;
pub mod http;
pub mod notes;
pub mod session;
pub mod transcribe;

pub use audio::{
    AudioBuffer, AudioFile, AudioSegment, AudioSource, CaptureError, FileSource, MicConfig,
    MicSource,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use notes::{ChatNotesGenerator, NotesApiConfig, NotesGenerator};
pub use session::{
    SessionConfig, SessionController, SessionError, SessionOutcome, SessionStats, SessionStatus,
};
pub use transcribe::{HttpTranscriber, Transcriber};
