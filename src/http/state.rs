use crate::config::Config;
use crate::notes::NotesGenerator;
use crate::session::SessionController;
use crate::transcribe::Transcriber;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Collaborators handed to every session
    pub transcriber: Arc<dyn Transcriber>,
    pub notes_generator: Arc<dyn NotesGenerator>,

    /// The active session, if any (at most one at a time)
    pub session: Arc<RwLock<Option<Arc<SessionController>>>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        transcriber: Arc<dyn Transcriber>,
        notes_generator: Arc<dyn NotesGenerator>,
    ) -> Self {
        Self {
            config,
            transcriber,
            notes_generator,
            session: Arc::new(RwLock::new(None)),
        }
    }
}
