use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-2026-08-24-standup")
    pub session_id: String,

    /// Maximum active (non-paused) recording time before auto-finalization.
    /// Default: 1800 seconds (30 minutes)
    pub cap: Duration,

    /// Maximum duration of a single captured segment.
    /// Also bounds how long pause/stop can take to bite mid-capture.
    /// Default: 5 seconds
    pub segment_limit: Duration,

    /// How often the loop re-checks state while paused
    pub pause_poll: Duration,

    /// Directory to save the session WAV into before handoff, if any
    pub save_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            cap: Duration::from_secs(1800), // 30 minutes of active recording
            segment_limit: Duration::from_secs(5),
            pause_poll: Duration::from_millis(200),
            save_dir: None,
        }
    }
}
