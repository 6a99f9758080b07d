use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionStatus {
    /// No session running
    Idle = 0,
    /// Capture loop is requesting segments
    Recording = 1,
    /// Capture suspended; active duration frozen
    Paused = 2,
    /// Stop requested; loop exits at the next check point
    Stopping = 3,
    /// Audio handed off and notes generated successfully
    Completed = 4,
    /// Terminal error (empty capture, transcription or notes failure)
    Failed = 5,
}

impl SessionStatus {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Recording,
            2 => Self::Paused,
            3 => Self::Stopping,
            4 => Self::Completed,
            5 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// Whether a session in this state is still running (capturing or paused)
    pub fn is_active(self) -> bool {
        matches!(self, Self::Recording | Self::Paused | Self::Stopping)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a session, safe to poll while the capture loop runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier
    pub session_id: String,

    /// Current lifecycle state
    pub status: SessionStatus,

    /// Active recording time in seconds (excludes paused intervals)
    pub active_secs: f64,

    /// Number of segments captured so far
    pub segments_captured: usize,

    /// When the session transitioned to recording, if it has
    pub started_at: Option<DateTime<Utc>>,
}
