use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::MicConfig;
use crate::notes::NotesApiConfig;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionSettings,
    pub audio: AudioConfig,
    pub transcription: TranscriptionConfig,
    pub notes: NotesSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Maximum active recording time per session, in seconds
    pub cap_secs: u64,
    /// Maximum duration of one captured segment, in seconds
    pub segment_secs: u64,
    /// State re-check interval while paused, in milliseconds
    pub pause_poll_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name; default device if unset
    pub device: Option<String>,
    /// Peak amplitude below which a capture window counts as silence
    pub silence_threshold: f32,
    /// Where to save session WAVs; recordings are not kept if unset
    pub recordings_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL of the transcription service
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotesSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "transcript-notes".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5050,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cap_secs: 1800,
            segment_secs: 5,
            pause_poll_ms: 200,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            silence_threshold: 0.01,
            recordings_path: None,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
        }
    }
}

impl Default for NotesSettings {
    fn default() -> Self {
        let api = NotesApiConfig::default();
        Self {
            base_url: api.base_url,
            model: api.model,
            api_key_env: api.api_key_env,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            session: SessionSettings::default(),
            audio: AudioConfig::default(),
            transcription: TranscriptionConfig::default(),
            notes: NotesSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file (or any setting) is absent.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session configuration derived from the settings, with an optional
    /// caller-provided id and overrides.
    pub fn session_config(&self, session_id: Option<String>) -> SessionConfig {
        SessionConfig {
            session_id: session_id
                .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4())),
            cap: Duration::from_secs(self.session.cap_secs),
            segment_limit: Duration::from_secs(self.session.segment_secs),
            pause_poll: Duration::from_millis(self.session.pause_poll_ms),
            save_dir: self.audio.recordings_path.as_ref().map(PathBuf::from),
        }
    }

    /// Microphone configuration derived from the settings
    pub fn mic_config(&self) -> MicConfig {
        MicConfig {
            device: self.audio.device.clone(),
            silence_threshold: self.audio.silence_threshold,
        }
    }

    /// Notes API configuration derived from the settings
    pub fn notes_config(&self) -> NotesApiConfig {
        NotesApiConfig {
            base_url: self.notes.base_url.clone(),
            model: self.notes.model.clone(),
            api_key_env: self.notes.api_key_env.clone(),
        }
    }
}
