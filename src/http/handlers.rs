use super::state::AppState;
use crate::audio::{AudioSource, FileSource, MicSource};
use crate::session::{SessionController, SessionError, SessionStats};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// "microphone" (default) or "file"
    pub source: Option<String>,

    /// Audio file path (required when source = "file")
    pub path: Option<String>,

    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    /// Override for the active-duration cap, in seconds
    pub cap_secs: Option<u64>,

    /// Override for the per-segment limit, in seconds
    pub segment_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub transcript: String,
    pub notes: String,
    pub active_secs: f64,
    pub segments_captured: usize,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub session_id: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start a new capture session
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    // Build the source before touching the session slot: decoding a long
    // recording is blocking work and must not stall other requests
    let source: Box<dyn AudioSource> = match req.source.as_deref().unwrap_or("microphone") {
        "microphone" => Box::new(MicSource::new(state.config.mic_config())),
        "file" => {
            let Some(path) = req.path.clone() else {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "source \"file\" requires a path",
                );
            };
            let decoded =
                tokio::task::spawn_blocking(move || FileSource::open_path(&path)).await;
            match decoded {
                Ok(Ok(source)) => Box::new(source),
                Ok(Err(e)) => {
                    error!("Failed to open audio file: {:#}", e);
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to open audio file: {:#}", e),
                    );
                }
                Err(e) => {
                    error!("Audio decode task failed: {}", e);
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Audio decode task failed",
                    );
                }
            }
        }
        other => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Unknown source: {}", other),
            );
        }
    };

    // Hold the slot for the admission itself so two concurrent starts cannot
    // both get in; a start request is rejected, never queued
    let mut slot = state.session.write().await;
    if let Some(active) = slot.as_ref() {
        if active.elapsed().1.is_active() {
            return error_response(
                StatusCode::CONFLICT,
                format!("Session {} is already running", active.session_id()),
            );
        }
    }

    let mut config = state.config.session_config(req.session_id);
    if let Some(cap_secs) = req.cap_secs {
        config.cap = std::time::Duration::from_secs(cap_secs);
    }
    if let Some(segment_secs) = req.segment_secs {
        config.segment_limit = std::time::Duration::from_secs(segment_secs);
    }

    let session_id = config.session_id.clone();
    info!("Starting session: {}", session_id);

    let controller = Arc::new(SessionController::new(
        config,
        source,
        Arc::clone(&state.transcriber),
        Arc::clone(&state.notes_generator),
    ));

    if let Err(e) = controller.start().await {
        error!("Failed to start session: {}", e);
        let status = match e {
            SessionError::AlreadyActive => StatusCode::CONFLICT,
            SessionError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        return error_response(status, e.to_string());
    }

    *slot = Some(controller);
    drop(slot);

    info!("Session started: {}", session_id);

    (
        StatusCode::OK,
        Json(StartSessionResponse {
            session_id: session_id.clone(),
            status: "recording".to_string(),
            message: format!("Session {} started", session_id),
        }),
    )
        .into_response()
}

/// POST /session/pause
/// Suspend segment capture (no-op unless recording)
pub async fn pause_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;

    match session.as_ref() {
        Some(session) => {
            session.pause();
            (
                StatusCode::OK,
                Json(CommandResponse {
                    session_id: session.session_id().to_string(),
                    stats: session.stats(),
                }),
            )
                .into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "No session is running"),
    }
}

/// POST /session/resume
/// Resume segment capture (no-op unless paused)
pub async fn resume_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;

    match session.as_ref() {
        Some(session) => {
            session.resume();
            (
                StatusCode::OK,
                Json(CommandResponse {
                    session_id: session.session_id().to_string(),
                    stats: session.stats(),
                }),
            )
                .into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "No session is running"),
    }
}

/// POST /session/stop
/// Stop the session, wait for finalization, and return transcript + notes
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = {
        let mut slot = state.session.write().await;
        slot.take()
    };

    let Some(session) = session else {
        return error_response(StatusCode::NOT_FOUND, "No session is running");
    };

    info!("Stopping session: {}", session.session_id());

    match session.stop().await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(StopSessionResponse {
                session_id: outcome.session_id,
                status: "completed".to_string(),
                transcript: outcome.transcript,
                notes: outcome.notes,
                active_secs: outcome.active_duration.as_secs_f64(),
                segments_captured: outcome.segments_captured,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Session failed: {}", e);
            let status = match e {
                SessionError::EmptyCapture => StatusCode::UNPROCESSABLE_ENTITY,
                SessionError::NotActive => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, e.to_string())
        }
    }
}

/// GET /session/status
/// Non-blocking view of the active session
pub async fn session_status(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;

    match session.as_ref() {
        Some(session) => (StatusCode::OK, Json(session.stats())).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No session is running"),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
