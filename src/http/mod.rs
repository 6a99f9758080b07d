//! HTTP API for the presentation layer
//!
//! This module provides a REST API for driving capture sessions:
//! - POST /session/start - Start a session (microphone or file source)
//! - POST /session/pause - Suspend capture
//! - POST /session/resume - Resume capture
//! - POST /session/stop - Finalize and return transcript + notes
//! - GET /session/status - Poll elapsed time and state
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
