//! Segmented-capture session management
//!
//! This module provides the `SessionController` abstraction that manages:
//! - A bounded-duration, pausable capture loop on a background task
//! - Segment accumulation and active-duration accounting
//! - Handoff to the transcriber and notes generator on completion
//! - Non-blocking status/elapsed queries for the presentation layer

mod config;
mod controller;
mod error;
mod status;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionOutcome};
pub use error::SessionError;
pub use status::{SessionStats, SessionStatus};
