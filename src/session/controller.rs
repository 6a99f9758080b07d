use super::config::SessionConfig;
use super::error::SessionError;
use super::status::{SessionStats, SessionStatus};
use crate::audio::{AudioBuffer, AudioSegment, AudioSource, CaptureError};
use crate::notes::NotesGenerator;
use crate::transcribe::Transcriber;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Result of a finished session: the transcript and the generated notes
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub transcript: String,
    pub notes: String,
    /// Total active recording time (paused intervals contribute nothing)
    pub active_duration: Duration,
    pub segments_captured: usize,
}

/// Session state shared between the capture worker and command callers.
///
/// Everything the foreground reads concurrently with the loop is atomic, so
/// status polling never blocks the worker.
struct Shared {
    status: AtomicU8,
    active_ms: AtomicU64,
    segments_captured: AtomicUsize,
    /// Epoch milliseconds of the Idle -> Recording transition; 0 = unset
    started_at_ms: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            status: AtomicU8::new(SessionStatus::Idle.as_u8()),
            active_ms: AtomicU64::new(0),
            segments_captured: AtomicUsize::new(0),
            started_at_ms: AtomicU64::new(0),
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn set_status(&self, status: SessionStatus) {
        self.status.store(status.as_u8(), Ordering::SeqCst);
    }

    /// Transition `from` -> `to`; returns false if the state was not `from`
    fn transition(&self, from: SessionStatus, to: SessionStatus) -> bool {
        self.status
            .compare_exchange(
                from.as_u8(),
                to.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn active_duration(&self) -> Duration {
        Duration::from_millis(self.active_ms.load(Ordering::SeqCst))
    }
}

/// Manages one bounded-duration, pausable, segmented capture session.
///
/// A background worker drives the capture loop; the presentation layer calls
/// `start`/`pause`/`resume`/`stop` and polls `elapsed`/`stats` on its own
/// schedule. Cancellation is cooperative: pause and stop take effect at the
/// next segment boundary, bounded by the configured segment limit.
pub struct SessionController {
    config: SessionConfig,
    shared: Arc<Shared>,

    /// The audio source; taken by the worker for the duration of a run
    source: Arc<Mutex<Option<Box<dyn AudioSource>>>>,

    transcriber: Arc<dyn Transcriber>,
    notes_generator: Arc<dyn NotesGenerator>,

    /// Handle for the capture worker task
    worker: Mutex<Option<JoinHandle<Result<SessionOutcome, SessionError>>>>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        source: Box<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        notes_generator: Arc<dyn NotesGenerator>,
    ) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new()),
            source: Arc::new(Mutex::new(Some(source))),
            transcriber,
            notes_generator,
            worker: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Start the session: open the source and spawn the capture loop.
    ///
    /// Rejected with `AlreadyActive` if a session is running (never queued).
    /// A source that fails to open fails the start immediately and the
    /// session is never observed as recording.
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut slot = self.source.lock().await;
        let mut source = slot.take().ok_or(SessionError::AlreadyActive)?;

        if self.shared.status() != SessionStatus::Idle {
            *slot = Some(source);
            return Err(SessionError::AlreadyActive);
        }

        info!(
            "Starting session {} (source: {})",
            self.config.session_id,
            source.name()
        );

        if let Err(e) = source.open().await {
            *slot = Some(source);
            error!("Audio source failed to open: {:#}", e);
            return Err(SessionError::SourceUnavailable(format!("{:#}", e)));
        }

        self.shared.active_ms.store(0, Ordering::SeqCst);
        self.shared.segments_captured.store(0, Ordering::SeqCst);
        self.shared
            .started_at_ms
            .store(Utc::now().timestamp_millis() as u64, Ordering::SeqCst);

        if !self.shared.transition(SessionStatus::Idle, SessionStatus::Recording) {
            *slot = Some(source);
            return Err(SessionError::AlreadyActive);
        }
        drop(slot);

        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        let source_slot = Arc::clone(&self.source);
        let transcriber = Arc::clone(&self.transcriber);
        let notes_generator = Arc::clone(&self.notes_generator);

        let worker = tokio::spawn(async move {
            let segments = capture_loop(&config, &shared, &mut *source).await;

            // Release the device before the handoff: a live microphone must
            // not keep capturing while transcription runs
            source.close().await;

            // Hand the source back so the controller can run another session
            {
                let mut slot = source_slot.lock().await;
                *slot = Some(source);
            }

            finalize(&config, &shared, segments, transcriber, notes_generator).await
        });

        {
            let mut handle = self.worker.lock().await;
            *handle = Some(worker);
        }

        Ok(())
    }

    /// Suspend segment capture. No-op unless recording.
    pub fn pause(&self) {
        if self
            .shared
            .transition(SessionStatus::Recording, SessionStatus::Paused)
        {
            info!("Session {} paused", self.config.session_id);
        }
    }

    /// Resume segment capture. No-op unless paused.
    pub fn resume(&self) {
        if self
            .shared
            .transition(SessionStatus::Paused, SessionStatus::Recording)
        {
            info!("Session {} resumed", self.config.session_id);
        }
    }

    /// Request stop and wait for finalization.
    ///
    /// The in-flight segment request is not aborted; the loop exits at its
    /// next check point, so stopping takes at most one segment's duration.
    /// Also collects the outcome of a session that already finalized on its
    /// own (cap reached or source exhausted).
    pub async fn stop(&self) -> Result<SessionOutcome, SessionError> {
        let requested = self
            .shared
            .transition(SessionStatus::Recording, SessionStatus::Stopping)
            || self
                .shared
                .transition(SessionStatus::Paused, SessionStatus::Stopping);

        if requested {
            info!("Stop requested for session {}", self.config.session_id);
        }

        self.join_worker().await
    }

    /// Wait for the session to finalize without requesting a stop.
    ///
    /// Used for file-driven sessions, which end when the source is exhausted
    /// or the cap is reached.
    pub async fn wait(&self) -> Result<SessionOutcome, SessionError> {
        self.join_worker().await
    }

    async fn join_worker(&self) -> Result<SessionOutcome, SessionError> {
        let worker = {
            let mut handle = self.worker.lock().await;
            handle.take().ok_or(SessionError::NotActive)?
        };

        match worker.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Session worker panicked: {}", e);
                self.shared.set_status(SessionStatus::Failed);
                Err(SessionError::Worker(e.to_string()))
            }
        }
    }

    /// Current active duration and status.
    ///
    /// Lock-free; safe to call at any polling rate without blocking the
    /// capture loop. The controller does not depend on being polled.
    pub fn elapsed(&self) -> (Duration, SessionStatus) {
        (self.shared.active_duration(), self.shared.status())
    }

    /// Full point-in-time view for display
    pub fn stats(&self) -> SessionStats {
        let started_ms = self.shared.started_at_ms.load(Ordering::SeqCst);
        let started_at = if started_ms > 0 {
            DateTime::from_timestamp_millis(started_ms as i64)
        } else {
            None
        };

        SessionStats {
            session_id: self.config.session_id.clone(),
            status: self.shared.status(),
            active_secs: self.shared.active_duration().as_secs_f64(),
            segments_captured: self.shared.segments_captured.load(Ordering::SeqCst),
            started_at,
        }
    }

    /// Return a finished session to Idle once its outcome has been observed.
    /// Returns false if the session is not in a terminal state.
    pub fn reset(&self) -> bool {
        self.shared
            .transition(SessionStatus::Completed, SessionStatus::Idle)
            || self
                .shared
                .transition(SessionStatus::Failed, SessionStatus::Idle)
    }
}

/// The capture loop: request segments while recording, idle while paused,
/// exit on stop, cap, or source exhaustion.
async fn capture_loop(
    config: &SessionConfig,
    shared: &Shared,
    source: &mut dyn AudioSource,
) -> Vec<AudioSegment> {
    let mut segments: Vec<AudioSegment> = Vec::new();

    loop {
        match shared.status() {
            SessionStatus::Recording => {
                let active = shared.active_duration();
                if active >= config.cap {
                    info!(
                        "Session {} reached cap ({:.1}s active), finalizing",
                        config.session_id,
                        active.as_secs_f64()
                    );
                    break;
                }

                // Never ask for more than the cap has room for
                let window = config.segment_limit.min(config.cap - active);

                match source.capture(window).await {
                    Ok(Some(segment)) => {
                        let duration = segment.duration();
                        shared
                            .active_ms
                            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
                        segments.push(segment);
                        shared
                            .segments_captured
                            .store(segments.len(), Ordering::SeqCst);
                    }
                    Ok(None) => {
                        info!("Audio source exhausted, finalizing session");
                        break;
                    }
                    Err(CaptureError::NoSpeech(window)) => {
                        warn!(
                            "No speech detected within {:.1}s window, skipping segment",
                            window.as_secs_f64()
                        );
                    }
                    Err(e) => {
                        // Recoverable: skip this segment and keep capturing
                        error!("Segment capture failed, skipping: {}", e);
                    }
                }
            }
            SessionStatus::Paused => {
                // No segment requests and no duration accounting while paused
                tokio::time::sleep(config.pause_poll).await;
            }
            _ => break,
        }
    }

    segments
}

/// Finalization: concatenate segments, optionally persist the WAV, then hand
/// off to the transcriber and notes generator. Any failure here is terminal.
async fn finalize(
    config: &SessionConfig,
    shared: &Shared,
    segments: Vec<AudioSegment>,
    transcriber: Arc<dyn Transcriber>,
    notes_generator: Arc<dyn NotesGenerator>,
) -> Result<SessionOutcome, SessionError> {
    shared.set_status(SessionStatus::Stopping);

    let active_duration = shared.active_duration();

    let Some(buffer) = AudioBuffer::concat(&segments) else {
        error!("Session {} captured no audio", config.session_id);
        shared.set_status(SessionStatus::Failed);
        return Err(SessionError::EmptyCapture);
    };

    if let Some(dir) = &config.save_dir {
        let path = dir.join(format!("{}.wav", config.session_id));
        match buffer.save_wav(&path) {
            Ok(()) => info!("Session recording saved to {}", path.display()),
            // The recording on disk is a convenience, not part of the handoff
            Err(e) => warn!("Failed to save session recording: {:#}", e),
        }
    }

    info!(
        "Handing off {:.1}s of audio ({} segments) for transcription",
        buffer.duration().as_secs_f64(),
        segments.len()
    );

    let transcript = match transcriber.transcribe(&buffer).await {
        Ok(text) => text,
        Err(e) => {
            error!("Transcription failed: {:#}", e);
            shared.set_status(SessionStatus::Failed);
            return Err(SessionError::Transcription(format!("{:#}", e)));
        }
    };

    let notes = match notes_generator.generate(&transcript).await {
        Ok(notes) => notes,
        Err(e) => {
            error!("Notes generation failed: {:#}", e);
            shared.set_status(SessionStatus::Failed);
            return Err(SessionError::NotesGeneration(format!("{:#}", e)));
        }
    };

    shared.set_status(SessionStatus::Completed);
    info!(
        "Session {} completed: {:.1}s active, {} segments",
        config.session_id,
        active_duration.as_secs_f64(),
        segments.len()
    );

    Ok(SessionOutcome {
        session_id: config.session_id.clone(),
        transcript,
        notes,
        active_duration,
        segments_captured: segments.len(),
    })
}
