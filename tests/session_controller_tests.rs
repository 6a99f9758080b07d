// Integration tests for the capture session controller
//
// These tests drive the controller with scripted audio sources and stub
// transcription/notes collaborators, and verify the state machine, the
// active-duration accounting, and the finalization handoff.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use transcript_notes::{
    AudioBuffer, AudioSegment, AudioSource, CaptureError, NotesGenerator, SessionConfig,
    SessionController, SessionError, SessionStatus, Transcriber,
};

// ============================================================================
// Stubs
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Step {
    /// A successful segment of the given duration in seconds
    Segment(u64),
    /// A no-speech window
    NoSpeech,
}

/// 1 kHz mono keeps segment durations exact without large buffers
fn segment_of(secs: u64) -> AudioSegment {
    AudioSegment {
        samples: vec![0i16; (secs * 1000) as usize],
        sample_rate: 1000,
        channels: 1,
    }
}

/// Source that replays a fixed script, then reports end of input
struct ScriptedSource {
    steps: VecDeque<Step>,
    close_calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn new(steps: &[Step]) -> Self {
        Self {
            steps: steps.iter().copied().collect(),
            close_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl AudioSource for ScriptedSource {
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn capture(
        &mut self,
        max_duration: Duration,
    ) -> Result<Option<AudioSegment>, CaptureError> {
        match self.steps.pop_front() {
            Some(Step::Segment(secs)) => Ok(Some(segment_of(secs))),
            Some(Step::NoSpeech) => Err(CaptureError::NoSpeech(max_duration)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Source driven step-by-step from the test over a channel.
///
/// An idle window behaves like a live microphone with nobody talking: the
/// capture request returns NoSpeech after a short timeout, which keeps the
/// loop cycling through its state check points.
struct ControlledSource {
    rx: mpsc::UnboundedReceiver<Step>,
}

impl ControlledSource {
    fn new() -> (mpsc::UnboundedSender<Step>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait::async_trait]
impl AudioSource for ControlledSource {
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn capture(
        &mut self,
        max_duration: Duration,
    ) -> Result<Option<AudioSegment>, CaptureError> {
        match tokio::time::timeout(Duration::from_millis(50), self.rx.recv()).await {
            Ok(Some(Step::Segment(secs))) => Ok(Some(segment_of(secs))),
            Ok(Some(Step::NoSpeech)) => Err(CaptureError::NoSpeech(max_duration)),
            Ok(None) => Ok(None),
            Err(_) => Err(CaptureError::NoSpeech(max_duration)),
        }
    }

    fn name(&self) -> &str {
        "controlled"
    }
}

/// Source whose device cannot be opened
struct BrokenSource;

#[async_trait::async_trait]
impl AudioSource for BrokenSource {
    async fn open(&mut self) -> Result<()> {
        anyhow::bail!("no capture device found")
    }

    async fn capture(
        &mut self,
        _max_duration: Duration,
    ) -> Result<Option<AudioSegment>, CaptureError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "broken"
    }
}

struct StubTranscriber {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl StubTranscriber {
    fn new(fail: bool) -> (Arc<AtomicUsize>, Arc<Self>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Arc::clone(&calls),
            Arc::new(Self { calls, fail }),
        )
    }
}

#[async_trait::async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("stt backend exploded");
        }
        Ok(format!(
            "transcript of {:.0}s",
            audio.duration().as_secs_f64()
        ))
    }
}

struct StubNotes {
    fail: bool,
}

#[async_trait::async_trait]
impl NotesGenerator for StubNotes {
    async fn generate(&self, transcript: &str) -> Result<String> {
        if self.fail {
            anyhow::bail!("llm quota exceeded");
        }
        Ok(format!("# Notes\n{}", transcript))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn test_config(cap_secs: u64, segment_secs: u64) -> SessionConfig {
    SessionConfig {
        session_id: "test-session".to_string(),
        cap: Duration::from_secs(cap_secs),
        segment_limit: Duration::from_secs(segment_secs),
        pause_poll: Duration::from_millis(10),
        save_dir: None,
    }
}

fn controller(
    config: SessionConfig,
    source: impl AudioSource + 'static,
    transcriber_fail: bool,
    notes_fail: bool,
) -> (Arc<AtomicUsize>, SessionController) {
    let (calls, transcriber) = StubTranscriber::new(transcriber_fail);
    let notes = Arc::new(StubNotes { fail: notes_fail });
    (
        calls,
        SessionController::new(config, Box::new(source), transcriber, notes),
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Timed out waiting for {}", what);
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn cap_auto_finalizes_without_stop() -> Result<()> {
    // cap=10s, segment_limit=5s: two 5s segments fill the cap; the third
    // scripted segment must never be requested.
    let config = test_config(10, 5);
    let (calls, session) = controller(
        config,
        ScriptedSource::new(&[Step::Segment(5), Step::Segment(5), Step::Segment(5)]),
        false,
        false,
    );

    session.start().await?;
    let outcome = session.wait().await?;

    assert_eq!(outcome.active_duration, Duration::from_secs(10));
    assert_eq!(outcome.segments_captured, 2);
    assert_eq!(outcome.transcript, "transcript of 10s");
    assert_eq!(outcome.notes, "# Notes\ntranscript of 10s");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "One handoff, no retries");
    assert_eq!(session.elapsed().1, SessionStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn start_while_active_is_rejected() -> Result<()> {
    let (_tx, source) = ControlledSource::new();
    let (_calls, session) = controller(test_config(1800, 5), source, false, false);

    session.start().await?;
    wait_until(
        || session.elapsed().1 == SessionStatus::Recording,
        "recording state",
    )
    .await;

    let stats_before = session.stats();
    let second = session.start().await;
    assert!(matches!(second, Err(SessionError::AlreadyActive)));

    // Session state is unchanged by the rejected start
    let stats_after = session.stats();
    assert_eq!(stats_after.status, SessionStatus::Recording);
    assert_eq!(stats_after.active_secs, stats_before.active_secs);
    assert_eq!(stats_after.segments_captured, stats_before.segments_captured);

    Ok(())
}

#[tokio::test]
async fn stop_with_no_segments_fails_with_empty_capture() -> Result<()> {
    let (_tx, source) = ControlledSource::new();
    let (calls, session) = controller(test_config(1800, 5), source, false, false);

    session.start().await?;
    let result = session.stop().await;

    assert!(matches!(result, Err(SessionError::EmptyCapture)));
    assert_eq!(session.elapsed().1, SessionStatus::Failed);
    assert_eq!(
        calls.load(Ordering::SeqCst),
        0,
        "Transcriber must not be invoked for an empty capture"
    );

    Ok(())
}

#[tokio::test]
async fn pause_freezes_active_duration() -> Result<()> {
    let (tx, source) = ControlledSource::new();
    let (_calls, session) = controller(test_config(1800, 5), source, false, false);

    session.start().await?;
    session.pause();
    assert_eq!(session.elapsed().1, SessionStatus::Paused);

    // Let any in-flight capture window expire, then offer audio while paused:
    // the loop must not request it and the clock must not move.
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(Step::Segment(5))?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = session.stats();
    assert_eq!(stats.status, SessionStatus::Paused);
    assert_eq!(stats.active_secs, 0.0, "Paused intervals contribute nothing");
    assert_eq!(stats.segments_captured, 0);

    session.resume();
    wait_until(
        || session.stats().segments_captured == 1,
        "segment after resume",
    )
    .await;

    let outcome = session.stop().await?;
    assert_eq!(outcome.active_duration, Duration::from_secs(5));
    assert_eq!(outcome.segments_captured, 1);
    assert_eq!(session.elapsed().1, SessionStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn stop_from_paused_finalizes_captured_segments() -> Result<()> {
    let (tx, source) = ControlledSource::new();
    let (calls, session) = controller(test_config(1800, 5), source, false, false);

    session.start().await?;
    tx.send(Step::Segment(5))?;
    wait_until(
        || session.stats().segments_captured == 1,
        "first segment",
    )
    .await;

    session.pause();
    assert_eq!(session.elapsed().1, SessionStatus::Paused);

    // Stop straight from Paused, without resuming first
    let outcome = session.stop().await?;
    assert_eq!(outcome.active_duration, Duration::from_secs(5));
    assert_eq!(outcome.segments_captured, 1);
    assert_eq!(outcome.transcript, "transcript of 5s");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.elapsed().1, SessionStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn source_is_released_once_the_loop_exits() -> Result<()> {
    // The device must be released even when the session finalizes on its
    // own (cap reached) with nobody calling stop.
    let source = ScriptedSource::new(&[Step::Segment(5), Step::Segment(5)]);
    let close_calls = Arc::clone(&source.close_calls);
    let (_calls, session) = controller(test_config(10, 5), source, false, false);

    session.start().await?;
    session.wait().await?;
    assert_eq!(session.elapsed().1, SessionStatus::Completed);
    assert_eq!(close_calls.load(Ordering::SeqCst), 1);

    // The released source is re-opened for the next run and released again
    assert!(session.reset());
    session.start().await?;
    let rerun = session.wait().await;
    assert!(matches!(rerun, Err(SessionError::EmptyCapture)));
    assert_eq!(close_calls.load(Ordering::SeqCst), 2);

    Ok(())
}

#[tokio::test]
async fn pause_and_resume_are_noops_in_other_states() -> Result<()> {
    let (_calls, session) = controller(
        test_config(1800, 5),
        ScriptedSource::new(&[]),
        false,
        false,
    );

    // Idle: neither command does anything
    session.pause();
    assert_eq!(session.elapsed().1, SessionStatus::Idle);
    session.resume();
    assert_eq!(session.elapsed().1, SessionStatus::Idle);

    Ok(())
}

#[tokio::test]
async fn no_speech_windows_are_skipped_not_fatal() -> Result<()> {
    let (_calls, session) = controller(
        test_config(1800, 5),
        ScriptedSource::new(&[Step::NoSpeech, Step::Segment(5), Step::NoSpeech]),
        false,
        false,
    );

    session.start().await?;
    let outcome = session.wait().await?;

    assert_eq!(outcome.segments_captured, 1);
    assert_eq!(outcome.active_duration, Duration::from_secs(5));
    assert_eq!(session.elapsed().1, SessionStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn transcription_error_is_terminal_and_verbatim() -> Result<()> {
    let (_calls, session) = controller(
        test_config(1800, 5),
        ScriptedSource::new(&[Step::Segment(5)]),
        true,
        false,
    );

    session.start().await?;
    let result = session.wait().await;

    match result {
        Err(SessionError::Transcription(msg)) => {
            assert!(msg.contains("stt backend exploded"), "got: {}", msg);
        }
        other => panic!("Expected transcription error, got {:?}", other.map(|o| o.session_id)),
    }
    assert_eq!(session.elapsed().1, SessionStatus::Failed);

    Ok(())
}

#[tokio::test]
async fn notes_error_is_terminal() -> Result<()> {
    let (calls, session) = controller(
        test_config(1800, 5),
        ScriptedSource::new(&[Step::Segment(5)]),
        false,
        true,
    );

    session.start().await?;
    let result = session.wait().await;

    match result {
        Err(SessionError::NotesGeneration(msg)) => {
            assert!(msg.contains("llm quota exceeded"), "got: {}", msg);
        }
        other => panic!("Expected notes error, got {:?}", other.map(|o| o.session_id)),
    }
    assert_eq!(session.elapsed().1, SessionStatus::Failed);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "Transcription ran exactly once");

    Ok(())
}

#[tokio::test]
async fn unavailable_source_fails_start_immediately() -> Result<()> {
    let (calls, session) = controller(test_config(1800, 5), BrokenSource, false, false);

    let result = session.start().await;

    match result {
        Err(SessionError::SourceUnavailable(msg)) => {
            assert!(msg.contains("no capture device found"), "got: {}", msg);
        }
        other => panic!("Expected source error, got {:?}", other),
    }
    assert_eq!(
        session.elapsed().1,
        SessionStatus::Idle,
        "Session must never be observed as recording"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn reset_returns_finished_session_to_idle() -> Result<()> {
    let (_calls, session) = controller(
        test_config(1800, 5),
        ScriptedSource::new(&[Step::Segment(3)]),
        false,
        false,
    );

    // Not resettable while idle or running
    assert!(!session.reset());

    session.start().await?;
    let outcome = session.wait().await?;
    assert_eq!(outcome.segments_captured, 1);
    assert_eq!(session.elapsed().1, SessionStatus::Completed);

    assert!(session.reset());
    assert_eq!(session.elapsed().1, SessionStatus::Idle);

    Ok(())
}

#[tokio::test]
async fn session_recording_is_saved_when_configured() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;

    let mut config = test_config(1800, 5);
    config.save_dir = Some(temp_dir.path().to_path_buf());

    let (_calls, session) = controller(
        config,
        ScriptedSource::new(&[Step::Segment(2)]),
        false,
        false,
    );

    session.start().await?;
    session.wait().await?;

    let wav_path = temp_dir.path().join("test-session.wav");
    assert!(wav_path.exists(), "Session WAV should be saved");

    let reader = hound::WavReader::open(&wav_path)?;
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 1000);
    assert_eq!(reader.len(), 2000, "2s at 1kHz mono");

    Ok(())
}

#[tokio::test]
async fn elapsed_is_observable_while_recording() -> Result<()> {
    let (tx, source) = ControlledSource::new();
    let (_calls, session) = controller(test_config(1800, 5), source, false, false);

    session.start().await?;
    tx.send(Step::Segment(5))?;
    wait_until(
        || session.elapsed().0 == Duration::from_secs(5),
        "active duration update",
    )
    .await;

    let (active, status) = session.elapsed();
    assert_eq!(active, Duration::from_secs(5));
    assert_eq!(status, SessionStatus::Recording);

    tx.send(Step::Segment(5))?;
    wait_until(
        || session.elapsed().0 == Duration::from_secs(10),
        "second update",
    )
    .await;

    let outcome = session.stop().await?;
    assert_eq!(outcome.active_duration, Duration::from_secs(10));
    assert_eq!(outcome.segments_captured, 2);

    Ok(())
}
