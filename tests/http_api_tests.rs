// Router-level tests for the session HTTP API

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use transcript_notes::{
    create_router, AppState, AudioBuffer, Config, NotesGenerator, Transcriber,
};

struct StubTranscriber;

#[async_trait::async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio: &AudioBuffer) -> Result<String> {
        Ok("stub transcript".to_string())
    }
}

struct StubNotes;

#[async_trait::async_trait]
impl NotesGenerator for StubNotes {
    async fn generate(&self, transcript: &str) -> Result<String> {
        Ok(format!("# Notes\n{}", transcript))
    }
}

fn test_state() -> AppState {
    AppState::new(
        Arc::new(Config::default()),
        Arc::new(StubTranscriber),
        Arc::new(StubNotes),
    )
}

async fn request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router.clone().oneshot(builder.body(body)?).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };

    Ok((status, json))
}

fn write_test_wav(dir: &tempfile::TempDir) -> Result<std::path::PathBuf> {
    let path = dir.path().join("speech.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 1000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for i in 0..2000 {
        writer.write_sample(((i % 100) * 50) as i16)?;
    }
    writer.finalize()?;
    Ok(path)
}

#[tokio::test]
async fn health_check_works() -> Result<()> {
    let router = create_router(test_state());
    let (status, _) = request(&router, "GET", "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn queries_without_session_return_not_found() -> Result<()> {
    let router = create_router(test_state());

    for (method, uri) in [
        ("GET", "/session/status"),
        ("POST", "/session/pause"),
        ("POST", "/session/resume"),
        ("POST", "/session/stop"),
    ] {
        let body = (method == "POST").then(|| json!({}));
        let (status, body) = request(&router, method, uri, body).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert_eq!(body["error"], "No session is running");
    }

    Ok(())
}

#[tokio::test]
async fn start_rejects_bad_requests() -> Result<()> {
    let router = create_router(test_state());

    let (status, body) =
        request(&router, "POST", "/session/start", Some(json!({"source": "file"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "source \"file\" requires a path");

    let (status, _) = request(
        &router,
        "POST",
        "/session/start",
        Some(json!({"source": "telepathy"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(
        &router,
        "POST",
        "/session/start",
        Some(json!({"source": "file", "path": "/nonexistent/audio.wav"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to open audio file"),
        "got: {}",
        body
    );

    Ok(())
}

#[tokio::test]
async fn file_session_runs_to_completion() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let wav_path = write_test_wav(&temp_dir)?;

    let router = create_router(test_state());

    let (status, body) = request(
        &router,
        "POST",
        "/session/start",
        Some(json!({
            "source": "file",
            "path": wav_path.to_string_lossy(),
            "session_id": "api-test",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "start failed: {}", body);
    assert_eq!(body["session_id"], "api-test");

    // A file source drains quickly; poll until the session finalizes
    let mut completed = false;
    for _ in 0..200 {
        let (status, body) = request(&router, "GET", "/session/status", None).await?;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(completed, "Session did not complete in time");

    let (status, body) = request(&router, "POST", "/session/stop", Some(json!({}))).await?;
    assert_eq!(status, StatusCode::OK, "stop failed: {}", body);
    assert_eq!(body["session_id"], "api-test");
    assert_eq!(body["transcript"], "stub transcript");
    assert_eq!(body["notes"], "# Notes\nstub transcript");
    assert!(body["active_secs"].as_f64().unwrap() > 1.9);

    // The slot is cleared after stop
    let (status, _) = request(&router, "GET", "/session/status", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
