use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use transcript_notes::{
    create_router, AppState, ChatNotesGenerator, Config, FileSource, HttpTranscriber,
    NotesGenerator, SessionController, Transcriber,
};

#[derive(Parser)]
#[command(
    name = "transcript-notes",
    about = "Capture audio, transcribe it, and turn the transcript into formatted notes"
)]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/transcript-notes")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API for the presentation layer
    Serve,
    /// Transcribe an audio file and print the generated notes
    File {
        /// Path to a WAV/MP3/M4A/FLAC/OGG file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::File { path } => transcribe_file(config, path).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let (transcriber, notes_generator) = build_collaborators(&config)?;

    let addr = format!("{}:{}", config.service.http.bind, config.service.http.port);
    info!("{} listening on {}", config.service.name, addr);

    let state = AppState::new(Arc::new(config), transcriber, notes_generator);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn transcribe_file(config: Config, path: PathBuf) -> Result<()> {
    let (transcriber, notes_generator) = build_collaborators(&config)?;

    let source = FileSource::open_path(&path)?;
    let controller = SessionController::new(
        config.session_config(None),
        Box::new(source),
        transcriber,
        notes_generator,
    );

    controller.start().await?;
    // File sessions finalize on their own once the source is exhausted
    let outcome = controller.wait().await?;

    info!(
        "Session {}: {:.1}s of audio in {} segments",
        outcome.session_id,
        outcome.active_duration.as_secs_f64(),
        outcome.segments_captured
    );

    println!("{}", outcome.notes);

    Ok(())
}

fn build_collaborators(
    config: &Config,
) -> Result<(Arc<dyn Transcriber>, Arc<dyn NotesGenerator>)> {
    let transcriber: Arc<dyn Transcriber> =
        Arc::new(HttpTranscriber::new(config.transcription.base_url.clone()));
    let notes_generator: Arc<dyn NotesGenerator> =
        Arc::new(ChatNotesGenerator::new(config.notes_config())?);
    Ok((transcriber, notes_generator))
}
