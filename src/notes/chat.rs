use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::NotesGenerator;

const SYSTEM_PROMPT: &str = "You are a skilled note taker who creates visually \
engaging and well-formatted markdown notes without adding any extra content.";

const NOTES_PROMPT: &str = "Generate comprehensive, well-organized notes from \
this transcript:\n\n{transcript}\n\nFormat the response in Markdown using \
headers, bullet lists, **bold**, *italics* and > blockquotes.";

/// Configuration for the chat-completions notes backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesApiConfig {
    /// API base URL (DeepSeek-compatible chat completions)
    pub base_url: String,
    /// Model name, e.g. "deepseek-chat"
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for NotesApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Notes generator backed by an OpenAI-style chat-completions API
pub struct ChatNotesGenerator {
    client: reqwest::Client,
    config: NotesApiConfig,
    api_key: String,
}

impl ChatNotesGenerator {
    pub fn new(config: NotesApiConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} is not set", config.api_key_env))?;

        Ok(Self {
            client: reqwest::Client::new(),
            config,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl NotesGenerator for ChatNotesGenerator {
    async fn generate(&self, transcript: &str) -> Result<String> {
        info!(
            "Requesting notes from {} (model: {})",
            self.config.base_url, self.config.model
        );

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: NOTES_PROMPT.replace("{transcript}", transcript),
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach notes API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Notes API returned {}: {}", status, body);
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Invalid response from notes API")?;

        let notes = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("Notes API returned no choices")?;

        info!("Notes generated ({} chars)", notes.len());

        Ok(notes)
    }
}
