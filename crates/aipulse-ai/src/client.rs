//! HTTP client for OpenAI-compatible chat-completions APIs.
//!
//! Wraps `reqwest` with typed request/response structs and surfaces API-level
//! errors as [`AiError::Api`]. The client is constructed with an *optional*
//! API key: without one it stays inert and [`OpenAiClient::is_available`]
//! returns `false`, letting callers fall back to heuristic enrichment.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use aipulse_core::SourceKind;

use crate::enricher::TextEnricher;
use crate::error::AiError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/";
const MAX_INPUT_CHARS: usize = 6_000;
const MAX_TAGS: usize = 8;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
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

/// Client for an OpenAI-compatible chat-completions endpoint.
///
/// Use [`OpenAiClient::new`] for production or [`OpenAiClient::with_base_url`]
/// to point at a mock server in tests.
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    base_url: Url,
    model: String,
}

impl OpenAiClient {
    /// Creates a new client pointed at the production OpenAI API.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn new(
        api_key: Option<&str>,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, AiError> {
        Self::with_base_url(api_key, model, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock
    /// or pointing at a self-hosted compatible server).
    ///
    /// # Errors
    ///
    /// Returns [`AiError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed, or [`AiError::Api`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        api_key: Option<&str>,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, AiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("aipulse/0.1 (ai-resource-radar)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends the chat path instead of replacing a segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| AiError::Api(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()).map(str::to_owned),
            base_url,
            model: model.to_owned(),
        })
    }

    /// Sends a single system+user chat completion and returns the assistant
    /// message content, trimmed.
    async fn chat(&self, system: &str, user: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::Unavailable)?;

        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|e| AiError::Api(format!("invalid chat URL: {e}")))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(url.clone())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api(format!(
                "chat completion failed with {status}: {body}"
            )));
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| AiError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AiError::Api("chat completion returned no choices".to_owned()))?;

        Ok(content.trim().to_owned())
    }
}

impl TextEnricher for OpenAiClient {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn summarize(
        &self,
        text: &str,
        source: SourceKind,
        lang: &str,
    ) -> Result<String, AiError> {
        let system = format!(
            "You summarize AI/ML resources for a technical digest. \
             Answer in {lang}, 3-5 plain sentences, no markdown."
        );
        let framing = match source {
            SourceKind::Github => "This is a GitHub repository description/README.",
            SourceKind::Arxiv => "This is an arXiv paper abstract.",
            SourceKind::Huggingface => "This is a Hugging Face model card.",
            SourceKind::Zenn => "This is a technical blog article.",
        };
        let user = format!("{framing}\n\n{}", clip(text));
        self.chat(&system, &user).await
    }

    async fn short_summarize(&self, text: &str, lang: &str) -> Result<String, AiError> {
        let system = format!(
            "You write one-line teasers for AI/ML resources. \
             Answer in {lang} with exactly one sentence, no markdown."
        );
        self.chat(&system, clip(text)).await
    }

    async fn extract_tags(&self, text: &str, lang: &str) -> Result<Vec<String>, AiError> {
        let system = format!(
            "Extract 5-8 short topical tags for an AI/ML resource. \
             Answer in {lang} as a single comma-separated line, \
             lowercase, no numbering, no markdown."
        );
        let raw = self.chat(&system, clip(text)).await?;
        Ok(parse_tags(&raw))
    }

    async fn suggest_trial(
        &self,
        text: &str,
        tags: &[String],
        lang: &str,
    ) -> Result<String, AiError> {
        let system = format!(
            "Suggest one concrete first step for a developer who wants to try \
             this AI/ML resource (a command, a snippet, or a starting point). \
             Answer in {lang}, 1-2 sentences, no markdown."
        );
        let user = if tags.is_empty() {
            clip(text).to_owned()
        } else {
            format!("Topics: {}\n\n{}", tags.join(", "), clip(text))
        };
        self.chat(&system, &user).await
    }
}

/// Truncates enrichment input so a pathological README cannot blow the
/// request budget. Cuts on a char boundary.
fn clip(text: &str) -> &str {
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parses a model-produced tag line into clean tags.
///
/// Accepts comma- or newline-separated output, strips list bullets and
/// surrounding quotes, lowercases, drops empties and duplicates, and caps
/// the result at 8 tags.
fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for part in raw.split(|c| c == ',' || c == '\n') {
        let tag = part
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim_matches(['"', '\'', '`'])
            .trim()
            .to_lowercase();
        if tag.is_empty() || tag.len() > 40 || tags.contains(&tag) {
            continue;
        }
        tags.push(tag);
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}
