//! Hosted chat model abstraction and the Gemini implementation.
//!
//! The server builds one [`ChatModel`] at startup and hands it to the chat
//! service; nothing here is global.
//!
//! # Gemini
//!
//! [`GeminiModel`] calls `POST {base_url}/models/{model}:generateContent`
//! with the API key in the `x-goog-api-key` header. The conversation is sent
//! as `contents` (roles `user` / `model`), followed by the new user message,
//! with `generationConfig.maxOutputTokens` capping the reply. Requests are
//! not retried.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::models::Turn;

/// Author of a turn as the hosted model sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    User,
    Model,
}

/// One prior turn replayed to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTurn {
    pub role: ModelRole,
    pub text: String,
}

/// Maps client turns onto model turns: `"user"` stays user, everything else
/// becomes model-authored.
pub fn history_from_turns(turns: &[Turn]) -> Vec<ModelTurn> {
    turns
        .iter()
        .map(|t| ModelTurn {
            role: if t.is_user() {
                ModelRole::User
            } else {
                ModelRole::Model
            },
            text: t.content.clone(),
        })
        .collect()
}

/// A hosted conversational-completion model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Continues `history` with `message` from the user and returns the reply text.
    async fn generate(
        &self,
        history: &[ModelTurn],
        message: &str,
        max_output_tokens: u32,
    ) -> Result<String>;
}

/// Builds the model named by `config.provider`.
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiModel::from_config(config)?)),
        other => bail!("Unknown model provider: {}", other),
    }
}

// ============ Wire types ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: ModelRole,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

fn build_request<'a>(
    history: &'a [ModelTurn],
    message: &'a str,
    max_output_tokens: u32,
) -> GenerateContentRequest<'a> {
    let mut contents: Vec<Content<'a>> = history
        .iter()
        .map(|turn| Content {
            role: turn.role,
            parts: vec![Part { text: &turn.text }],
        })
        .collect();
    contents.push(Content {
        role: ModelRole::User,
        parts: vec![Part { text: message }],
    });

    GenerateContentRequest {
        contents,
        generation_config: GenerationConfig { max_output_tokens },
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_reply(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        bail!("Gemini blocked the prompt: {}", reason);
    }

    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: no candidates"))?;

    let texts: Vec<String> = parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() {
        bail!("Invalid Gemini response: candidate has no text");
    }
    Ok(texts.concat())
}

// ============ Client ============

/// Gemini `generateContent` client.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Builds the client from config, reading the key from `config.api_key_env`.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;
        if api_key.trim().is_empty() {
            bail!("{} environment variable is empty", config.api_key_env);
        }

        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    async fn generate(
        &self,
        history: &[ModelTurn],
        message: &str,
        max_output_tokens: u32,
    ) -> Result<String> {
        let body = build_request(history, message, max_output_tokens);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Invalid Gemini response body")?;
        let reply = extract_reply(parsed)?;
        tracing::debug!(model = %self.model, reply_chars = reply.len(), "Gemini reply received");
        Ok(reply)
    }
}
