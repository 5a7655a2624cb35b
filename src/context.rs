//! Context retrieval for chat prompts.
//!
//! A [`ContextRetriever`] turns a free-text question and a document key into
//! a block of relevant excerpts. The chat service embeds that block in the
//! instruction prompt verbatim.
//!
//! # Backends
//!
//! | Provider | Type | Behavior |
//! |----------|------|----------|
//! | `sqlite` | [`SqliteRetriever`] | FTS5 keyword search over chunks ingested for the key |
//! | `http` | [`HttpRetriever`] | Delegates to a remote context service |
//! | `disabled` | [`DisabledRetriever`] | Always returns an empty block |
//!
//! Every backend caps the block at `retrieval.max_context_chars` characters.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrievalConfig;

/// Source of document excerpts for a query.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Returns excerpts of the document identified by `file_key` relevant to
    /// `query`. An empty string means nothing relevant was found.
    async fn fetch_context(&self, query: &str, file_key: &str) -> Result<String>;
}

/// Builds the retriever named by `config.provider`.
///
/// `pool` is only used by the `sqlite` provider.
pub fn create_retriever(
    config: &RetrievalConfig,
    pool: SqlitePool,
) -> Result<Arc<dyn ContextRetriever>> {
    match config.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteRetriever::new(
            pool,
            config.top_k,
            config.max_context_chars,
        ))),
        "http" => Ok(Arc::new(HttpRetriever::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledRetriever)),
        other => bail!("Unknown retrieval provider: {}", other),
    }
}

/// Cuts `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Turns a natural-language question into an FTS5 query.
///
/// Punctuation such as `?` or `"` is FTS syntax, so the query is reduced to
/// alphanumeric terms, each quoted, OR-joined. Returns `None` when no term
/// survives.
pub fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

// ============ SQLite ============

/// Keyword retrieval over chunks stored by `docchat ingest`.
pub struct SqliteRetriever {
    pool: SqlitePool,
    top_k: i64,
    max_chars: usize,
}

impl SqliteRetriever {
    pub fn new(pool: SqlitePool, top_k: i64, max_chars: usize) -> Self {
        Self {
            pool,
            top_k,
            max_chars,
        }
    }
}

#[async_trait]
impl ContextRetriever for SqliteRetriever {
    async fn fetch_context(&self, query: &str, file_key: &str) -> Result<String> {
        let Some(match_expr) = fts_query(query) else {
            return Ok(String::new());
        };

        let excerpts: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT text
            FROM document_chunks_fts
            WHERE document_chunks_fts MATCH ? AND file_key = ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(file_key)
        .bind(self.top_k)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("keyword search failed for file key {}", file_key))?;

        tracing::debug!(file_key, hits = excerpts.len(), "context retrieved");
        Ok(truncate_chars(&excerpts.join("\n"), self.max_chars))
    }
}

// ============ HTTP ============

#[derive(Serialize)]
struct HttpContextRequest<'a> {
    query: &'a str,
    file_key: &'a str,
    top_k: i64,
}

#[derive(Deserialize)]
struct HttpContextResponse {
    context: String,
}

/// Retrieval delegated to a remote service.
///
/// Sends `POST {url}` with `{"query", "file_key", "top_k"}` and expects
/// `{"context": "..."}` back. No retries.
pub struct HttpRetriever {
    client: reqwest::Client,
    url: String,
    top_k: i64,
    max_chars: usize,
}

impl HttpRetriever {
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("retrieval.url required for http provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url,
            top_k: config.top_k,
            max_chars: config.max_context_chars,
        })
    }
}

#[async_trait]
impl ContextRetriever for HttpRetriever {
    async fn fetch_context(&self, query: &str, file_key: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&HttpContextRequest {
                query,
                file_key,
                top_k: self.top_k,
            })
            .send()
            .await
            .with_context(|| format!("context service unreachable at {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Context service error {}: {}", status, body_text);
        }

        let body: HttpContextResponse = response
            .json()
            .await
            .context("Invalid context service response")?;
        Ok(truncate_chars(&body.context, self.max_chars))
    }
}

// ============ Disabled ============

/// Retriever that never finds anything.
pub struct DisabledRetriever;

#[async_trait]
impl ContextRetriever for DisabledRetriever {
    async fn fetch_context(&self, _query: &str, _file_key: &str) -> Result<String> {
        Ok(String::new())
    }
}
