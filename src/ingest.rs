//! Document ingestion: extract → chunk → index.
//!
//! Loads a document from disk, splits it into paragraph chunks, and replaces
//! whatever was indexed before under the same document key. The SQLite
//! context retriever searches these rows.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::db;
use crate::extract::{content_type_for_path, extract_text};
use crate::models::Chunk;

/// Reads a document from disk and returns its plain text.
pub fn read_document(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = extract_text(&bytes, content_type_for_path(path))
        .with_context(|| format!("Failed to extract text from {}", path.display()))?;
    Ok(text)
}

/// Chunks `text` and stores it under `file_key`, replacing earlier chunks.
///
/// Returns the number of chunks stored.
pub async fn ingest_text(
    pool: &SqlitePool,
    file_key: &str,
    text: &str,
    max_tokens: usize,
) -> Result<usize> {
    let chunks = chunk_text(file_key, text, max_tokens);
    replace_chunks(pool, file_key, &chunks).await?;
    Ok(chunks.len())
}

/// Replaces all chunks (and their FTS rows) for a document key in one transaction.
pub async fn replace_chunks(pool: &SqlitePool, file_key: &str, chunks: &[Chunk]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM document_chunks_fts WHERE file_key = ?")
        .bind(file_key)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM document_chunks WHERE file_key = ?")
        .bind(file_key)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            "INSERT INTO document_chunks (id, file_key, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.file_key)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO document_chunks_fts (chunk_id, file_key, text) VALUES (?, ?, ?)")
            .bind(&chunk.id)
            .bind(&chunk.file_key)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// `docchat ingest` entry point.
pub async fn run_ingest(config: &Config, file_key: &str, path: &Path) -> Result<()> {
    if file_key.trim().is_empty() {
        anyhow::bail!("file key must not be empty");
    }

    let text = read_document(path)?;
    let pool = db::connect(config).await?;
    let count = ingest_text(&pool, file_key, &text, config.chunking.max_tokens).await?;
    pool.close().await;

    tracing::info!(file_key, chunks = count, path = %path.display(), "document ingested");
    println!("Stored {} chunks for file key {}", count, file_key);
    Ok(())
}
