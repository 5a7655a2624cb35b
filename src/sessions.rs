//! Chat session administration for the CLI.
//!
//! Sessions are normally created by the upload flow of the web client. These
//! commands cover the same ground from a terminal: create a session for an
//! ingested document, list sessions, and print a session's message log.

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::ChatSession;
use crate::store::{ChatStore, SqliteChatStore};

/// Fields for a new session; `id` and `created_at` are filled in when absent.
#[derive(Debug, Clone, Default)]
pub struct NewChat {
    pub id: Option<String>,
    pub file_key: String,
    pub pdf_name: Option<String>,
    pub pdf_url: Option<String>,
    pub user_id: Option<String>,
}

/// Inserts a session and returns it.
pub async fn create_chat(store: &dyn ChatStore, new: NewChat) -> Result<ChatSession> {
    if new.file_key.trim().is_empty() {
        bail!("file key must not be empty");
    }

    let chat = ChatSession {
        id: new.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        pdf_name: new.pdf_name.unwrap_or_else(|| new.file_key.clone()),
        pdf_url: new.pdf_url.unwrap_or_default(),
        created_at: chrono::Utc::now().timestamp(),
        user_id: new
            .user_id
            .unwrap_or_else(|| crate::auth::ANONYMOUS_USER.to_string()),
        file_key: new.file_key,
    };

    if !store.find_chats(&chat.id).await?.is_empty() {
        bail!("chat already exists: {}", chat.id);
    }
    store.create_chat(&chat).await?;
    Ok(chat)
}

/// `docchat chat create`.
pub async fn run_create_chat(config: &Config, new: NewChat) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteChatStore::new(pool.clone());
    let chat = create_chat(&store, new).await?;
    pool.close().await;

    println!("{}", chat.id);
    Ok(())
}

/// `docchat chat list`.
pub async fn run_list_chats(config: &Config, user_id: Option<String>) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteChatStore::new(pool.clone());
    let chats = store.list_chats(user_id.as_deref()).await?;
    pool.close().await;

    if chats.is_empty() {
        println!("No chats.");
        return Ok(());
    }

    println!("{:<38} {:<20} {:<12} NAME", "ID", "FILE KEY", "OWNER");
    for chat in chats {
        println!(
            "{:<38} {:<20} {:<12} {}",
            chat.id, chat.file_key, chat.user_id, chat.pdf_name
        );
    }
    Ok(())
}

/// `docchat messages <chat_id>`.
pub async fn run_messages(config: &Config, chat_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteChatStore::new(pool.clone());
    let messages = store.list_messages(chat_id).await?;
    pool.close().await;

    if messages.is_empty() {
        println!("No messages.");
        return Ok(());
    }

    for msg in messages {
        let when = chrono::DateTime::from_timestamp(msg.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| msg.created_at.to_string());
        println!("[{}] {} ({})", msg.id, msg.role.as_str(), when);
        println!("{}", msg.content);
        println!();
    }
    Ok(())
}
