//! Persistence of chat sessions and their message logs.
//!
//! The [`ChatStore`] trait is the seam between the chat service and the
//! relational store. [`SqliteChatStore`] is the production backend;
//! [`InMemoryChatStore`] backs tests and embedders without a database.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChatSession, Message, NewMessage};

pub use memory::InMemoryChatStore;
pub use sqlite::SqliteChatStore;

/// Abstract storage backend for chats and messages.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_chat`](ChatStore::create_chat) | Insert a new chat session |
/// | [`find_chats`](ChatStore::find_chats) | All session rows matching an id |
/// | [`list_chats`](ChatStore::list_chats) | Sessions, optionally for one owner |
/// | [`append_messages`](ChatStore::append_messages) | Append rows atomically, in order |
/// | [`list_messages`](ChatStore::list_messages) | Message log in insertion order |
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn create_chat(&self, chat: &ChatSession) -> Result<()>;

    /// Returns every row whose id equals `id`.
    ///
    /// Callers decide what a non-singleton result means; the store does not
    /// collapse duplicates.
    async fn find_chats(&self, id: &str) -> Result<Vec<ChatSession>>;

    async fn list_chats(&self, user_id: Option<&str>) -> Result<Vec<ChatSession>>;

    /// Appends `messages` to the chat log as one unit: either every row is
    /// written, in slice order, or none is.
    async fn append_messages(&self, chat_id: &str, messages: &[NewMessage])
        -> Result<Vec<Message>>;

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>>;
}
