//! In-memory [`ChatStore`] implementation for tests and database-less embedders.
//!
//! Rows live in `Vec`s behind `std::sync::RwLock`. Unlike SQLite, chat ids
//! are not forced unique, so callers can exercise duplicate-row handling.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{ChatSession, Message, NewMessage};

use super::ChatStore;

#[derive(Default)]
pub struct InMemoryChatStore {
    chats: RwLock<Vec<ChatSession>>,
    messages: RwLock<Vec<Message>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given chat rows.
    pub fn with_chats(chats: Vec<ChatSession>) -> Self {
        Self {
            chats: RwLock::new(chats),
            messages: RwLock::new(Vec::new()),
        }
    }

    /// Every stored message across all chats, in insertion order.
    pub fn all_messages(&self) -> Vec<Message> {
        self.messages
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn create_chat(&self, chat: &ChatSession) -> Result<()> {
        self.chats.write().map_err(poisoned)?.push(chat.clone());
        Ok(())
    }

    async fn find_chats(&self, id: &str) -> Result<Vec<ChatSession>> {
        let chats = self.chats.read().map_err(poisoned)?;
        Ok(chats.iter().filter(|c| c.id == id).cloned().collect())
    }

    async fn list_chats(&self, user_id: Option<&str>) -> Result<Vec<ChatSession>> {
        let chats = self.chats.read().map_err(poisoned)?;
        let mut out: Vec<ChatSession> = chats
            .iter()
            .filter(|c| user_id.map_or(true, |u| c.user_id == u))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn append_messages(
        &self,
        chat_id: &str,
        messages: &[NewMessage],
    ) -> Result<Vec<Message>> {
        let now = chrono::Utc::now().timestamp();
        // Holding the write lock for the whole batch keeps the rows contiguous.
        let mut log = self.messages.write().map_err(poisoned)?;
        let mut next_id = log.last().map(|m| m.id + 1).unwrap_or(1);
        let mut stored = Vec::with_capacity(messages.len());

        for msg in messages {
            let row = Message {
                id: next_id,
                chat_id: chat_id.to_string(),
                content: msg.content.clone(),
                created_at: now,
                role: msg.role,
            };
            next_id += 1;
            stored.push(row);
        }
        log.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let log = self.messages.read().map_err(poisoned)?;
        Ok(log.iter().filter(|m| m.chat_id == chat_id).cloned().collect())
    }
}
