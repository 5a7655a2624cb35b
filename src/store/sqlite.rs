//! SQLite-backed [`ChatStore`] implementation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{ChatSession, Message, MessageRole, NewMessage};

use super::ChatStore;

/// SQLite implementation of the [`ChatStore`] trait over the `chats` and
/// `messages` tables.
#[derive(Clone)]
pub struct SqliteChatStore {
    pool: SqlitePool,
}

impl SqliteChatStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn chat_from_row(row: &SqliteRow) -> ChatSession {
    ChatSession {
        id: row.get("id"),
        pdf_name: row.get("pdf_name"),
        pdf_url: row.get("pdf_url"),
        created_at: row.get("created_at"),
        user_id: row.get("user_id"),
        file_key: row.get("file_key"),
    }
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let role: String = row.get("role");
    Ok(Message {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        role: MessageRole::parse(&role).ok_or_else(|| anyhow!("unknown message role: {}", role))?,
    })
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn create_chat(&self, chat: &ChatSession) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (id, pdf_name, pdf_url, created_at, user_id, file_key)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chat.id)
        .bind(&chat.pdf_name)
        .bind(&chat.pdf_url)
        .bind(chat.created_at)
        .bind(&chat.user_id)
        .bind(&chat.file_key)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert chat {}", chat.id))?;
        Ok(())
    }

    async fn find_chats(&self, id: &str) -> Result<Vec<ChatSession>> {
        let rows = sqlx::query(
            "SELECT id, pdf_name, pdf_url, created_at, user_id, file_key FROM chats WHERE id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(chat_from_row).collect())
    }

    async fn list_chats(&self, user_id: Option<&str>) -> Result<Vec<ChatSession>> {
        let rows = match user_id {
            Some(user) => {
                sqlx::query(
                    "SELECT id, pdf_name, pdf_url, created_at, user_id, file_key FROM chats \
                     WHERE user_id = ? ORDER BY created_at DESC, id ASC",
                )
                .bind(user)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, pdf_name, pdf_url, created_at, user_id, file_key FROM chats \
                     ORDER BY created_at DESC, id ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(chat_from_row).collect())
    }

    async fn append_messages(
        &self,
        chat_id: &str,
        messages: &[NewMessage],
    ) -> Result<Vec<Message>> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(messages.len());

        for msg in messages {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO messages (chat_id, content, created_at, role) VALUES (?, ?, ?, ?) RETURNING id",
            )
            .bind(chat_id)
            .bind(&msg.content)
            .bind(now)
            .bind(msg.role.as_str())
            .fetch_one(&mut *tx)
            .await
            .with_context(|| format!("failed to append {} message to chat {}", msg.role.as_str(), chat_id))?;

            stored.push(Message {
                id,
                chat_id: chat_id.to_string(),
                content: msg.content.clone(),
                created_at: now,
                role: msg.role,
            });
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, chat_id, content, created_at, role FROM messages WHERE chat_id = ? ORDER BY id ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqliteChatStore) {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_db_path(tmp.path().join("data/chat.sqlite"));
        let pool = db::connect(&config).await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        (tmp, SqliteChatStore::new(pool))
    }

    fn chat(id: &str, user: &str, created_at: i64) -> ChatSession {
        ChatSession {
            id: id.to_string(),
            pdf_name: "lease.pdf".to_string(),
            pdf_url: "https://files.example/lease.pdf".to_string(),
            created_at,
            user_id: user.to_string(),
            file_key: "doc1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_chats_by_id() {
        let (_tmp, store) = setup().await;
        store.create_chat(&chat("abc", "u1", 1)).await.unwrap();

        let found = store.find_chats("abc").await.unwrap();
        assert_eq!(found, vec![chat("abc", "u1", 1)]);
        assert!(store.find_chats("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_chat_id_rejected() {
        let (_tmp, store) = setup().await;
        store.create_chat(&chat("abc", "u1", 1)).await.unwrap();
        assert!(store.create_chat(&chat("abc", "u2", 2)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_chats_filters_by_owner() {
        let (_tmp, store) = setup().await;
        store.create_chat(&chat("a", "u1", 1)).await.unwrap();
        store.create_chat(&chat("b", "u2", 2)).await.unwrap();
        store.create_chat(&chat("c", "u1", 3)).await.unwrap();

        let mine: Vec<String> = store
            .list_chats(Some("u1"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(mine, vec!["c", "a"]);
        assert_eq!(store.list_chats(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_append_messages_preserves_order() {
        let (_tmp, store) = setup().await;
        store.create_chat(&chat("abc", "u1", 1)).await.unwrap();

        let stored = store
            .append_messages(
                "abc",
                &[NewMessage::user("question"), NewMessage::system("answer")],
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].id < stored[1].id);

        let log = store.list_messages("abc").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, MessageRole::User);
        assert_eq!(log[0].content, "question");
        assert_eq!(log[1].role, MessageRole::System);
        assert_eq!(log[1].content, "answer");
    }

    #[tokio::test]
    async fn test_append_messages_is_all_or_nothing() {
        let (_tmp, store) = setup().await;
        // Unknown chat violates the foreign key on the first insert.
        let result = store
            .append_messages(
                "ghost",
                &[NewMessage::user("question"), NewMessage::system("answer")],
            )
            .await;
        assert!(result.is_err());
        assert!(store.list_messages("ghost").await.unwrap().is_empty());
    }
}
