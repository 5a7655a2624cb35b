//! The chat turn: look up the session, fetch context, ask the model, log the pair.
//!
//! [`ChatService`] owns no I/O of its own. Its three collaborators (store,
//! retriever, model) are injected by the hosting process, which makes the
//! whole flow testable with in-memory fakes.
//!
//! # Flow
//!
//! 1. `find_chats(chat_id)` must return exactly one row, else [`ChatError::ChatNotFound`].
//! 2. The last incoming turn is the new question.
//! 3. Context is fetched for the question, scoped to the chat's `file_key`.
//! 4. The model receives every incoming turn plus the instruction-augmented question.
//! 5. The raw question (`user`) and the raw reply (`system`) are appended in
//!    one store call; if that fails, the reply is not returned.

use std::sync::Arc;

use crate::context::ContextRetriever;
use crate::llm::{history_from_turns, ChatModel};
use crate::models::{ChatSession, NewMessage, Turn};
use crate::prompt::{augment_utterance, build_instruction};
use crate::store::ChatStore;

/// Failure of a chat turn, as far as the caller needs to know.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Zero or several sessions carry the requested id.
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    /// Anything else: empty input, retrieval, generation, or persistence.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

pub struct ChatService {
    store: Arc<dyn ChatStore>,
    retriever: Arc<dyn ContextRetriever>,
    model: Arc<dyn ChatModel>,
    max_output_tokens: u32,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        retriever: Arc<dyn ContextRetriever>,
        model: Arc<dyn ChatModel>,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            store,
            retriever,
            model,
            max_output_tokens,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Runs one chat turn and returns the model's reply.
    #[tracing::instrument(skip(self, turns), fields(turns = turns.len(), file_key = tracing::field::Empty))]
    pub async fn respond(&self, chat_id: &str, turns: &[Turn]) -> Result<String, ChatError> {
        let session = self.find_session(chat_id).await?;
        self.answer(&session, turns).await
    }

    /// Like [`respond`](Self::respond), but takes the client's `messages`
    /// value as received. The session is looked up before the turns are
    /// parsed, so an unknown chat is reported whatever the body carries.
    #[tracing::instrument(skip(self, messages), fields(file_key = tracing::field::Empty))]
    pub async fn respond_raw(
        &self,
        chat_id: &str,
        messages: serde_json::Value,
    ) -> Result<String, ChatError> {
        let session = self.find_session(chat_id).await?;
        let turns: Vec<Turn> = serde_json::from_value(messages)
            .map_err(|e| anyhow::anyhow!("unreadable messages: {}", e))?;
        self.answer(&session, &turns).await
    }

    async fn find_session(&self, chat_id: &str) -> Result<ChatSession, ChatError> {
        let mut sessions = self.store.find_chats(chat_id).await?;
        if sessions.len() != 1 {
            tracing::warn!(matches = sessions.len(), "chat lookup did not return exactly one row");
            return Err(ChatError::ChatNotFound(chat_id.to_string()));
        }
        let session = sessions.remove(0);
        tracing::Span::current().record("file_key", session.file_key.as_str());
        Ok(session)
    }

    async fn answer(&self, session: &ChatSession, turns: &[Turn]) -> Result<String, ChatError> {
        let chat_id = session.id.as_str();
        let last = turns
            .last()
            .ok_or_else(|| anyhow::anyhow!("request carries no messages"))?;

        let context = self
            .retriever
            .fetch_context(&last.content, &session.file_key)
            .await?;
        let instruction = build_instruction(&context);

        let history = history_from_turns(turns);
        let reply = self
            .model
            .generate(
                &history,
                &augment_utterance(&instruction, &last.content),
                self.max_output_tokens,
            )
            .await?;

        self.store
            .append_messages(
                chat_id,
                &[
                    NewMessage::user(last.content.clone()),
                    NewMessage::system(reply.clone()),
                ],
            )
            .await?;

        tracing::info!(
            context_chars = context.len(),
            reply_chars = reply.len(),
            "chat turn completed"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelRole, ModelTurn};
    use crate::models::MessageRole;
    use crate::store::InMemoryChatStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRetriever {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ContextRetriever for RecordingRetriever {
        async fn fetch_context(&self, query: &str, file_key: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), file_key.to_string()));
            if self.fail {
                anyhow::bail!("vector index unavailable");
            }
            Ok("Termination clause: either party may terminate with 30 days notice.".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingModel {
        calls: Mutex<Vec<(Vec<ModelTurn>, String, u32)>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn generate(
            &self,
            history: &[ModelTurn],
            message: &str,
            max_output_tokens: u32,
        ) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((history.to_vec(), message.to_string(), max_output_tokens));
            Ok("Either party may terminate the agreement with 30 days notice.".to_string())
        }
    }

    fn session(id: &str, file_key: &str) -> ChatSession {
        ChatSession {
            id: id.to_string(),
            pdf_name: "contract.pdf".to_string(),
            pdf_url: String::new(),
            created_at: 0,
            user_id: "u1".to_string(),
            file_key: file_key.to_string(),
        }
    }

    fn turn(role: &str, content: &str) -> Turn {
        Turn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    struct Harness {
        store: Arc<InMemoryChatStore>,
        retriever: Arc<RecordingRetriever>,
        model: Arc<RecordingModel>,
        service: ChatService,
    }

    fn harness(chats: Vec<ChatSession>, retriever: RecordingRetriever) -> Harness {
        let store = Arc::new(InMemoryChatStore::with_chats(chats));
        let retriever = Arc::new(retriever);
        let model = Arc::new(RecordingModel::default());
        let service = ChatService::new(store.clone(), retriever.clone(), model.clone(), 3000);
        Harness {
            store,
            retriever,
            model,
            service,
        }
    }

    #[tokio::test]
    async fn test_successful_turn() {
        let h = harness(vec![session("abc", "doc1")], RecordingRetriever::default());
        let turns = vec![
            turn("user", "Hi"),
            turn("system", "Hello, how can I help?"),
            turn("user", "What is the termination clause?"),
        ];

        let reply = h.service.respond("abc", &turns).await.unwrap();
        assert_eq!(reply, "Either party may terminate the agreement with 30 days notice.");

        let calls = h.retriever.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![("What is the termination clause?".to_string(), "doc1".to_string())]
        );

        let model_calls = h.model.calls.lock().unwrap();
        let (history, message, max_tokens) = &model_calls[0];
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, ModelRole::Model);
        assert!(message.contains("START CONTEXT BLOCK\nTermination clause"));
        assert!(message.ends_with("\n\nWhat is the termination clause?"));
        assert_eq!(*max_tokens, 3000);

        let log = h.store.all_messages();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, MessageRole::User);
        assert_eq!(log[0].content, "What is the termination clause?");
        assert_eq!(log[1].role, MessageRole::System);
        assert_eq!(log[1].content, reply);
        assert!(log.iter().all(|m| m.chat_id == "abc"));
    }

    #[tokio::test]
    async fn test_missing_chat_is_not_found() {
        let h = harness(vec![session("other", "doc1")], RecordingRetriever::default());
        let err = h
            .service
            .respond("abc", &[turn("user", "question")])
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::ChatNotFound(ref id) if id == "abc"));
        assert!(h.retriever.calls.lock().unwrap().is_empty());
        assert!(h.model.calls.lock().unwrap().is_empty());
        assert!(h.store.all_messages().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_chat_rows_are_not_found() {
        let h = harness(
            vec![session("abc", "doc1"), session("abc", "doc2")],
            RecordingRetriever::default(),
        );
        let err = h
            .service
            .respond("abc", &[turn("user", "question")])
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::ChatNotFound(_)));
        assert!(h.model.calls.lock().unwrap().is_empty());
        assert!(h.store.all_messages().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_writes_nothing() {
        let h = harness(
            vec![session("abc", "doc1")],
            RecordingRetriever {
                fail: true,
                ..Default::default()
            },
        );
        let err = h
            .service
            .respond("abc", &[turn("user", "question")])
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Failed(_)));
        assert!(err.to_string().contains("vector index unavailable"));
        assert!(h.model.calls.lock().unwrap().is_empty());
        assert!(h.store.all_messages().is_empty());
    }

    #[tokio::test]
    async fn test_empty_turns_fail() {
        let h = harness(vec![session("abc", "doc1")], RecordingRetriever::default());
        let err = h.service.respond("abc", &[]).await.unwrap_err();

        assert!(matches!(err, ChatError::Failed(_)));
        assert!(h.retriever.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_raw_messages_parsed_after_lookup() {
        let h = harness(vec![], RecordingRetriever::default());
        let err = h
            .service
            .respond_raw("abc", serde_json::json!("not a list"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ChatNotFound(_)));

        let h = harness(vec![session("abc", "doc1")], RecordingRetriever::default());
        let err = h
            .service
            .respond_raw("abc", serde_json::json!([{"content": "no role"}]))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Failed(_)));
        assert!(h.retriever.calls.lock().unwrap().is_empty());

        let reply = h
            .service
            .respond_raw(
                "abc",
                serde_json::json!([{"role": "user", "content": "What is the termination clause?"}]),
            )
            .await
            .unwrap();
        assert_eq!(reply, "Either party may terminate the agreement with 30 days notice.");
        assert_eq!(h.store.all_messages().len(), 2);
    }
}
