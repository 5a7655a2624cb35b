//! HTTP server for the document chat application.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `POST` | `/api/chat` | yes | Run one chat turn |
//! | `GET`  | `/api/chats/{id}/messages` | yes | Stored message log |
//! | `GET`  | `/` | no | HTML page shell |
//! | `GET`  | `/health` | no | Health check (returns version) |
//!
//! # Layering
//!
//! ```text
//! TraceLayer → CORS → [ /api/* : authenticate → handler ]
//!                     [ / , /health : handler ]
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": "chat not found" }          // 404
//! { "error": "Internal server error" }   // 500, cause is only logged
//! { "error": "unauthorized" }            // 401, from the auth middleware
//! ```

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{authenticate, Identity, TokenVerifier};
use crate::chat::{ChatError, ChatService};
use crate::config::Config;
use crate::context::create_retriever;
use crate::llm::create_model;
use crate::models::Message;
use crate::shell::render_shell;
use crate::store::SqliteChatStore;
use crate::{db, migrate};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatService>,
    shell_html: Arc<String>,
}

impl AppState {
    pub fn new(config: &Config, chat: ChatService) -> Self {
        Self {
            chat: Arc::new(chat),
            shell_html: Arc::new(render_shell(&config.app)),
        }
    }
}

/// Builds the router with every route and middleware layer.
pub fn build_router(state: AppState, verifier: TokenVerifier) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/chat", post(handle_chat))
        .route("/chats/{id}/messages", get(handle_messages))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(verifier),
            authenticate,
        ));

    Router::new()
        .nest("/api", api)
        .route("/", get(handle_shell))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the server on `[server].bind` and runs until Ctrl-C.
///
/// The database schema is applied on startup. The model client is built
/// here, once, so a missing API key fails fast instead of on the first chat.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let store = Arc::new(SqliteChatStore::new(pool.clone()));
    let retriever = create_retriever(&config.retrieval, pool)?;
    let model = create_model(&config.model)?;
    let chat = ChatService::new(store, retriever, model, config.model.max_output_tokens);

    let verifier = TokenVerifier::from_config(&config.auth);
    if !verifier.is_enabled() {
        tracing::warn!("authentication disabled; all requests run as the anonymous user");
    }

    let app = build_router(AppState::new(config, chat), verifier);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        model = %config.model.model,
        retrieval = %config.retrieval.provider,
        "docchat server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("docchat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

fn internal() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "Internal server error".to_string(),
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ChatNotFound(_) => not_found("chat not found"),
            ChatError::Failed(e) => {
                tracing::error!(error = ?e, "Error in chat route");
                internal()
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET / ============

async fn handle_shell(State(state): State<AppState>) -> Html<String> {
    Html(state.shell_html.as_ref().clone())
}

// ============ POST /api/chat ============

/// Request body for `POST /api/chat`.
///
/// `messages` is kept as raw JSON; the chat service parses it into turns
/// after the session lookup.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "chatId", deserialize_with = "chat_id_from_json")]
    pub chat_id: String,
    #[serde(default)]
    pub messages: serde_json::Value,
}

/// Chat ids arrive as strings or, from older clients, as numbers.
fn chat_id_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Response body for `POST /api/chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::error!(error = %rejection.body_text(), "Error in chat route: unreadable request body");
        internal()
    })?;

    tracing::debug!(user_id = %identity.user_id, chat_id = %request.chat_id, "chat request");
    let reply = state
        .chat
        .respond_raw(&request.chat_id, request.messages)
        .await?;

    Ok(Json(ChatResponse { response: reply }))
}

// ============ GET /api/chats/{id}/messages ============

#[derive(Serialize)]
struct MessagesResponse {
    messages: Vec<Message>,
}

async fn handle_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let messages = state.chat.store().list_messages(&id).await.map_err(|e| {
        tracing::error!(error = ?e, chat_id = %id, "failed to list messages");
        internal()
    })?;
    Ok(Json(MessagesResponse { messages }))
}
