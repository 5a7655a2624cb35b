//! # docchat
//!
//! Server-side core of a document-chat application. A chat turn looks up the
//! session's document, retrieves relevant excerpts for the question, asks a
//! hosted model (Gemini) with a fixed legal-assistant prompt, and appends the
//! question/answer pair to the session's message log.
//!
//! ## Architecture
//!
//! ```text
//!  POST /api/chat
//!        │  (trace → cors → auth)
//!        ▼
//!  ┌─────────────┐   find_chats     ┌──────────────┐
//!  │ ChatService │─────────────────▶│  ChatStore   │  SQLite
//!  │             │◀── append pair ──│              │
//!  │             │   fetch_context  ┌──────────────┐
//!  │             │─────────────────▶│  Retriever   │  FTS5 / HTTP
//!  │             │   generate       ┌──────────────┐
//!  │             │─────────────────▶│  ChatModel   │  Gemini
//!  └─────────────┘                  └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat init
//! docchat ingest --file-key lease-2024 ./lease.pdf
//! docchat chat create --file-key lease-2024 --name lease.pdf
//! GEMINI_API_KEY=... docchat serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | Chat/message persistence |
//! | [`context`] | Context retrieval backends |
//! | [`llm`] | Hosted model client |
//! | [`prompt`] | Instruction prompt template |
//! | [`chat`] | The chat turn |
//! | [`auth`] | Authentication middleware |
//! | [`shell`] | HTML page shell |
//! | [`server`] | HTTP server |
//! | [`ingest`] | Document ingestion |
//! | [`db`] / [`migrate`] | Database connection and schema |

pub mod auth;
pub mod chat;
pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod server;
pub mod sessions;
pub mod shell;
pub mod store;
