//! # docchat CLI
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and schema |
//! | `docchat ingest --file-key <key> <path>` | Index a PDF or text document |
//! | `docchat chat create --file-key <key>` | Create a chat session for a document |
//! | `docchat chat list` | List chat sessions |
//! | `docchat messages <chat-id>` | Print a session's message log |
//! | `docchat hash-token <token>` | Digest for an `[[auth.tokens]]` entry |
//! | `docchat serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::{auth, config, ingest, logging, migrate, server, sessions};

/// Document chat service: ask questions about an ingested document.
#[derive(Parser)]
#[command(name = "docchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Extract, chunk, and index a document under a file key.
    ///
    /// Re-ingesting the same key replaces its previous chunks.
    Ingest {
        /// Document key the chunks are stored under.
        #[arg(long)]
        file_key: String,

        /// Path to a `.pdf` or UTF-8 text file.
        path: PathBuf,
    },

    /// Manage chat sessions.
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },

    /// Print the message log of a chat session.
    Messages {
        /// Chat session id.
        chat_id: String,
    },

    /// Print the SHA-256 digest of a token for `[[auth.tokens]]`.
    HashToken {
        token: String,
    },

    /// Start the HTTP server.
    Serve,
}

#[derive(Subcommand)]
enum ChatAction {
    /// Create a chat session and print its id.
    Create {
        /// Document key used for context retrieval.
        #[arg(long)]
        file_key: String,

        /// Explicit session id (a UUID is generated otherwise).
        #[arg(long)]
        id: Option<String>,

        /// Display name of the document.
        #[arg(long)]
        name: Option<String>,

        /// Where the original document can be downloaded.
        #[arg(long)]
        url: Option<String>,

        /// Owner of the session.
        #[arg(long)]
        user: Option<String>,
    },

    /// List chat sessions, newest first.
    List {
        /// Only sessions owned by this user.
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::HashToken { token } = &cli.command {
        println!("{}", auth::hash_token(token));
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    logging::init_logging(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file_key, path } => {
            ingest::run_ingest(&cfg, &file_key, &path).await?;
        }
        Commands::Chat { action } => match action {
            ChatAction::Create {
                file_key,
                id,
                name,
                url,
                user,
            } => {
                sessions::run_create_chat(
                    &cfg,
                    sessions::NewChat {
                        id,
                        file_key,
                        pdf_name: name,
                        pdf_url: url,
                        user_id: user,
                    },
                )
                .await?;
            }
            ChatAction::List { user } => {
                sessions::run_list_chats(&cfg, user).await?;
            }
        },
        Commands::Messages { chat_id } => {
            sessions::run_messages(&cfg, &chat_id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::HashToken { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
