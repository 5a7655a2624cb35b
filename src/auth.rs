//! Request authentication middleware.
//!
//! Runs before every `/api` handler and attaches the caller's [`Identity`]
//! to the request extensions. Handlers extract it with
//! `Extension<Identity>`.
//!
//! Tokens are read from:
//! - `Authorization: Bearer <token>`
//! - `X-API-Key: <token>`
//!
//! and compared by SHA-256 digest against `[[auth.tokens]]` in the config.
//! With `auth.mode = "disabled"` every request gets the anonymous identity.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;

pub const ANONYMOUS_USER: &str = "anonymous";

/// Verified caller identity attached to each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS_USER.to_string(),
        }
    }
}

/// SHA-256 of a token, lowercase hex. This is what `[[auth.tokens]]` stores.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Maps presented tokens to identities.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    enabled: bool,
    by_digest: HashMap<String, String>,
}

impl TokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            enabled: config.is_enabled(),
            by_digest: config
                .tokens
                .iter()
                .map(|t| (t.token_sha256.to_ascii_lowercase(), t.user_id.clone()))
                .collect(),
        }
    }

    /// Verifier that lets everyone through as [`Identity::anonymous`].
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            by_digest: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resolves request headers to an identity, or `None` if the caller is
    /// not allowed in.
    pub fn verify(&self, headers: &HeaderMap) -> Option<Identity> {
        if !self.enabled {
            return Some(Identity::anonymous());
        }
        let token = extract_token(headers)?;
        self.by_digest
            .get(&hash_token(&token))
            .map(|user_id| Identity {
                user_id: user_id.clone(),
            })
    }
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Axum middleware: verify the caller, attach [`Identity`], or reject with 401.
pub async fn authenticate(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    match verifier.verify(request.headers()) {
        Some(identity) => {
            tracing::debug!(user_id = %identity.user_id, "request authenticated");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "rejected unauthenticated request");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "unauthorized" })),
            )
                .into_response()
        }
    }
}
