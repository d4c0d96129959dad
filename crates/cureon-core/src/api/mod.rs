//! HTTP client wrapper for the Cureon REST backend.
//!
//! Every call goes through [`ApiClient::send`], which attaches the bearer
//! token, applies the client timeout and classifies failures into
//! [`ApiError`]. A 401 clears the token, drops the persisted session when a
//! store is attached, and publishes [`SessionEvent::LoginRequired`] so the
//! shell can route to login.
//!
//! The backend surface is split into small async traits so the dispensing,
//! sync and store layers can run against fakes in tests.

mod appointments;
mod contacts;
mod health;
mod pharmacy;
mod prescriptions;

pub use appointments::*;
pub use contacts::*;
pub use health::*;
pub use pharmacy::*;
pub use prescriptions::*;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::{watch, RwLock};

use crate::config::{ClientConfig, ConfigError};
use crate::db::Database;
use crate::models::StockShortfall;

/// API errors, classified from the HTTP status or transport failure.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session expired, please log in again")]
    AuthExpired,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        /// Parsed error body, when the backend sent JSON
        body: Option<serde_json::Value>,
    },

    /// Rejected locally before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Client configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Items listed under `insufficientStock` in a rejected dispense.
    pub fn insufficient_stock(&self) -> Option<Vec<StockShortfall>> {
        match self {
            ApiError::Status {
                body: Some(body), ..
            } => body
                .get("insufficientStock")
                .and_then(|items| serde_json::from_value(items.clone()).ok()),
            _ => None,
        }
    }

    /// HTTP status, for errors that came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthExpired => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Server { status, .. } | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Session lifecycle notifications for the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Anonymous,
    Active,
    LoginRequired,
}

/// Build the error for a non-2xx response.
pub fn classify_status(status: StatusCode, body: &str, fallback: &str) -> ApiError {
    let json: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = json
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string());

    match status {
        StatusCode::UNAUTHORIZED => ApiError::AuthExpired,
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        s if s.is_server_error() => ApiError::Server {
            status: s.as_u16(),
            message,
        },
        s => ApiError::Status {
            status: s.as_u16(),
            message,
            body: json,
        },
    }
}

/// Authenticated JSON client for `{base}/api/{version}`.
pub struct ApiClient {
    http: reqwest::Client,
    root: String,
    timeout: Duration,
    token: RwLock<Option<String>>,
    events: watch::Sender<SessionEvent>,
    session_store: Option<Arc<Mutex<Database>>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let root = config.api_root()?.as_str().trim_end_matches('/').to_string();
        let timeout = config.request_timeout();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("X-Forwarded-Proto", HeaderValue::from_static("https"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let (events, _) = watch::channel(SessionEvent::Anonymous);
        Ok(Self {
            http,
            root,
            timeout,
            token: RwLock::new(None),
            events,
            session_store: None,
        })
    }

    /// Also clear the persisted session in `db` when the backend answers 401.
    pub fn with_session_store(mut self, db: Arc<Mutex<Database>>) -> Self {
        self.session_store = Some(db);
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
        self.events.send_replace(SessionEvent::Active);
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
        self.events.send_replace(SessionEvent::Anonymous);
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub fn session_events(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Request builder for a path under the API root.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.root, path.trim_start_matches('/'));
        self.http.request(method, url)
    }

    /// Send a request and decode a JSON body.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> ApiResult<T> {
        let bytes = self.send_bytes(request, what).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(what, error = %e, "undecodable response body");
            ApiError::Decode(format!("{}: {}", what, e))
        })
    }

    /// Send a request and return the raw body of a 2xx response.
    pub(crate) async fn send_bytes(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> ApiResult<Vec<u8>> {
        let request = match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| self.transport_error(e, what))?;
        let status = response.status();

        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| self.transport_error(e, what))?;
            return Ok(bytes.to_vec());
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_status(status, &body, &format!("Failed to {}", what));
        match &err {
            ApiError::AuthExpired => {
                tracing::warn!(what, "session expired, clearing token");
                *self.token.write().await = None;
                self.forget_stored_session();
                self.events.send_replace(SessionEvent::LoginRequired);
            }
            ApiError::Server { status, message } => {
                tracing::error!(what, status, %message, "server error");
            }
            other => {
                tracing::warn!(what, status = status.as_u16(), error = %other, "request rejected");
            }
        }
        Err(err)
    }

    fn forget_stored_session(&self) {
        let Some(store) = &self.session_store else {
            return;
        };
        match store.lock() {
            Ok(db) => {
                if let Err(e) = db.clear_session() {
                    tracing::warn!(error = %e, "failed to clear stored session");
                }
            }
            Err(_) => tracing::warn!("session store lock poisoned"),
        }
    }

    fn transport_error(&self, e: reqwest::Error, what: &str) -> ApiError {
        if e.is_timeout() {
            tracing::warn!(what, timeout = ?self.timeout, "request timed out");
            ApiError::Timeout(self.timeout)
        } else if e.is_decode() {
            ApiError::Decode(format!("{}: {}", what, e))
        } else {
            tracing::warn!(what, error = %e, "network error");
            ApiError::Network(e.to_string())
        }
    }
}
