// src/error.rs
// Crate-wide error type. Kinds mirror the semantic categories the router and
// the synchronous API surface need to distinguish — not any particular
// language's exception hierarchy.

use thiserror::Error;

/// Errors raised by any core component.
#[derive(Error, Debug)]
pub enum MemoriaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Transient failure — the router should retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Configuration error at startup — the process refuses to run.
    #[error("fatal configuration error: {0}")]
    Fatal(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MemoriaError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// `NotFound` is treated as a successfully-handled no-op by async
    /// handlers re-reading a possibly-deleted entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the router should retry this error rather than poison it
    /// immediately. Everything except validation/auth/not-found is
    /// considered retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Internal(_))
    }
}

impl From<sqlx::Error> for MemoriaError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            other => Self::Transient(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for MemoriaError {
    fn from(e: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid JSON: {e}"))
    }
}

impl From<anyhow::Error> for MemoriaError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

pub type MemoriaResult<T> = Result<T, MemoriaError>;

/// Attaches context to a foreign error while mapping it into `MemoriaError`.
pub trait ResultExt<T> {
    fn context_internal(self, context: &str) -> MemoriaResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context_internal(self, context: &str) -> MemoriaResult<T> {
        self.map_err(|e| MemoriaError::Internal(format!("{context}: {e}")))
    }
}
