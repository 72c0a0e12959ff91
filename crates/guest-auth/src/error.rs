//! Error types for authentication calls and token storage

/// Errors from auth endpoint calls and the token store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("auth endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid auth response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("token store parse error: {0}")]
    StoreParse(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
