//! Error types for gateway requests

use crate::request::ApiResponse;

/// Failures surfaced by [`crate::Gateway::send`].
///
/// An expired access token that refreshes successfully never shows up here;
/// the caller just sees the response to the resent request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network-level failure unrelated to authorization.
    #[error("transport error: {0}")]
    Transport(String),

    /// 401 with no refresh token stored, or after the session was already
    /// ended by another caller. The session is over either way.
    #[error("unauthenticated: backend returned {}", .0.status)]
    Unauthenticated(ApiResponse),

    /// Refresh endpoint rejected the refresh token, was unreachable, or
    /// answered with a malformed body; the session has been ended. Also
    /// returned to queued callers when the refreshing caller was cancelled
    /// (`refresh abandoned`), in which case the tokens are left as they were.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Still 401 after a successful refresh and one resend.
    #[error("request rejected after token refresh: backend returned {}", .0.status)]
    DoubleFailure(ApiResponse),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("token store error: {0}")]
    Store(#[from] guest_auth::Error),
}

impl Error {
    /// The backend response behind this error, when there is one.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Error::Unauthenticated(response) | Error::DoubleFailure(response) => Some(response),
            _ => None,
        }
    }
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
