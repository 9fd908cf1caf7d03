//! Error taxonomy shared by every adapter.
//!
//! Only the two authorization variants halt polling. Everything else is
//! absorbed at the tick boundary and leaves the previous snapshot in place.

use thiserror::Error;

/// Failure raised while authenticating, fetching or mapping provider data.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Authorization code invalid, expired or rejected by the token endpoint.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// Refresh token rejected (revoked, rotated away, or missing).
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    /// Network or HTTP-level failure after at most one refresh-and-retry.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Response did not carry the fields needed for the primary value.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No record in a multi-record response matched the selector.
    #[error("no record matched selector '{0}'")]
    NoMatchingRecord(String),

    /// Credential persistence failed.
    #[error("credential persistence failed: {0}")]
    Io(String),
}

impl AdapterError {
    /// Returns true if this error requires a human to re-authorize.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdapterError::Authorization(_) | AdapterError::TokenRefresh(_)
        )
    }
}

impl From<std::io::Error> for AdapterError {
    fn from(e: std::io::Error) -> Self {
        AdapterError::Io(e.to_string())
    }
}
