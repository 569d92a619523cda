//! Error types for OAuth operations

/// Errors from signing, token exchange, verifier acquisition, and the cache.
///
/// `Http` is reserved for transport failures (connect, timeout, reset). A
/// response with a non-success status is never reported as `Http`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("verifier acquisition failed: {0}")]
    Verifier(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the error came from the network layer rather than a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_))
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
