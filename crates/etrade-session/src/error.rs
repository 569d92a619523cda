//! Error types for session and account-context operations

/// Errors from authorization, renewal, and account selection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request-token or access-token exchange failed. Fatal to `authorize()`.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The verifier acquirer gave up. Propagated unchanged in meaning.
    #[error("verifier acquisition failed: {0}")]
    Verifier(String),

    /// Renewal or revoke request never got a response.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("token revoke failed: {0}")]
    Revoke(String),

    #[error("no authorized session")]
    NotAuthorized,

    #[error("credential cache error: {0}")]
    Cache(String),

    #[error("invalid account reference: {0}")]
    InvalidAccountReference(String),

    #[error("account index {index} is out of range, {}", valid_range(.len))]
    IndexOutOfRange { index: isize, len: usize },
}

fn valid_range(len: &usize) -> String {
    match *len {
        0 => "no accounts are loaded".to_string(),
        n => format!("expected a value between 0 and {}", n - 1),
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
