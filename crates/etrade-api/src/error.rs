//! Error types for API calls

/// Errors from account, market, and order calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Authorization, renewal, or account selection failed.
    #[error(transparent)]
    Session(#[from] etrade_session::Error),

    /// The request could not be signed or sent.
    #[error("request failed: {0}")]
    Request(String),

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response parsed but lacked the expected shape.
    #[error("unexpected response from {endpoint}: {reason}")]
    Response { endpoint: String, reason: String },

    /// The provider returned an error message inside a success response.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("no account selected")]
    NoActiveAccount,
}

impl From<etrade_auth::Error> for Error {
    fn from(e: etrade_auth::Error) -> Self {
        Error::Request(e.to_string())
    }
}

/// Result alias for API calls.
pub type Result<T> = std::result::Result<T, Error>;
