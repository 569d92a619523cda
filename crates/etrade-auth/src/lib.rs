//! E*TRADE OAuth 1.0a authentication library
//!
//! Signs requests, runs the token endpoint exchanges, and persists the
//! resulting session to a single-record cache file. Session lifecycle
//! decisions (reuse vs. fresh authorization, scheduled renewal) live in the
//! `etrade-session` crate; this crate only performs the individual steps.
//!
//! Authorization flow:
//! 1. `token::request_token()` obtains an unauthorized request token (`oob` callback)
//! 2. `build_authorize_url()` produces the page the user approves access on
//! 3. A `VerifierAcquirer` returns the verifier code shown on that page
//! 4. `token::access_token()` exchanges request token + verifier for an access token
//! 5. `Session::new()` wraps the access token for signed API calls
//! 6. `token::renew_access_token()` keeps the token alive, `revoke_access_token()` ends it

pub mod cache;
pub mod constants;
pub mod endpoints;
pub mod error;
pub mod oauth1;
pub mod session;
pub mod token;
pub mod verifier;

pub use cache::{CredentialCache, SessionCredentials, SessionRecord};
pub use constants::*;
pub use endpoints::{Endpoints, Environment};
pub use error::{Error, Result};
pub use session::{Consumer, Session};
pub use token::{
    ProbeResponse, TokenPair, access_token, build_authorize_url, renew_access_token,
    request_token, revoke_access_token,
};
pub use verifier::{CommandVerifier, PromptVerifier, VerifierAcquirer};
