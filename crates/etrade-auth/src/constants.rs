//! E*TRADE OAuth constants
//!
//! Public endpoint locations. The consumer key and secret are supplied by the
//! caller; nothing secret lives here.

/// Sandbox API host.
pub const SANDBOX_BASE_URL: &str = "https://apisb.etrade.com";

/// Production API host.
pub const PRODUCTION_BASE_URL: &str = "https://api.etrade.com";

/// Page the user visits to approve access and read the verifier code.
/// Shared by both environments.
pub const AUTHORIZE_URL: &str = "https://us.etrade.com/e/t/etws/authorize";

pub const REQUEST_TOKEN_PATH: &str = "oauth/request_token";
pub const ACCESS_TOKEN_PATH: &str = "oauth/access_token";
pub const RENEW_ACCESS_TOKEN_PATH: &str = "oauth/renew_access_token";
pub const REVOKE_ACCESS_TOKEN_PATH: &str = "oauth/revoke_access_token";

/// Out-of-band callback: the provider displays the verifier instead of
/// redirecting.
pub const CALLBACK_OOB: &str = "oob";

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";
