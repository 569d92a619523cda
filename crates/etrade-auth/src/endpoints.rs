//! Environment selection and endpoint URLs

use serde::Deserialize;

use crate::constants::{
    ACCESS_TOKEN_PATH, PRODUCTION_BASE_URL, RENEW_ACCESS_TOKEN_PATH, REQUEST_TOKEN_PATH,
    REVOKE_ACCESS_TOKEN_PATH, SANDBOX_BASE_URL,
};

/// Which E*TRADE deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        }
    }
}

/// Resolved endpoint URLs for one base host.
///
/// Tests point this at a mock server; production code builds it from an
/// `Environment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url }
    }

    pub fn for_environment(environment: Environment) -> Self {
        Self::new(environment.base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_token(&self) -> String {
        self.url(REQUEST_TOKEN_PATH)
    }

    pub fn access_token(&self) -> String {
        self.url(ACCESS_TOKEN_PATH)
    }

    pub fn renew_access_token(&self) -> String {
        self.url(RENEW_ACCESS_TOKEN_PATH)
    }

    pub fn revoke_access_token(&self) -> String {
        self.url(REVOKE_ACCESS_TOKEN_PATH)
    }

    /// Join a relative path (no leading slash required) onto the base host.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
