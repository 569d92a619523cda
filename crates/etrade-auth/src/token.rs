//! OAuth token endpoint interactions
//!
//! 1. Request token (unauthorized, `oob` callback)
//! 2. Access token (request token + verifier)
//! 3. Renew access token (keeps an idle token alive; status doubles as a validity probe)
//! 4. Revoke access token
//!
//! Steps 1 and 2 are signed with the consumer secret only (plus the request
//! token secret for step 2) and return form-encoded token pairs. Steps 3 and 4
//! are ordinary signed session requests.

use common::Secret;
use reqwest::header::AUTHORIZATION;
use tracing::debug;

use crate::constants::{AUTHORIZE_URL, CALLBACK_OOB};
use crate::endpoints::Endpoints;
use crate::error::{Error, Result};
use crate::oauth1::{self, OAuthParams};
use crate::session::{Consumer, Session};

/// Token and secret returned by the request-token and access-token endpoints.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub token: String,
    pub secret: Secret<String>,
}

/// Outcome of a renewal request that reached the server.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authorize page URL for a request token.
pub fn build_authorize_url(consumer_key: &str, request_token: &str) -> String {
    format!(
        "{AUTHORIZE_URL}?key={}&token={}",
        oauth1::percent_encode(consumer_key),
        oauth1::percent_encode(request_token)
    )
}

/// Obtain an unauthorized request token.
pub async fn request_token(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    consumer: &Consumer,
) -> Result<TokenPair> {
    let url = endpoints.request_token();
    let oauth = OAuthParams::new(&consumer.key).with_callback(CALLBACK_OOB);
    let authorization =
        oauth1::authorization_header("GET", &url, &[], &oauth, consumer.secret.expose(), "")?;

    let response = client
        .get(&url)
        .header(AUTHORIZATION, authorization)
        .send()
        .await
        .map_err(|e| Error::Http(format!("request token request failed: {e}")))?;

    parse_token_response(response, "request token").await
}

/// Exchange an authorized request token and its verifier for an access token.
pub async fn access_token(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    consumer: &Consumer,
    request: &TokenPair,
    verifier: &str,
) -> Result<TokenPair> {
    let url = endpoints.access_token();
    let oauth = OAuthParams::new(&consumer.key)
        .with_token(&request.token)
        .with_verifier(verifier);
    let authorization = oauth1::authorization_header(
        "GET",
        &url,
        &[],
        &oauth,
        consumer.secret.expose(),
        request.secret.expose(),
    )?;

    let response = client
        .get(&url)
        .header(AUTHORIZATION, authorization)
        .send()
        .await
        .map_err(|e| Error::Http(format!("access token request failed: {e}")))?;

    parse_token_response(response, "access token").await
}

/// Renew the session's access token.
///
/// A non-success status is returned as `Ok` with `is_success() == false`;
/// only transport failures are errors.
pub async fn renew_access_token(session: &Session, endpoints: &Endpoints) -> Result<ProbeResponse> {
    let response = session.get(&endpoints.renew_access_token(), &[]).await?;
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    debug!(status, "renew access token responded");
    Ok(ProbeResponse { status, body })
}

/// Revoke the session's access token.
pub async fn revoke_access_token(session: &Session, endpoints: &Endpoints) -> Result<()> {
    let response = session.get(&endpoints.revoke_access_token(), &[]).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "revoke endpoint returned {status}: {body}"
        )));
    }
    debug!("access token revoked");
    Ok(())
}

async fn parse_token_response(response: reqwest::Response, what: &str) -> Result<TokenPair> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading {what} response: {e}")))?;

    if !status.is_success() {
        return Err(Error::TokenExchange(format!(
            "{what} endpoint returned {status}: {body}"
        )));
    }

    let pairs = oauth1::parse_form(&body);
    let field = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };

    match (field("oauth_token"), field("oauth_token_secret")) {
        (Some(token), Some(secret)) => Ok(TokenPair {
            token,
            secret: Secret::new(secret),
        }),
        _ => Err(Error::TokenExchange(format!(
            "{what} response missing oauth_token or oauth_token_secret"
        ))),
    }
}
