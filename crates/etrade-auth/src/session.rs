//! Authenticated session handle
//!
//! A `Session` is the result of a completed handshake: consumer credentials
//! plus an access token pair. Every request it builds is OAuth-signed and
//! carries the standard E*TRADE headers.

use std::fmt;

use common::Secret;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;

use crate::cache::SessionCredentials;
use crate::error::{Error, Result};
use crate::oauth1::{self, OAuthParams};

/// Application identity issued by E*TRADE.
#[derive(Debug, Clone)]
pub struct Consumer {
    pub key: String,
    pub secret: Secret<String>,
}

impl Consumer {
    pub fn new(key: impl Into<String>, secret: impl Into<Secret<String>>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

pub struct Session {
    client: reqwest::Client,
    consumer_key: String,
    consumer_secret: Secret<String>,
    access_token: String,
    access_token_secret: Secret<String>,
    headers: HeaderMap,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session from stored or freshly exchanged credentials and
    /// attach the standard headers (`Content-Type`, `consumerKey`).
    pub fn new(client: reqwest::Client, credentials: &SessionCredentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("consumerkey"),
            HeaderValue::from_str(&credentials.consumer_key)
                .map_err(|e| Error::InvalidHeader(format!("consumer key: {e}")))?,
        );

        Ok(Self {
            client,
            consumer_key: credentials.consumer_key.clone(),
            consumer_secret: Secret::from(credentials.consumer_secret.as_str()),
            access_token: credentials.access_token.clone(),
            access_token_secret: Secret::from(credentials.access_token_secret.as_str()),
            headers,
        })
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Plain credentials for persisting to the cache.
    pub fn credentials(&self) -> SessionCredentials {
        SessionCredentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.expose().clone(),
            access_token: self.access_token.clone(),
            access_token_secret: self.access_token_secret.expose().clone(),
        }
    }

    /// Signed request builder. `base_url` must not carry a query string;
    /// pass query parameters separately so they are included in the signature.
    pub fn request(
        &self,
        method: Method,
        base_url: &str,
        query: &[(String, String)],
    ) -> Result<RequestBuilder> {
        let oauth = OAuthParams::new(&self.consumer_key).with_token(&self.access_token);
        let authorization = oauth1::authorization_header(
            method.as_str(),
            base_url,
            query,
            &oauth,
            self.consumer_secret.expose(),
            self.access_token_secret.expose(),
        )?;

        Ok(self
            .client
            .request(method, oauth1::url_with_query(base_url, query))
            .headers(self.headers.clone())
            .header(AUTHORIZATION, authorization))
    }

    pub async fn get(&self, base_url: &str, query: &[(String, String)]) -> Result<Response> {
        self.request(Method::GET, base_url, query)?
            .send()
            .await
            .map_err(|e| Error::Http(format!("GET {base_url} failed: {e}")))
    }

    /// Send a JSON body with the given method (POST for preview/place, PUT for cancel).
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        base_url: &str,
        query: &[(String, String)],
        body: &T,
    ) -> Result<Response> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| Error::Encode(format!("serializing request body: {e}")))?;
        let method_name = method.clone();
        self.request(method, base_url, query)?
            .body(payload)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{method_name} {base_url} failed: {e}")))
    }
}
