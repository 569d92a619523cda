//! OAuth 1.0a request signing (RFC 5849) with HMAC-SHA1
//!
//! Builds the signature base string from the method, the base URL, and the
//! sorted, percent-encoded union of query and `oauth_*` parameters, then signs
//! it with `consumer_secret&token_secret`. Request bodies are never part of the
//! signature because every body this client sends is JSON.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::RngExt;
use sha1::Sha1;

use crate::constants::{OAUTH_VERSION, SIGNATURE_METHOD};
use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

const NONCE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Per-request `oauth_*` protocol parameters.
///
/// `token` is absent only for the request-token call; `verifier` is present
/// only for the access-token call; `callback` only for the request-token call.
#[derive(Debug, Clone)]
pub struct OAuthParams<'a> {
    pub consumer_key: &'a str,
    pub token: Option<&'a str>,
    pub verifier: Option<&'a str>,
    pub callback: Option<&'a str>,
    pub nonce: String,
    pub timestamp: u64,
}

impl<'a> OAuthParams<'a> {
    /// Fresh nonce and current timestamp.
    pub fn new(consumer_key: &'a str) -> Self {
        Self {
            consumer_key,
            token: None,
            verifier: None,
            callback: None,
            nonce: generate_nonce(),
            timestamp: unix_timestamp(),
        }
    }

    pub fn with_token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_verifier(mut self, verifier: &'a str) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_callback(mut self, callback: &'a str) -> Self {
        self.callback = Some(callback);
        self
    }

    fn protocol_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(8);
        if let Some(callback) = self.callback {
            params.push(("oauth_callback", callback.to_owned()));
        }
        params.push(("oauth_consumer_key", self.consumer_key.to_owned()));
        params.push(("oauth_nonce", self.nonce.clone()));
        params.push(("oauth_signature_method", SIGNATURE_METHOD.to_owned()));
        params.push(("oauth_timestamp", self.timestamp.to_string()));
        if let Some(token) = self.token {
            params.push(("oauth_token", token.to_owned()));
        }
        if let Some(verifier) = self.verifier {
            params.push(("oauth_verifier", verifier.to_owned()));
        }
        params.push(("oauth_version", OAUTH_VERSION.to_owned()));
        params
    }
}

/// Random 32-character alphanumeric nonce.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    bytes
        .iter()
        .map(|b| NONCE_CHARSET[*b as usize % NONCE_CHARSET.len()] as char)
        .collect()
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// RFC 3986 percent-encoding: everything except ALPHA / DIGIT / `-._~`.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Decode a form-encoded component. `+` becomes a space; malformed escapes
/// are kept literally.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parse an `application/x-www-form-urlencoded` body into decoded pairs.
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    body.trim()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Encode query pairs as `k=v&k=v` in the given order.
pub fn encode_query(query: &[(String, String)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append an encoded query string to a base URL.
pub fn url_with_query(base_url: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        base_url.to_owned()
    } else {
        format!("{base_url}?{}", encode_query(query))
    }
}

/// Signature base string per RFC 5849 §3.4.1.
///
/// `base_url` must not contain a query string; query parameters are passed
/// separately so they can be merged and sorted with the protocol parameters.
pub fn signature_base_string(
    method: &str,
    base_url: &str,
    query: &[(String, String)],
    oauth: &OAuthParams<'_>,
) -> String {
    let mut params: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .chain(
            oauth
                .protocol_params()
                .into_iter()
                .map(|(k, v)| (percent_encode(k), percent_encode(&v))),
        )
        .collect();
    params.sort();

    let normalized = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_url),
        percent_encode(&normalized)
    )
}

/// HMAC-SHA1 over the base string, base64 encoded.
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Signing(format!("invalid signing key: {e}")))?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Full `Authorization: OAuth ...` header value for one request.
pub fn authorization_header(
    method: &str,
    base_url: &str,
    query: &[(String, String)],
    oauth: &OAuthParams<'_>,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String> {
    let base = signature_base_string(method, base_url, query, oauth);
    let signature = sign(&base, consumer_secret, token_secret)?;

    let mut fields: Vec<String> = oauth
        .protocol_params()
        .into_iter()
        .map(|(k, v)| format!("{k}=\"{}\"", percent_encode(&v)))
        .collect();
    fields.push(format!("oauth_signature=\"{}\"", percent_encode(&signature)));

    Ok(format!("OAuth {}", fields.join(", ")))
}
