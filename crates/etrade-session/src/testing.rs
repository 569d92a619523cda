//! Shared fixtures for manager and scheduler tests: a mock OAuth provider,
//! a temp cache file, and a verifier that counts its calls.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use etrade_auth::{
    Consumer, CredentialCache, Endpoints, SessionCredentials, SessionRecord, VerifierAcquirer,
};
use tempfile::TempDir;
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::manager::{AuthSettings, AuthorizationManager};

pub(crate) const REQUEST_PATH: &str = "/oauth/request_token";
pub(crate) const ACCESS_PATH: &str = "/oauth/access_token";
pub(crate) const RENEW_PATH: &str = "/oauth/renew_access_token";
pub(crate) const REVOKE_PATH: &str = "/oauth/revoke_access_token";

pub(crate) struct CountingVerifier {
    calls: AtomicUsize,
    fail: bool,
    held: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl CountingVerifier {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make later calls wait for `release` before answering.
    pub(crate) fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.released.notify_one();
    }

    /// Wait until a held call has started.
    pub(crate) async fn entered(&self) {
        self.entered.notified().await;
    }
}

impl VerifierAcquirer for CountingVerifier {
    fn acquire<'a>(
        &'a self,
        _authorize_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = etrade_auth::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.held.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.released.notified().await;
            }
            if self.fail {
                Err(etrade_auth::Error::Verifier("login page timed out".into()))
            } else {
                Ok("verifier-code".to_string())
            }
        })
    }
}

pub(crate) struct Harness {
    pub(crate) server: MockServer,
    pub(crate) verifier: Arc<CountingVerifier>,
    dir: TempDir,
}

impl Harness {
    pub(crate) async fn start() -> Self {
        Self::with_verifier(false).await
    }

    pub(crate) async fn start_with_failing_verifier() -> Self {
        Self::with_verifier(true).await
    }

    async fn with_verifier(fail: bool) -> Self {
        Self {
            server: MockServer::start().await,
            verifier: Arc::new(CountingVerifier {
                calls: AtomicUsize::new(0),
                fail,
                held: AtomicBool::new(false),
                entered: Notify::new(),
                released: Notify::new(),
            }),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub(crate) fn cache(&self) -> CredentialCache {
        CredentialCache::new(self.dir.path().join("session.cache"))
    }

    pub(crate) fn manager(&self, use_cached_session: bool) -> AuthorizationManager {
        self.manager_with_client(use_cached_session, reqwest::Client::new())
    }

    pub(crate) fn manager_with_timeout(
        &self,
        use_cached_session: bool,
        timeout: Duration,
    ) -> AuthorizationManager {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap();
        self.manager_with_client(use_cached_session, client)
    }

    fn manager_with_client(
        &self,
        use_cached_session: bool,
        client: reqwest::Client,
    ) -> AuthorizationManager {
        let settings = AuthSettings {
            endpoints: Endpoints::new(self.server.uri()),
            consumer: Consumer::new("ck_test", "cs_test"),
            cache: self.cache(),
            use_cached_session,
            max_session_age: Duration::from_secs(4 * 3600),
        };
        AuthorizationManager::new(settings, client, self.verifier.clone())
    }

    /// Request-token and access-token endpoints that always succeed.
    pub(crate) async fn mount_handshake(&self, access_token: &str) {
        Mock::given(method("GET"))
            .and(path(REQUEST_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("oauth_token=rt-1&oauth_token_secret=rts-1&oauth_callback_confirmed=true"),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(ACCESS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "oauth_token={access_token}&oauth_token_secret=ats-{access_token}"
            )))
            .mount(&self.server)
            .await;
    }

    pub(crate) async fn mount_request_token_status(&self, status: u16) {
        Mock::given(path(REQUEST_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string("oauth_problem=nope"))
            .mount(&self.server)
            .await;
    }

    pub(crate) async fn mount_renew(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(RENEW_PATH))
            .respond_with(
                ResponseTemplate::new(status).set_body_string("Access Token has been renewed"),
            )
            .mount(&self.server)
            .await;
    }

    /// Renewal endpoint that answers long after any client timeout used in tests.
    pub(crate) async fn mount_renew_hanging(&self) {
        Mock::given(path(RENEW_PATH))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&self.server)
            .await;
    }

    pub(crate) async fn mount_revoke(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(REVOKE_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub(crate) async fn count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }

    /// Poll until `n` requests hit `request_path`, failing after five seconds.
    pub(crate) async fn wait_for_requests(&self, request_path: &str, n: usize) {
        for _ in 0..500 {
            if self.count(request_path).await >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {n} requests to {request_path}");
    }
}

/// A complete record as a previous run would have cached it.
pub(crate) fn cached_record(access_token: &str) -> SessionRecord {
    SessionRecord {
        request_token: "rt-old".into(),
        request_token_secret: "rts-old".into(),
        authorize_url: "https://us.etrade.com/e/t/etws/authorize?key=ck_test&token=rt-old".into(),
        verifier: "old-code".into(),
        session: SessionCredentials {
            consumer_key: "ck_test".into(),
            consumer_secret: "cs_test".into(),
            access_token: access_token.into(),
            access_token_secret: format!("ats-{access_token}"),
        },
    }
}
