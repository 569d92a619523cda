//! Client facade
//!
//! `Client::connect` authorizes, loads the account list with balances and
//! holdings, selects the first account, and starts the renewal scheduler.
//! API methods live in `accounts`, `market`, and `orders` as further `impl
//! Client` blocks and share the request helpers here.
//!
//! API methods do not run `check_token` before each call; the scheduler keeps
//! the session fresh. Callers that need a freshness guarantee before a call
//! can run `check_token()` themselves.
//!
//! The account context sits behind its own lock, apart from the auth state:
//! re-authorization never reads or writes account selection, so the two
//! cannot be observed half-updated relative to each other.

use std::sync::Arc;
use std::time::Duration;

use etrade_auth::VerifierAcquirer;
use etrade_session::{
    AccountRecord, ActiveAccount, ActiveAccountContext, AuthSettings, AuthorizationManager,
    RenewalOutcome, RenewalPolicy, TokenRenewalScheduler,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Per-request timeout for API and token calls. Verifier acquisition is not
/// an HTTP call and is not bounded by it.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub auth: AuthSettings,
    pub renewal: RenewalPolicy,
    pub http_timeout: Duration,
}

pub struct Client {
    manager: Arc<AuthorizationManager>,
    scheduler: Mutex<TokenRenewalScheduler>,
    pub(crate) account: RwLock<ActiveAccountContext>,
    base_url: String,
    use_cached_session: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("use_cached_session", &self.use_cached_session)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Authorize and prepare the client. Fails if authorization or the
    /// initial account load fails.
    pub async fn connect(
        settings: ClientSettings,
        verifier: Arc<dyn VerifierAcquirer>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| Error::Request(format!("building HTTP client: {e}")))?;

        let use_cached_session = settings.auth.use_cached_session;
        let base_url = settings.auth.endpoints.base_url().to_string();
        let manager = Arc::new(AuthorizationManager::new(
            settings.auth,
            http_client,
            verifier,
        ));
        manager.authorize(use_cached_session).await?;

        let client = Self {
            manager,
            scheduler: Mutex::new(TokenRenewalScheduler::new()),
            account: RwLock::new(ActiveAccountContext::new()),
            base_url,
            use_cached_session,
        };

        let accounts = client.list_accounts().await?;
        if accounts.is_empty() {
            warn!("no accounts returned for this consumer key");
        } else {
            client.account.write().await.set_by_index(0)?;
        }

        client
            .scheduler
            .lock()
            .await
            .start(client.manager.clone(), &settings.renewal);
        info!(accounts = accounts.len(), base_url = %client.base_url, "client connected");
        Ok(client)
    }

    /// Stop renewal. Without session caching, also revoke the token and
    /// remove the cache file.
    pub async fn close(&self) -> Result<()> {
        self.scheduler.lock().await.cancel().await;
        if !self.use_cached_session {
            let revoked = self.manager.revoke().await;
            self.manager
                .settings()
                .cache
                .clear()
                .await
                .map_err(|e| etrade_session::Error::Cache(e.to_string()))?;
            revoked?;
        }
        info!("client closed");
        Ok(())
    }

    /// Renew or replace the session if it has reached the max age.
    pub async fn check_token(&self) -> Result<RenewalOutcome> {
        Ok(self.manager.check_token().await?)
    }

    pub fn manager(&self) -> &Arc<AuthorizationManager> {
        &self.manager
    }

    pub async fn account(&self) -> ActiveAccount {
        self.account.read().await.snapshot()
    }

    pub async fn accounts(&self) -> Vec<AccountRecord> {
        self.account.read().await.accounts().to_vec()
    }

    pub async fn select_account_by_index(&self, index: isize) -> Result<ActiveAccount> {
        let mut ctx = self.account.write().await;
        ctx.set_by_index(index)?;
        Ok(ctx.snapshot())
    }

    pub async fn select_account_by_id(&self, id: &str) -> Result<ActiveAccount> {
        let mut ctx = self.account.write().await;
        ctx.set_by_id(id)?;
        Ok(ctx.snapshot())
    }

    pub async fn select_account_by_id_key(&self, id_key: &str) -> Result<ActiveAccount> {
        let mut ctx = self.account.write().await;
        ctx.set_by_id_key(id_key)?;
        Ok(ctx.snapshot())
    }

    /// Account an account-scoped call acts on, selecting `account_id` first
    /// when given.
    pub(crate) async fn scoped_account(&self, account_id: Option<&str>) -> Result<ActiveAccount> {
        let mut ctx = self.account.write().await;
        if let Some(id) = account_id {
            ctx.set_by_id(id)?;
        }
        let current = ctx.snapshot();
        if current.id_key.is_none() {
            return Err(Error::NoActiveAccount);
        }
        Ok(current)
    }

    pub(crate) async fn active_id_key(&self, account_id: Option<&str>) -> Result<String> {
        self.scoped_account(account_id)
            .await?
            .id_key
            .ok_or(Error::NoActiveAccount)
    }

    /// Reload the account list and re-select the active account by id key so
    /// its balances and holdings reflect the latest state.
    pub(crate) async fn refresh_active_account(&self) -> Result<()> {
        let id_key = self.account.read().await.id_key().map(str::to_owned);
        self.list_accounts().await?;
        if let Some(id_key) = id_key {
            self.account.write().await.set_by_id_key(&id_key)?;
        }
        Ok(())
    }

    pub(crate) async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let session = self.manager.session().await?;
        debug!(path, "GET");
        let response = session.get(&self.url(path), query).await?;
        read_json(path, response).await
    }

    pub(crate) async fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<Value> {
        let session = self.manager.session().await?;
        debug!(path, %method, "sending JSON body");
        let response = session.send_json(method, &self.url(path), &[], body).await?;
        read_json(path, response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

async fn read_json(endpoint: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Request(format!("reading {endpoint} response: {e}")))?;

    if !status.is_success() {
        return Err(Error::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| Error::Response {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

/// Deserialize the value at `pointer`. Missing values are an error.
pub(crate) fn extract<T: DeserializeOwned>(endpoint: &str, value: &Value, pointer: &str) -> Result<T> {
    let found = value.pointer(pointer).ok_or_else(|| Error::Response {
        endpoint: endpoint.to_string(),
        reason: format!("missing {pointer}"),
    })?;
    serde_json::from_value(found.clone()).map_err(|e| Error::Response {
        endpoint: endpoint.to_string(),
        reason: format!("{pointer}: {e}"),
    })
}

/// Array at `pointer`, or empty when the provider omitted it (it sends an
/// empty body instead of an empty list).
pub(crate) fn array_at(value: &Value, pointer: &str) -> Vec<Value> {
    match value.pointer(pointer) {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}

pub(crate) fn query(pairs: &[(&str, String)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
