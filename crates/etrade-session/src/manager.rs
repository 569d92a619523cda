//! Authorization state machine
//!
//! `AuthorizationManager` owns the one `AuthState` of a client. Every
//! operation that reads the session start time and then acts on it
//! (`authorize`, `check_token`, `revoke`) holds the state mutex for the whole
//! sequence, network calls included, so the scheduler and an explicit caller
//! can never interleave a re-authorization.
//!
//! API calls don't touch that mutex. They read `session()`, a snapshot slot
//! swapped only once a replacement session is fully built, so a foreground
//! request never sees a half-reset state and never waits on the verifier.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use etrade_auth::{
    Consumer, CredentialCache, Endpoints, ProbeResponse, Session, SessionCredentials,
    SessionRecord, TokenPair, VerifierAcquirer, build_authorize_url, token,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::renewal::{
    ProbeOutcome, RenewalAction, RenewalOutcome, Staleness, assess_staleness, next_action,
};

/// Everything the manager needs to talk to the provider.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub endpoints: Endpoints,
    pub consumer: Consumer,
    pub cache: CredentialCache,
    /// Whether `check_token` re-authorizes through the cache.
    pub use_cached_session: bool,
    /// Session age at which `check_token` sends a renewal probe.
    pub max_session_age: Duration,
}

/// Transient OAuth state of the current handshake and session.
#[derive(Default)]
struct AuthState {
    request_token: Option<TokenPair>,
    authorize_url: Option<String>,
    verifier: Option<String>,
    session: Option<Arc<Session>>,
    session_started_ms: u64,
}

impl AuthState {
    fn from_record(record: &SessionRecord, session: Arc<Session>) -> Self {
        Self {
            request_token: Some(TokenPair {
                token: record.request_token.clone(),
                secret: Secret::from(record.request_token_secret.as_str()),
            }),
            authorize_url: Some(record.authorize_url.clone()),
            verifier: Some(record.verifier.clone()),
            session: Some(session),
            session_started_ms: now_millis(),
        }
    }

    /// Persistable record, if a handshake has completed.
    fn record(&self) -> Option<SessionRecord> {
        let request = self.request_token.as_ref()?;
        Some(SessionRecord {
            request_token: request.token.clone(),
            request_token_secret: request.secret.expose().clone(),
            authorize_url: self.authorize_url.clone()?,
            verifier: self.verifier.clone()?,
            session: self.session.as_ref()?.credentials(),
        })
    }

    fn age(&self) -> Duration {
        Duration::from_millis(now_millis().saturating_sub(self.session_started_ms))
    }
}

pub struct AuthorizationManager {
    settings: AuthSettings,
    http_client: reqwest::Client,
    verifier: Arc<dyn VerifierAcquirer>,
    state: Mutex<AuthState>,
    current: RwLock<Option<Arc<Session>>>,
}

impl std::fmt::Debug for AuthorizationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AuthorizationManager {
    pub fn new(
        settings: AuthSettings,
        http_client: reqwest::Client,
        verifier: Arc<dyn VerifierAcquirer>,
    ) -> Self {
        Self {
            settings,
            http_client,
            verifier,
            state: Mutex::new(AuthState::default()),
            current: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Obtain a usable session.
    ///
    /// With `use_cached_session` false the handshake always runs and the
    /// cache is neither read nor written. Otherwise a cached record is
    /// accepted only if a renewal probe succeeds, in which case the cache
    /// file is left untouched; any other outcome discards it, runs the
    /// handshake, and stores the new record.
    pub async fn authorize(&self, use_cached_session: bool) -> Result<Arc<Session>> {
        let mut state = self.state.lock().await;
        self.authorize_locked(&mut state, use_cached_session).await
    }

    async fn authorize_locked(
        &self,
        state: &mut AuthState,
        use_cached_session: bool,
    ) -> Result<Arc<Session>> {
        if !use_cached_session {
            return self.fresh_authorization(state).await;
        }

        let cache = &self.settings.cache;
        match cache.load().await {
            None => debug!("no cached session, starting handshake"),
            Some(record) => match self.probe_cached(&record).await {
                Ok(session) => {
                    *state = AuthState::from_record(&record, session.clone());
                    self.install(session.clone()).await;
                    metrics::counter!("etrade_authorizations_total", "source" => "cached")
                        .increment(1);
                    info!("cached session accepted");
                    return Ok(session);
                }
                Err(reason) => {
                    info!(reason = %reason, "cached session rejected, discarding cache");
                    if let Err(e) = cache.clear().await {
                        warn!(error = %e, "failed to clear credential cache");
                    }
                }
            },
        }

        let session = self.fresh_authorization(state).await?;
        if let Some(record) = state.record()
            && let Err(e) = cache.store(&record).await
        {
            warn!(
                path = %cache.path().display(),
                error = %e,
                "failed to store session, next start will run the handshake again"
            );
        }
        Ok(session)
    }

    /// Rebuild a session from a cached record and confirm it with a renewal
    /// probe. The error is a reason for the log, not a failure of `authorize`.
    async fn probe_cached(&self, record: &SessionRecord) -> std::result::Result<Arc<Session>, String> {
        if record.session.consumer_key != self.settings.consumer.key {
            return Err("cached session belongs to a different consumer key".into());
        }
        let session = Session::new(self.http_client.clone(), &record.session)
            .map_err(|e| e.to_string())?;
        match token::renew_access_token(&session, &self.settings.endpoints).await {
            Ok(probe) if probe.is_success() => Ok(Arc::new(session)),
            Ok(probe) => Err(format!("renewal probe returned {}", probe.status)),
            Err(e) => Err(format!("renewal probe failed: {e}")),
        }
    }

    /// Full three-legged handshake. The verifier step may wait on a human and
    /// runs without a timeout.
    async fn fresh_authorization(&self, state: &mut AuthState) -> Result<Arc<Session>> {
        *state = AuthState::default();
        let consumer = &self.settings.consumer;
        let endpoints = &self.settings.endpoints;

        let request = token::request_token(&self.http_client, endpoints, consumer)
            .await
            .map_err(|e| Error::Authorization(e.to_string()))?;
        let authorize_url = build_authorize_url(&consumer.key, &request.token);
        state.request_token = Some(request.clone());
        state.authorize_url = Some(authorize_url.clone());

        info!("waiting for verifier code");
        let verifier = self
            .verifier
            .acquire(&authorize_url)
            .await
            .map_err(|e| Error::Verifier(e.to_string()))?;
        state.verifier = Some(verifier.clone());

        let access = token::access_token(&self.http_client, endpoints, consumer, &request, &verifier)
            .await
            .map_err(|e| Error::Authorization(e.to_string()))?;
        let credentials = SessionCredentials {
            consumer_key: consumer.key.clone(),
            consumer_secret: consumer.secret.expose().clone(),
            access_token: access.token,
            access_token_secret: access.secret.expose().clone(),
        };
        let session = Arc::new(
            Session::new(self.http_client.clone(), &credentials)
                .map_err(|e| Error::Authorization(e.to_string()))?,
        );

        state.session = Some(session.clone());
        state.session_started_ms = now_millis();
        self.install(session.clone()).await;
        metrics::counter!("etrade_authorizations_total", "source" => "fresh").increment(1);
        info!("authorization complete");
        Ok(session)
    }

    async fn install(&self, session: Arc<Session>) {
        *self.current.write().await = Some(session);
    }

    /// Send a renewal request with the current session.
    ///
    /// A non-success status comes back as `Ok`; only transport failures are
    /// errors.
    pub async fn renewal_probe(&self) -> Result<ProbeResponse> {
        let session = self.session().await?;
        token::renew_access_token(&session, &self.settings.endpoints)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    /// Revoke the current access token and drop the session.
    pub async fn revoke(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let session = state.session.clone().ok_or(Error::NotAuthorized)?;
        token::revoke_access_token(&session, &self.settings.endpoints)
            .await
            .map_err(|e| {
                if e.is_transport() {
                    Error::Transport(e.to_string())
                } else {
                    Error::Revoke(e.to_string())
                }
            })?;
        *state = AuthState::default();
        *self.current.write().await = None;
        info!("access token revoked");
        Ok(())
    }

    /// Snapshot of the current session for API calls.
    pub async fn session(&self) -> Result<Arc<Session>> {
        self.current.read().await.clone().ok_or(Error::NotAuthorized)
    }

    /// Time since the current session was obtained or last renewed.
    pub async fn session_age(&self) -> Option<Duration> {
        let state = self.state.lock().await;
        state.session.as_ref().map(|_| state.age())
    }

    /// Renew or replace the session if it has reached the max age.
    ///
    /// A rejected renewal re-authorizes; a renewal that gets no response
    /// also purges the cache first. Each call makes at most one
    /// re-authorization attempt. With no session at all (a previous
    /// re-authorization failed) this re-authorizes directly.
    pub async fn check_token(&self) -> Result<RenewalOutcome> {
        let result = self.check_token_inner().await;
        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "failed",
        };
        metrics::counter!("etrade_renewal_checks_total", "outcome" => label).increment(1);
        result
    }

    async fn check_token_inner(&self) -> Result<RenewalOutcome> {
        let mut state = self.state.lock().await;
        let use_cache = self.settings.use_cached_session;

        let Some(session) = state.session.clone() else {
            warn!("no session to check, re-authorizing");
            self.authorize_locked(&mut state, use_cache).await?;
            return Ok(RenewalOutcome::Reauthorized);
        };

        let age = state.age();
        if assess_staleness(age, self.settings.max_session_age) == Staleness::Fresh {
            debug!(age_secs = age.as_secs(), "session fresh");
            return Ok(RenewalOutcome::Fresh);
        }

        let outcome = match token::renew_access_token(&session, &self.settings.endpoints).await {
            Ok(probe) if probe.is_success() => ProbeOutcome::Accepted,
            Ok(probe) => ProbeOutcome::Rejected {
                status: probe.status,
            },
            Err(e) if e.is_transport() => {
                warn!(error = %e, "renewal request got no response");
                ProbeOutcome::TransportFailed
            }
            Err(e) => return Err(Error::Authorization(e.to_string())),
        };

        match next_action(outcome) {
            RenewalAction::ResetClock => {
                state.session_started_ms = now_millis();
                info!(age_secs = age.as_secs(), "access token renewed");
                Ok(RenewalOutcome::Renewed)
            }
            RenewalAction::Reauthorize => {
                info!(?outcome, "renewal rejected, re-authorizing");
                self.authorize_locked(&mut state, use_cache).await?;
                Ok(RenewalOutcome::Reauthorized)
            }
            RenewalAction::PurgeAndReauthorize => {
                self.settings
                    .cache
                    .clear()
                    .await
                    .map_err(|e| Error::Cache(e.to_string()))?;
                self.authorize_locked(&mut state, use_cache).await?;
                Ok(RenewalOutcome::Purged)
            }
        }
    }

    /// Move the session start time into the past.
    #[cfg(test)]
    pub(crate) async fn backdate_session(&self, by: Duration) {
        let mut state = self.state.lock().await;
        state.session_started_ms = now_millis().saturating_sub(by.as_millis() as u64);
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
