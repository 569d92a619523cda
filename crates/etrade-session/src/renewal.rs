//! Background token renewal
//!
//! E*TRADE access tokens go inactive after two idle hours and expire at
//! midnight US Eastern. The scheduler wakes on a fixed interval and asks the
//! manager to check the session age; anything older than the max age is
//! renewed, or replaced when the provider rejects the renewal.
//!
//! The decision logic is kept as pure functions (`assess_staleness`,
//! `next_action`) so it can be tested without a network.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::AuthorizationManager;

/// Timing for the renewal loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenewalPolicy {
    /// Delay before the first check after the scheduler starts.
    #[serde(rename = "initial_delay_secs", with = "secs")]
    pub initial_delay: Duration,
    /// Period between checks.
    #[serde(rename = "interval_secs", with = "secs")]
    pub interval: Duration,
    /// Session age at which a check triggers a renewal probe.
    #[serde(rename = "max_age_secs", with = "secs")]
    pub max_age: Duration,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            interval: Duration::from_secs(3600),
            max_age: Duration::from_secs(4 * 3600),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Stale,
}

/// A session is stale once its age reaches `max_age`.
pub fn assess_staleness(age: Duration, max_age: Duration) -> Staleness {
    if age >= max_age {
        Staleness::Stale
    } else {
        Staleness::Fresh
    }
}

/// Result of a renewal request against the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Accepted,
    Rejected { status: u16 },
    TransportFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalAction {
    /// Token renewed; restart the age clock.
    ResetClock,
    /// Token rejected; authorize again through the cache path.
    Reauthorize,
    /// No response at all; the cached record can't be trusted either.
    PurgeAndReauthorize,
}

pub fn next_action(outcome: ProbeOutcome) -> RenewalAction {
    match outcome {
        ProbeOutcome::Accepted => RenewalAction::ResetClock,
        ProbeOutcome::Rejected { .. } => RenewalAction::Reauthorize,
        ProbeOutcome::TransportFailed => RenewalAction::PurgeAndReauthorize,
    }
}

/// What a `check_token` call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    Fresh,
    Renewed,
    Reauthorized,
    Purged,
}

impl RenewalOutcome {
    /// Label for logs and the checks counter.
    pub fn label(self) -> &'static str {
        match self {
            RenewalOutcome::Fresh => "fresh",
            RenewalOutcome::Renewed => "renewed",
            RenewalOutcome::Reauthorized => "reauthorized",
            RenewalOutcome::Purged => "purged",
        }
    }
}

/// Scheduler lifecycle. `Idle → Running` happens once; `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Cancelled,
}

/// Cancellable periodic task driving `AuthorizationManager::check_token`.
///
/// Cancellation is checked before every check and raced against every sleep,
/// so no check starts after `cancel()`. A check already in flight runs to
/// completion; `cancel()` waits for it. Dropping the scheduler cancels the
/// token without waiting.
#[derive(Debug)]
pub struct TokenRenewalScheduler {
    state: SchedulerState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Default for TokenRenewalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRenewalScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Spawn the renewal loop. Returns false if the scheduler already left `Idle`.
    pub fn start(&mut self, manager: Arc<AuthorizationManager>, policy: &RenewalPolicy) -> bool {
        if self.state != SchedulerState::Idle {
            warn!(state = ?self.state, "renewal scheduler already started");
            return false;
        }

        let cancel = self.cancel.clone();
        let initial_delay = policy.initial_delay;
        let interval = policy.interval;
        self.handle = Some(tokio::spawn(async move {
            run(manager, cancel, initial_delay, interval).await;
        }));
        self.state = SchedulerState::Running;
        info!(
            initial_delay_secs = initial_delay.as_secs(),
            interval_secs = interval.as_secs(),
            "renewal scheduler started"
        );
        true
    }

    /// Stop the loop and wait for it to exit.
    pub async fn cancel(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "renewal task ended abnormally");
        }
        if self.state != SchedulerState::Cancelled {
            debug!("renewal scheduler cancelled");
        }
        self.state = SchedulerState::Cancelled;
    }
}

impl Drop for TokenRenewalScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    manager: Arc<AuthorizationManager>,
    cancel: CancellationToken,
    initial_delay: Duration,
    interval: Duration,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(initial_delay) => {}
    }

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match manager.check_token().await {
            Ok(outcome) => debug!(outcome = outcome.label(), "scheduled token check"),
            Err(e) => warn!(error = %e, "scheduled token check failed, will retry next interval"),
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
