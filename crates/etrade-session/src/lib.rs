//! Session lifecycle for the E*TRADE client
//!
//! Owns the single authenticated session of a client instance: deciding
//! between cache reuse and a fresh handshake, renewing the token on a
//! schedule, and tracking which account account-scoped calls act on.
//!
//! Session lifecycle:
//! 1. `AuthorizationManager::authorize(true)` loads the cache and probes it with a renewal call
//! 2. Probe accepted → cached session reused as-is, cache file untouched
//! 3. Probe rejected or no cache → fresh handshake via the `VerifierAcquirer`, cache rewritten
//! 4. `TokenRenewalScheduler` calls `check_token()` every interval
//! 5. Session older than the max age → renew; rejected → re-authorize; transport error → purge cache, re-authorize
//! 6. Teardown cancels the scheduler before its next tick

pub mod account;
pub mod error;
pub mod manager;
pub mod renewal;

#[cfg(test)]
mod testing;

pub use account::{AccountRecord, ActiveAccount, ActiveAccountContext, Position};
pub use error::{Error, Result};
pub use manager::{AuthSettings, AuthorizationManager};
pub use renewal::{
    ProbeOutcome, RenewalAction, RenewalOutcome, RenewalPolicy, SchedulerState, Staleness,
    TokenRenewalScheduler, assess_staleness, next_action,
};
