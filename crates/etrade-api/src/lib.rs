//! E*TRADE REST client
//!
//! `Client` wraps an authorized session and the active account context.
//! Account-scoped calls act on the active account; passing an account id
//! selects that account first and leaves it selected.
//!
//! ```no_run
//! # async fn demo(settings: etrade_api::ClientSettings) -> etrade_api::Result<()> {
//! use std::sync::Arc;
//! let client = etrade_api::Client::connect(settings, Arc::new(etrade_auth::PromptVerifier)).await?;
//! let _quotes = client.quote(&["AAPL"]).await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod client;
pub mod error;
pub mod market;
pub mod orders;

#[cfg(test)]
mod testing;

pub use client::{Client, ClientSettings, DEFAULT_HTTP_TIMEOUT};
pub use error::{Error, Result};
pub use orders::{
    DEFAULT_ORDER_COUNT, MarketSession, OrderAction, OrderSpec, OrderTerm, PriceType, shares_for,
};
