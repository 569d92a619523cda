//! Types shared by the E*TRADE client crates and the `etrader` binary.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
