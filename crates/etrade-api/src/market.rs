//! Market endpoints: quotes and product lookup

use etrade_auth::oauth1::percent_encode;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::client::{Client, array_at, extract};
use crate::error::{Error, Result};

impl Client {
    /// `QuoteData` entries for one or more symbols.
    pub async fn quote(&self, symbols: &[&str]) -> Result<Vec<Value>> {
        let path = format!("v1/market/quote/{}.json", symbols.join(","));
        let response = self.get_json(&path, &[]).await?;
        Ok(array_at(&response, "/QuoteResponse/QuoteData"))
    }

    /// Current ask for `symbol`.
    pub async fn ask_price(&self, symbol: &str) -> Result<Decimal> {
        let quotes = self.quote(&[symbol]).await?;
        let first = quotes.first().ok_or_else(|| Error::Response {
            endpoint: format!("v1/market/quote/{symbol}.json"),
            reason: "no quote data".into(),
        })?;
        extract(&format!("v1/market/quote/{symbol}.json"), first, "/All/ask")
    }

    pub async fn lookup_product(&self, search: &str) -> Result<Value> {
        let path = format!("v1/market/lookup/{}.json", percent_encode(search));
        self.get_json(&path, &[]).await
    }
}
