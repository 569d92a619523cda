//! Order listing and entry
//!
//! Orders are previewed first and then placed by echoing the preview back
//! with its preview ids. The buy/sell helpers size the order against the
//! active account's cash or holdings and return `Ok(None)` when nothing can
//! be bought or sold. After any order or cancel the account list is
//! reloaded so the active account's cash and positions stay current.

use reqwest::Method;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::client::{Client, array_at, extract, query};
use crate::error::{Error, Result};

pub const DEFAULT_ORDER_COUNT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderTerm {
    #[default]
    GoodUntilCancel,
    GoodForDay,
    ImmediateOrCancel,
    FillOrKill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketSession {
    #[default]
    Regular,
    Extended,
}

/// An equity order to preview.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub symbol: String,
    pub action: OrderAction,
    pub quantity: u64,
    pub price_type: PriceType,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub market_session: MarketSession,
    pub order_term: OrderTerm,
    pub all_or_none: bool,
    /// Generated from the current time when absent.
    pub client_order_id: Option<String>,
}

impl OrderSpec {
    pub fn market(symbol: impl Into<String>, action: OrderAction, quantity: u64) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            quantity,
            price_type: PriceType::Market,
            limit_price: None,
            stop_price: None,
            market_session: MarketSession::default(),
            order_term: OrderTerm::default(),
            all_or_none: false,
            client_order_id: None,
        }
    }

    pub fn limit(
        symbol: impl Into<String>,
        action: OrderAction,
        quantity: u64,
        limit_price: Decimal,
    ) -> Self {
        Self {
            price_type: PriceType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, action, quantity)
        }
    }

    /// `PreviewOrderRequest` body.
    fn preview_request(&self, client_order_id: &str) -> Value {
        let price = |p: Option<Decimal>| p.map(|d| d.to_string()).unwrap_or_default();
        json!({
            "PreviewOrderRequest": {
                "orderType": "EQ",
                "clientOrderId": client_order_id,
                "Order": [{
                    "allOrNone": self.all_or_none.to_string(),
                    "priceType": self.price_type,
                    "orderTerm": self.order_term,
                    "marketSession": self.market_session,
                    "stopPrice": price(self.stop_price),
                    "limitPrice": price(self.limit_price),
                    "Instrument": [{
                        "Product": {"securityType": "EQ", "symbol": self.symbol},
                        "orderAction": self.action,
                        "quantityType": "QUANTITY",
                        "quantity": self.quantity,
                    }],
                }],
            }
        })
    }
}

/// Whole shares `funds` buys at `price`, rounded down. A quotient too large
/// to represent sizes to zero.
pub fn shares_for(price: Decimal, funds: Decimal) -> u64 {
    if price <= Decimal::ZERO || funds <= Decimal::ZERO {
        return 0;
    }
    funds
        .checked_div(price)
        .and_then(|shares| shares.floor().to_u64())
        .unwrap_or(0)
}

impl Client {
    /// Up to `count` orders on the active account.
    pub async fn list_orders(&self, count: u32) -> Result<Vec<Value>> {
        self.orders_with(&[("count", count.to_string())]).await
    }

    pub async fn list_open_orders(&self, count: u32) -> Result<Vec<Value>> {
        self.orders_with(&[("count", count.to_string()), ("status", "OPEN".into())])
            .await
    }

    pub async fn list_executed_orders(&self, count: u32) -> Result<Vec<Value>> {
        self.orders_with(&[("count", count.to_string()), ("status", "EXECUTED".into())])
            .await
    }

    pub async fn list_ticker_orders(&self, symbol: &str, count: u32) -> Result<Vec<Value>> {
        self.orders_with(&[("count", count.to_string()), ("symbol", symbol.to_string())])
            .await
    }

    async fn orders_with(&self, params: &[(&str, String)]) -> Result<Vec<Value>> {
        let id_key = self.active_id_key(None).await?;
        let path = format!("v1/accounts/{id_key}/orders.json");
        let response = self.get_json(&path, &query(params)).await?;
        Ok(array_at(&response, "/OrdersResponse/Order"))
    }

    /// Preview an order on the active account; returns `PreviewOrderResponse`.
    pub async fn preview_order(&self, spec: &OrderSpec) -> Result<Value> {
        let id_key = self.active_id_key(None).await?;
        let path = format!("v1/accounts/{id_key}/orders/preview.json");
        let client_order_id = spec
            .client_order_id
            .clone()
            .unwrap_or_else(generate_client_order_id);
        let response = self
            .send_json(Method::POST, &path, &spec.preview_request(&client_order_id))
            .await?;
        reject_embedded_error(&response)?;
        extract(&path, &response, "/PreviewOrderResponse")
    }

    /// Place a previously previewed order. The returned order object carries
    /// the new `orderId`.
    async fn place_previewed(&self, preview: &Value) -> Result<Value> {
        let id_key = self.active_id_key(None).await?;
        let path = format!("v1/accounts/{id_key}/orders/place.json");
        let request = json!({
            "PlaceOrderRequest": {
                "orderType": preview.get("orderType").cloned().unwrap_or_else(|| json!("EQ")),
                "clientOrderId": generate_client_order_id(),
                "PreviewIds": preview.get("PreviewIds").cloned().unwrap_or(Value::Null),
                "Order": preview.get("Order").cloned().unwrap_or(Value::Null),
            }
        });
        let response = self.send_json(Method::POST, &path, &request).await?;
        reject_embedded_error(&response)?;

        let mut order: Value = extract(&path, &response, "/PlaceOrderResponse/Order/0")?;
        let order_id: Value = extract(&path, &response, "/PlaceOrderResponse/OrderIds/0/orderId")?;
        if let Value::Object(fields) = &mut order {
            fields.insert("orderId".into(), order_id.clone());
        }
        info!(order_id = %order_id, "order placed");
        Ok(order)
    }

    async fn preview_and_place(&self, spec: OrderSpec) -> Result<Value> {
        let preview = self.preview_order(&spec).await?;
        let placed = self.place_previewed(&preview).await?;
        self.refresh_active_account().await?;
        Ok(placed)
    }

    /// Buy as many whole shares as `dollars` (capped at available cash) buys
    /// at the current ask.
    pub async fn place_market_buy_order(&self, symbol: &str, dollars: Decimal) -> Result<Option<Value>> {
        let price = self.ask_price(symbol).await?;
        let funds = self.account().await.cash_available.unwrap_or_default();
        let shares = shares_for(price, dollars.min(funds));
        if shares == 0 {
            warn!(symbol, %price, %dollars, %funds, "insufficient funds for one share");
            return Ok(None);
        }
        self.preview_and_place(OrderSpec::market(symbol, OrderAction::Buy, shares))
            .await
            .map(Some)
    }

    /// Sell up to `shares`, capped at shares held and not already committed
    /// to open orders.
    pub async fn place_market_sell_order(&self, symbol: &str, shares: u64) -> Result<Option<Value>> {
        let shares = shares.min(self.available_shares(symbol).await?);
        if shares == 0 {
            warn!(symbol, "no available holdings to sell");
            return Ok(None);
        }
        self.preview_and_place(OrderSpec::market(symbol, OrderAction::Sell, shares))
            .await
            .map(Some)
    }

    pub async fn place_limit_buy_order(
        &self,
        symbol: &str,
        shares: u64,
        limit_price: Decimal,
    ) -> Result<Option<Value>> {
        let funds = self.account().await.cash_available.unwrap_or_default();
        let shares = shares.min(shares_for(limit_price, funds));
        if shares == 0 {
            warn!(symbol, %limit_price, %funds, "insufficient funds for one share");
            return Ok(None);
        }
        self.preview_and_place(OrderSpec::limit(symbol, OrderAction::Buy, shares, limit_price))
            .await
            .map(Some)
    }

    pub async fn place_limit_sell_order(
        &self,
        symbol: &str,
        shares: u64,
        limit_price: Decimal,
    ) -> Result<Option<Value>> {
        let shares = shares.min(self.available_shares(symbol).await?);
        if shares == 0 {
            warn!(symbol, "no available holdings to sell");
            return Ok(None);
        }
        self.preview_and_place(OrderSpec::limit(symbol, OrderAction::Sell, shares, limit_price))
            .await
            .map(Some)
    }

    /// Shares of `symbol` held on the active account minus shares already
    /// committed to open orders.
    async fn available_shares(&self, symbol: &str) -> Result<u64> {
        let held = self.account().await.holdings_of(symbol);
        let allocated: Decimal = self
            .list_open_orders(DEFAULT_ORDER_COUNT)
            .await?
            .iter()
            .filter_map(|order| order.pointer("/OrderDetail/0/Instrument/0"))
            .filter(|instrument| {
                instrument.pointer("/Product/symbol").and_then(Value::as_str) == Some(symbol)
            })
            .filter_map(|instrument| {
                instrument
                    .get("orderedQuantity")
                    .and_then(|q| serde_json::from_value::<Decimal>(q.clone()).ok())
            })
            .sum();
        Ok((held - allocated).floor().to_u64().unwrap_or(0))
    }

    /// Cancel an open order; returns `CancelOrderResponse`.
    pub async fn cancel_order(&self, order_id: u64) -> Result<Value> {
        let id_key = self.active_id_key(None).await?;
        let path = format!("v1/accounts/{id_key}/orders/cancel.json");
        let body = json!({"CancelOrderRequest": {"orderId": order_id}});
        let response = self.send_json(Method::PUT, &path, &body).await?;
        reject_embedded_error(&response)?;
        let cancelled = extract(&path, &response, "/CancelOrderResponse")?;
        info!(order_id, "order cancelled");
        self.refresh_active_account().await?;
        Ok(cancelled)
    }
}

/// Error payloads sometimes arrive with a 200 status.
fn reject_embedded_error(response: &Value) -> Result<()> {
    match response.get("Error") {
        Some(error) => Err(Error::OrderRejected(
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| error.to_string()),
        )),
        None => Ok(()),
    }
}

/// Provider limit is 20 characters; millisecond timestamps fit.
fn generate_client_order_id() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ACCOUNT_KEYS, Provider};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn orders_path(suffix: &str) -> String {
        format!("/v1/accounts/{}/orders{suffix}", ACCOUNT_KEYS[0])
    }

    async fn mount_preview_and_place(provider: &Provider) {
        Mock::given(method("POST"))
            .and(path(orders_path("/preview.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "PreviewOrderResponse": {
                    "orderType": "EQ",
                    "PreviewIds": [{"previewId": 555}],
                    "Order": [{"priceType": "MARKET"}]
                }
            })))
            .mount(&provider.server)
            .await;
        Mock::given(method("POST"))
            .and(path(orders_path("/place.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "PlaceOrderResponse": {
                    "OrderIds": [{"orderId": 901}],
                    "Order": [{"priceType": "MARKET"}]
                }
            })))
            .mount(&provider.server)
            .await;
    }

    async fn request_bodies(provider: &Provider, suffix: &str) -> Vec<Value> {
        let target = orders_path(suffix);
        provider
            .server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == target)
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[test]
    fn share_sizing_rounds_down() {
        assert_eq!(shares_for(dec!(190.25), dec!(1000)), 5);
        assert_eq!(shares_for(dec!(250), dec!(1000)), 4);
        assert_eq!(shares_for(dec!(1500), dec!(1000)), 0);
        assert_eq!(shares_for(dec!(0), dec!(1000)), 0);
        assert_eq!(shares_for(dec!(10), dec!(-5)), 0);
    }

    #[test]
    fn shares_for_overflowing_quotient_is_zero() {
        assert_eq!(shares_for(Decimal::new(1, 28), dec!(1000)), 0);
        assert_eq!(shares_for(dec!(0.0001), Decimal::MAX), 0);
    }

    #[test]
    fn preview_request_shape() {
        let spec = OrderSpec::limit("AAPL", OrderAction::Sell, 3, dec!(201.5));
        let body = spec.preview_request("abc");
        let order = &body["PreviewOrderRequest"]["Order"][0];
        assert_eq!(body["PreviewOrderRequest"]["clientOrderId"], "abc");
        assert_eq!(order["priceType"], "LIMIT");
        assert_eq!(order["orderTerm"], "GOOD_UNTIL_CANCEL");
        assert_eq!(order["marketSession"], "REGULAR");
        assert_eq!(order["allOrNone"], "false");
        assert_eq!(order["limitPrice"], "201.5");
        assert_eq!(order["stopPrice"], "");
        assert_eq!(order["Instrument"][0]["orderAction"], "SELL");
        assert_eq!(order["Instrument"][0]["quantity"], 3);
        assert_eq!(order["Instrument"][0]["Product"]["symbol"], "AAPL");
    }

    #[test]
    fn client_order_id_fits_provider_limit() {
        assert!(generate_client_order_id().len() <= 20);
    }

    #[tokio::test]
    async fn list_open_orders_sends_status_filter() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;
        Mock::given(method("GET"))
            .and(path(orders_path(".json")))
            .and(query_param("status", "OPEN"))
            .and(query_param("count", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "OrdersResponse": {"Order": [{"orderId": 1}, {"orderId": 2}]}
            })))
            .expect(1)
            .mount(&provider.server)
            .await;

        assert_eq!(client.list_open_orders(25).await.unwrap().len(), 2);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn market_buy_sizes_from_budget_and_places() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;
        provider.mount_quote("AAPL", "190.25").await;
        mount_preview_and_place(&provider).await;

        let placed = client
            .place_market_buy_order("AAPL", dec!(600))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(placed["orderId"], 901);
        let previews = request_bodies(&provider, "/preview.json").await;
        let instrument = &previews[0]["PreviewOrderRequest"]["Order"][0]["Instrument"][0];
        assert_eq!(instrument["quantity"], 3);
        assert_eq!(instrument["orderAction"], "BUY");
        let places = request_bodies(&provider, "/place.json").await;
        assert_eq!(
            places[0]["PlaceOrderRequest"]["PreviewIds"][0]["previewId"],
            555
        );
        // Account list reloaded after the order
        assert_eq!(provider.count("/v1/accounts/list.json").await, 2);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn market_buy_without_funds_returns_none() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;
        provider.mount_quote("BRK.A", "600000").await;

        let placed = client
            .place_market_buy_order("BRK.A", dec!(1000000))
            .await
            .unwrap();

        assert!(placed.is_none());
        assert!(request_bodies(&provider, "/preview.json").await.is_empty());
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn limit_buy_at_vanishing_price_returns_none() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;

        let placed = client
            .place_limit_buy_order("AAPL", 5, Decimal::new(1, 28))
            .await
            .unwrap();

        assert!(placed.is_none());
        assert!(request_bodies(&provider, "/preview.json").await.is_empty());
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn sell_is_capped_by_open_orders() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;
        provider.mount_open_orders("AAPL", 4).await;
        mount_preview_and_place(&provider).await;

        client
            .place_limit_sell_order("AAPL", 50, dec!(210))
            .await
            .unwrap()
            .unwrap();

        let previews = request_bodies(&provider, "/preview.json").await;
        let order = &previews[0]["PreviewOrderRequest"]["Order"][0];
        // 10 held, 4 already on open orders
        assert_eq!(order["Instrument"][0]["quantity"], 6);
        assert_eq!(order["limitPrice"], "210");
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn sell_without_holdings_returns_none() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;
        provider.mount_open_orders("AAPL", 0).await;

        assert!(
            client
                .place_market_sell_order("TSLA", 5)
                .await
                .unwrap()
                .is_none()
        );
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn limit_buy_capped_by_cash() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;
        mount_preview_and_place(&provider).await;

        client
            .place_limit_buy_order("AAPL", 100, dec!(200))
            .await
            .unwrap()
            .unwrap();

        let previews = request_bodies(&provider, "/preview.json").await;
        // 1000.50 cash at 200 a share
        assert_eq!(
            previews[0]["PreviewOrderRequest"]["Order"][0]["Instrument"][0]["quantity"],
            5
        );
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn preview_error_payload_is_rejected() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;
        Mock::given(method("POST"))
            .and(path(orders_path("/preview.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Error": {"code": 1037, "message": "The market is closed."}
            })))
            .mount(&provider.server)
            .await;

        let err = client
            .preview_order(&OrderSpec::market("AAPL", OrderAction::Buy, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OrderRejected(ref m) if m == "The market is closed."));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_order_puts_request_and_refreshes() {
        let provider = Provider::start().await;
        let client = provider.connect(true).await;
        Mock::given(method("PUT"))
            .and(path(orders_path("/cancel.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "CancelOrderResponse": {"orderId": 77, "cancelTime": 1700000000000_i64}
            })))
            .expect(1)
            .mount(&provider.server)
            .await;

        let cancelled = client.cancel_order(77).await.unwrap();

        assert_eq!(cancelled["orderId"], 77);
        let bodies = request_bodies(&provider, "/cancel.json").await;
        assert_eq!(bodies[0]["CancelOrderRequest"]["orderId"], 77);
        assert_eq!(provider.count("/v1/accounts/list.json").await, 2);
        client.close().await.unwrap();
    }
}
