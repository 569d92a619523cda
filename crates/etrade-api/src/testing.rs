//! Mock E*TRADE provider for client tests: OAuth endpoints plus two
//! brokerage accounts with a balance and one AAPL position each.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use etrade_auth::{Consumer, CredentialCache, Endpoints, VerifierAcquirer};
use etrade_session::{AuthSettings, RenewalPolicy};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{Client, ClientSettings};

pub(crate) const ACCOUNT_IDS: [&str; 2] = ["84010429", "84010430"];
pub(crate) const ACCOUNT_KEYS: [&str; 2] = ["JIdOIAcSpwR1Jva7RQBraQ", "dBZOKt9xDrtRSAOl4MSiiA"];

struct FixedVerifier;

impl VerifierAcquirer for FixedVerifier {
    fn acquire<'a>(
        &'a self,
        _authorize_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = etrade_auth::Result<String>> + Send + 'a>> {
        Box::pin(async { Ok("verifier-code".to_string()) })
    }
}

pub(crate) struct Provider {
    pub(crate) server: MockServer,
    dir: TempDir,
}

impl Provider {
    pub(crate) async fn start() -> Self {
        let provider = Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().unwrap(),
        };
        provider.mount_oauth().await;
        provider.mount_accounts().await;
        provider
    }

    pub(crate) fn cache_path(&self) -> PathBuf {
        self.dir.path().join("session.cache")
    }

    pub(crate) async fn connect(&self, use_cached_session: bool) -> Client {
        let settings = ClientSettings {
            auth: AuthSettings {
                endpoints: Endpoints::new(self.server.uri()),
                consumer: Consumer::new("ck_test", "cs_test"),
                cache: CredentialCache::new(self.cache_path()),
                use_cached_session,
                max_session_age: Duration::from_secs(4 * 3600),
            },
            renewal: RenewalPolicy {
                initial_delay: Duration::from_secs(3600),
                ..Default::default()
            },
            http_timeout: Duration::from_secs(5),
        };
        Client::connect(settings, Arc::new(FixedVerifier))
            .await
            .unwrap()
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

    async fn mount_oauth(&self) {
        Mock::given(path("/oauth/request_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("oauth_token=rt-1&oauth_token_secret=rts-1"),
            )
            .mount(&self.server)
            .await;
        Mock::given(path("/oauth/access_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("oauth_token=at-1&oauth_token_secret=ats-1"),
            )
            .mount(&self.server)
            .await;
        Mock::given(path("/oauth/renew_access_token"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
        Mock::given(path("/oauth/revoke_access_token"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    async fn mount_accounts(&self) {
        let accounts: Vec<_> = ACCOUNT_IDS
            .iter()
            .zip(ACCOUNT_KEYS)
            .map(|(id, key)| {
                json!({
                    "accountId": id,
                    "accountIdKey": key,
                    "accountMode": "CASH",
                    "accountDesc": "Brokerage",
                    "accountName": "",
                    "accountType": "INDIVIDUAL",
                    "institutionType": "BROKERAGE",
                    "accountStatus": "ACTIVE",
                    "closedDate": 0
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/v1/accounts/list.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "AccountListResponse": {"Accounts": {"Account": accounts}}
            })))
            .mount(&self.server)
            .await;

        for key in ACCOUNT_KEYS {
            Mock::given(method("GET"))
                .and(path(format!("/v1/accounts/{key}/balance.json")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "BalanceResponse": {
                        "accountType": "INDIVIDUAL",
                        "Computed": {
                            "cashAvailableForInvestment": 1000.50,
                            "RealTimeValues": {"totalAccountValue": 5250.75}
                        }
                    }
                })))
                .mount(&self.server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("/v1/accounts/{key}/portfolio.json")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "PortfolioResponse": {"AccountPortfolio": [{
                        "accountId": "x",
                        "Position": [{
                            "positionId": 1,
                            "symbolDescription": "AAPL",
                            "quantity": 10,
                            "marketValue": 1902.5
                        }]
                    }]}
                })))
                .mount(&self.server)
                .await;
        }
    }

    pub(crate) async fn mount_quote(&self, symbol: &str, ask: &str) {
        let ask: f64 = ask.parse().unwrap();
        Mock::given(method("GET"))
            .and(path(format!("/v1/market/quote/{symbol}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "QuoteResponse": {"QuoteData": [
                    {"Product": {"symbol": symbol}, "All": {"ask": ask, "bid": ask - 0.05}}
                ]}
            })))
            .mount(&self.server)
            .await;
    }

    /// One open order on the first account committing `quantity` shares of `symbol`.
    pub(crate) async fn mount_open_orders(&self, symbol: &str, quantity: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{}/orders.json", ACCOUNT_KEYS[0])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "OrdersResponse": {"Order": [{
                    "orderId": 7,
                    "OrderDetail": [{
                        "status": "OPEN",
                        "Instrument": [{
                            "Product": {"symbol": symbol, "securityType": "EQ"},
                            "orderAction": "SELL",
                            "orderedQuantity": quantity
                        }]
                    }]
                }]}
            })))
            .mount(&self.server)
            .await;
    }
}
