//! Account endpoints: list, balance, portfolio, transactions, orders

use etrade_session::{AccountRecord, Position};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::client::{Client, array_at, extract, query};
use crate::error::Result;

const ACCOUNT_LIST: &str = "v1/accounts/list.json";

impl Client {
    /// Fetch all accounts for the consumer key, overlay each with its
    /// balance and positions, and replace the account context's list.
    pub async fn list_accounts(&self) -> Result<Vec<AccountRecord>> {
        let response = self.get_json(ACCOUNT_LIST, &[]).await?;
        let mut accounts: Vec<AccountRecord> = serde_json::from_value(Value::Array(array_at(
            &response,
            "/AccountListResponse/Accounts/Account",
        )))
        .map_err(|e| crate::Error::Response {
            endpoint: ACCOUNT_LIST.to_string(),
            reason: e.to_string(),
        })?;

        for account in &mut accounts {
            self.populate_holdings(account).await?;
        }

        self.account
            .write()
            .await
            .update_account_list(accounts.clone());
        Ok(accounts)
    }

    async fn populate_holdings(&self, account: &mut AccountRecord) -> Result<()> {
        let Some(id_key) = account.account_id_key.clone() else {
            return Ok(());
        };
        let balance = self
            .fetch_balance(
                &id_key,
                account.institution_type.as_deref(),
                account.account_type.as_deref(),
            )
            .await?;
        account.cash_available = decimal_at(&balance, "/Computed/cashAvailableForInvestment");
        account.total_account_value =
            decimal_at(&balance, "/Computed/RealTimeValues/totalAccountValue");
        account.positions = Some(self.fetch_positions(&id_key).await?);
        Ok(())
    }

    /// `BalanceResponse` for the active account, or for `account_id` after
    /// selecting it.
    pub async fn account_balance(&self, account_id: Option<&str>) -> Result<Value> {
        let account = self.scoped_account(account_id).await?;
        let id_key = account.id_key.unwrap_or_default();
        self.fetch_balance(
            &id_key,
            account.institution_type.as_deref(),
            account.account_type.as_deref(),
        )
        .await
    }

    async fn fetch_balance(
        &self,
        id_key: &str,
        institution_type: Option<&str>,
        account_type: Option<&str>,
    ) -> Result<Value> {
        let path = format!("v1/accounts/{id_key}/balance.json");
        let mut params = vec![("realTimeNAV", "true".to_string())];
        if let Some(inst) = institution_type {
            params.push(("instType", inst.to_string()));
        }
        if let Some(kind) = account_type {
            params.push(("accountType", kind.to_string()));
        }
        let response = self.get_json(&path, &query(&params)).await?;
        extract(&path, &response, "/BalanceResponse")
    }

    pub async fn account_positions(&self, account_id: Option<&str>) -> Result<Vec<Position>> {
        let id_key = self.active_id_key(account_id).await?;
        self.fetch_positions(&id_key).await
    }

    async fn fetch_positions(&self, id_key: &str) -> Result<Vec<Position>> {
        let path = format!("v1/accounts/{id_key}/portfolio.json");
        let response = self.get_json(&path, &[]).await?;
        let positions = array_at(&response, "/PortfolioResponse/AccountPortfolio/0/Position");
        serde_json::from_value(Value::Array(positions)).map_err(|e| crate::Error::Response {
            endpoint: path,
            reason: e.to_string(),
        })
    }

    pub async fn transaction_history(&self, account_id: Option<&str>) -> Result<Vec<Value>> {
        let id_key = self.active_id_key(account_id).await?;
        let path = format!("v1/accounts/{id_key}/transactions.json");
        let response = self.get_json(&path, &[]).await?;
        Ok(array_at(&response, "/TransactionListResponse/Transaction"))
    }

    pub async fn transaction_details(
        &self,
        transaction_id: &str,
        account_id: Option<&str>,
    ) -> Result<Value> {
        let id_key = self.active_id_key(account_id).await?;
        let path = format!("v1/accounts/{id_key}/transactions/{transaction_id}.json");
        let response = self.get_json(&path, &[]).await?;
        extract(&path, &response, "/TransactionDetailsResponse")
    }

    /// All orders on the account, without paging parameters.
    pub async fn existing_orders(&self, account_id: Option<&str>) -> Result<Vec<Value>> {
        let id_key = self.active_id_key(account_id).await?;
        let path = format!("v1/accounts/{id_key}/orders.json");
        let response = self.get_json(&path, &[]).await?;
        Ok(array_at(&response, "/OrdersResponse/Order"))
    }
}

fn decimal_at(value: &Value, pointer: &str) -> Option<Decimal> {
    value
        .pointer(pointer)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
