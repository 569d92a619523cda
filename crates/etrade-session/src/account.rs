//! Active account context
//!
//! Holds the account list most recently fetched from the API and the account
//! that account-scoped calls act on. The client owns one context and replaces
//! the list wholesale on every refresh; selection is by index, account id, or
//! account id key against that list.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// One account summary as returned by `/v1/accounts/list`, optionally
/// overlaid with balance and portfolio data.
///
/// Every field is optional: `set_from` only copies what is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub account_id: Option<String>,
    pub account_id_key: Option<String>,
    pub account_desc: Option<String>,
    pub account_mode: Option<String>,
    pub account_name: Option<String>,
    pub account_status: Option<String>,
    pub account_type: Option<String>,
    pub institution_type: Option<String>,
    pub closed_date: Option<i64>,
    pub cash_available: Option<Decimal>,
    pub positions: Option<Vec<Position>>,
    pub total_account_value: Option<Decimal>,
}

/// A portfolio position. Only the fields order sizing needs are typed; the
/// rest of the provider payload is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub symbol_description: String,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Snapshot of the selected account.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActiveAccount {
    pub id: Option<String>,
    pub id_key: Option<String>,
    pub description: Option<String>,
    pub mode: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub account_type: Option<String>,
    pub institution_type: Option<String>,
    pub closed_date: Option<i64>,
    pub cash_available: Option<Decimal>,
    pub positions: Option<Vec<Position>>,
    pub total_account_value: Option<Decimal>,
}

impl ActiveAccount {
    /// Shares held of `symbol` across all positions.
    pub fn holdings_of(&self, symbol: &str) -> Decimal {
        self.positions
            .iter()
            .flatten()
            .filter(|p| p.symbol_description == symbol)
            .map(|p| p.quantity)
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActiveAccountContext {
    current: ActiveAccount,
    accounts: Vec<AccountRecord>,
}

impl ActiveAccountContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounts(&self) -> &[AccountRecord] {
        &self.accounts
    }

    pub fn current(&self) -> &ActiveAccount {
        &self.current
    }

    pub fn snapshot(&self) -> ActiveAccount {
        self.current.clone()
    }

    pub fn id_key(&self) -> Option<&str> {
        self.current.id_key.as_deref()
    }

    /// Replace the account list. The current selection is left as-is; callers
    /// re-select (usually by id key) to pick up refreshed values.
    pub fn update_account_list(&mut self, accounts: Vec<AccountRecord>) {
        debug!(accounts = accounts.len(), "account list updated");
        self.accounts = accounts;
    }

    /// Overlay the fields present in `record` onto the current account.
    pub fn set_from(&mut self, record: &AccountRecord) {
        let current = &mut self.current;
        overlay(&mut current.id, &record.account_id);
        overlay(&mut current.id_key, &record.account_id_key);
        overlay(&mut current.description, &record.account_desc);
        overlay(&mut current.mode, &record.account_mode);
        overlay(&mut current.name, &record.account_name);
        overlay(&mut current.status, &record.account_status);
        overlay(&mut current.account_type, &record.account_type);
        overlay(&mut current.institution_type, &record.institution_type);
        overlay(&mut current.closed_date, &record.closed_date);
        overlay(&mut current.cash_available, &record.cash_available);
        overlay(&mut current.positions, &record.positions);
        overlay(&mut current.total_account_value, &record.total_account_value);
    }

    /// Select by position in the account list. Negative indices are rejected.
    pub fn set_by_index(&mut self, index: isize) -> Result<()> {
        let len = self.accounts.len();
        let record = usize::try_from(index)
            .ok()
            .and_then(|i| self.accounts.get(i))
            .cloned()
            .ok_or(Error::IndexOutOfRange { index, len })?;
        self.set_from(&record);
        Ok(())
    }

    /// Select the first account whose `accountId` equals `id`.
    pub fn set_by_id(&mut self, id: &str) -> Result<()> {
        let record = self
            .accounts
            .iter()
            .find(|a| a.account_id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| Error::InvalidAccountReference(format!("account id {id}")))?;
        self.set_from(&record);
        Ok(())
    }

    /// Select the first account whose `accountIdKey` equals `id_key`.
    pub fn set_by_id_key(&mut self, id_key: &str) -> Result<()> {
        let record = self
            .accounts
            .iter()
            .find(|a| a.account_id_key.as_deref() == Some(id_key))
            .cloned()
            .ok_or_else(|| Error::InvalidAccountReference(format!("account id key {id_key}")))?;
        self.set_from(&record);
        Ok(())
    }
}

fn overlay<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if let Some(value) = source {
        *target = Some(value.clone());
    }
}
