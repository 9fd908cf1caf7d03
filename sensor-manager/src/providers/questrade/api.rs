use serde::Deserialize;

/// Brokerage account.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub number: String,
    /// Account type (e.g. "TFSA", "Margin"); labels the reading
    #[serde(rename = "type")]
    pub account_type: String,
    pub status: String,
}

/// Response of `GET accounts`.
#[derive(Debug, Deserialize)]
pub struct AccountsResponse {
    pub accounts: Vec<Account>,
}

/// Balances of an account expressed in one currency.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub currency: String,
    #[serde(default)]
    pub cash: Option<f64>,
    #[serde(default)]
    pub market_value: Option<f64>,
    #[serde(default)]
    pub total_equity: Option<f64>,
    #[serde(default)]
    pub buying_power: Option<f64>,
    #[serde(default)]
    pub maintenance_excess: Option<f64>,
}

/// Response of `GET accounts/{number}/balances`.
///
/// Only the combined (all-currency) balances are read; per-currency
/// balances are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub combined_balances: Vec<Balance>,
    /// Start-of-day balances
    #[serde(default)]
    pub sod_combined_balances: Vec<Balance>,
}
