use super::api::{Account, AccountsResponse, Balance, BalancesResponse};
use super::config::{ICON_TRENDING_DOWN, ICON_TRENDING_UP};
use crate::providers::decode;
use sensorpoll::snapshot::Reading;
use sensorpoll::AdapterError;
use serde_json::Value;

const ACTIVE: &str = "Active";

/// Accounts that can be polled (status "Active").
pub fn map_accounts(json: &Value) -> Result<Vec<Account>, AdapterError> {
    let response: AccountsResponse = decode(json, "accounts")?;
    Ok(response
        .accounts
        .into_iter()
        .filter(|account| account.status == ACTIVE)
        .collect())
}

fn find_currency<'a>(balances: &'a [Balance], currency: &str) -> Option<&'a Balance> {
    balances.iter().find(|b| b.currency == currency)
}

/// Maps the combined balance in `currency` to a reading of total equity.
///
/// The icon trends down when equity is below its start-of-day value.
pub fn map_balances(json: &Value, currency: &str) -> Result<Reading, AdapterError> {
    let response: BalancesResponse = decode(json, "balances")?;

    let balance = find_currency(&response.combined_balances, currency)
        .ok_or_else(|| AdapterError::NoMatchingRecord(format!("currency {}", currency)))?;
    let total_equity = balance.total_equity.ok_or_else(|| {
        AdapterError::MalformedResponse(format!("{} balance has no totalEquity", currency))
    })?;

    let mut reading = Reading::new(total_equity)
        .optional("cash", balance.cash)
        .optional("market_value", balance.market_value)
        .optional("total_equity", balance.total_equity)
        .optional("buying_power", balance.buying_power)
        .optional("maintenance_excess", balance.maintenance_excess);

    let sod = find_currency(&response.sod_combined_balances, currency);
    if let Some(sod) = sod {
        reading = reading
            .optional("sod_cash", sod.cash)
            .optional("sod_market_value", sod.market_value)
            .optional("sod_total_equity", sod.total_equity)
            .optional("sod_buying_power", sod.buying_power)
            .optional("sod_maintenance_excess", sod.maintenance_excess);
    }

    let trending_down = sod
        .and_then(|s| s.total_equity)
        .map(|sod_equity| total_equity < sod_equity)
        .unwrap_or(false);

    Ok(reading.icon(if trending_down {
        ICON_TRENDING_DOWN
    } else {
        ICON_TRENDING_UP
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn balances() -> Value {
        json!({
            "perCurrencyBalances": [],
            "combinedBalances": [
                {"currency": "CAD", "cash": 1000.0, "marketValue": 9234.5, "totalEquity": 10234.5,
                 "buyingPower": 1000.0, "maintenanceExcess": 1000.0, "isRealTime": false},
                {"currency": "USD", "cash": 750.0, "marketValue": 6900.0, "totalEquity": 7650.0,
                 "buyingPower": 750.0, "maintenanceExcess": 750.0, "isRealTime": false}
            ],
            "sodPerCurrencyBalances": [],
            "sodCombinedBalances": [
                {"currency": "CAD", "cash": 1000.0, "marketValue": 9000.0, "totalEquity": 10000.0,
                 "buyingPower": 1000.0, "maintenanceExcess": 1000.0, "isRealTime": false}
            ]
        })
    }

    #[test]
    fn test_total_equity_for_currency() {
        let reading = map_balances(&balances(), "CAD").unwrap();
        assert_eq!(reading.value, 10234.50);
        assert_eq!(reading.attributes.len(), 10);
        assert_eq!(reading.attributes["market_value"], 9234.5);
        assert_eq!(reading.attributes["sod_total_equity"], 10000.0);
        assert_eq!(reading.icon.as_deref(), Some(ICON_TRENDING_UP));
    }

    #[test]
    fn test_trending_down_below_start_of_day() {
        let mut json = balances();
        json["combinedBalances"][0]["totalEquity"] = json!(9500.0);
        let reading = map_balances(&json, "CAD").unwrap();
        assert_eq!(reading.icon.as_deref(), Some(ICON_TRENDING_DOWN));
    }

    #[test]
    fn test_missing_sod_record_omits_sod_attributes() {
        let reading = map_balances(&balances(), "USD").unwrap();
        assert_eq!(reading.value, 7650.0);
        assert_eq!(reading.attributes.len(), 5);
        assert!(!reading.attributes.contains_key("sod_cash"));
        assert_eq!(reading.icon.as_deref(), Some(ICON_TRENDING_UP));
    }

    #[test]
    fn test_absent_optional_fields_omitted() {
        let json = json!({"combinedBalances": [{"currency": "CAD", "totalEquity": 5.0}]});
        let reading = map_balances(&json, "CAD").unwrap();
        assert_eq!(reading.attributes.len(), 1);
        assert_eq!(reading.attributes["total_equity"], 5.0);
    }

    #[test]
    fn test_no_matching_currency() {
        let json = json!({"combinedBalances": [{"currency": "USD", "totalEquity": 1.0}]});
        let err = map_balances(&json, "CAD").unwrap_err();
        assert!(matches!(err, AdapterError::NoMatchingRecord(_)));
    }

    #[test]
    fn test_missing_combined_balances() {
        let err = map_balances(&json!({"perCurrencyBalances": []}), "CAD").unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_total_equity() {
        let json = json!({"combinedBalances": [{"currency": "CAD", "cash": 1.0}]});
        let err = map_balances(&json, "CAD").unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse(_)));
    }

    #[test]
    fn test_only_active_accounts() {
        let json = json!({"accounts": [
            {"type": "TFSA", "number": "26598145", "status": "Active", "isPrimary": true},
            {"type": "Margin", "number": "26598146", "status": "Closed", "isPrimary": false}
        ]});

        let accounts = map_accounts(&json).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].number, "26598145");
        assert_eq!(accounts[0].account_type, "TFSA");
    }
}
