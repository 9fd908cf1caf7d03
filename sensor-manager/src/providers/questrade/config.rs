use sensorpoll::config::QuestradeConfig;
use sensorpoll::oauth::{RefreshStyle, TokenEndpoint};

/// Refresh endpoint; tokens are issued out of band (app hub) so there is no
/// authorization-code flow.
pub const TOKEN_URL: &str = "https://login.questrade.com/oauth2/token";

/// Appended to the per-session `api_server` handed out with each token
pub const API_VERSION_PREFIX: &str = "v1/";

pub const ACCOUNTS_PATH: &str = "accounts";

pub fn balances_path(account_number: &str) -> String {
    format!("accounts/{}/balances", account_number)
}

pub const ICON_TRENDING_UP: &str = "mdi:trending-up";
pub const ICON_TRENDING_DOWN: &str = "mdi:trending-down";

/// Refresh requests are a GET with the grant in the query string.
pub fn token_endpoint(config: &QuestradeConfig) -> TokenEndpoint {
    TokenEndpoint {
        token_url: TOKEN_URL.to_string(),
        style: RefreshStyle::QueryGet,
        client_id: config.client_id.clone(),
        client_secret: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(TOKEN_URL, "https://login.questrade.com/oauth2/token");
        assert_eq!(balances_path("26598145"), "accounts/26598145/balances");
    }

    #[test]
    fn test_token_endpoint() {
        let config = QuestradeConfig {
            client_id: "qid".to_string(),
            refresh_token: "r".to_string(),
            currency: "CAD".to_string(),
            poll_interval_secs: 30,
        };
        let endpoint = token_endpoint(&config);
        assert_eq!(endpoint.style, RefreshStyle::QueryGet);
        assert_eq!(endpoint.client_id, "qid");
        assert!(endpoint.client_secret.is_none());
    }
}
