use sensorpoll::config::WithingsConfig;
use sensorpoll::oauth::OAuthConfig;

pub const BASE_URL: &str = "https://wbsapi.withings.net";
pub const AUTH_URL: &str = "https://account.withings.com/oauth2_user/authorize2";
pub const TOKEN_URL: &str = "https://account.withings.com/oauth2/token";
pub const SCOPES: &[&str] = &["user.info", "user.metrics", "user.activity"];

/// Redirect path registered with Withings
pub const CALLBACK_PATH: &str = "/api/withings/callback";

/// Device listing (`action=getdevice`)
pub const DEVICE_PATH: &str = "/v2/user";
/// Body measures (`action=getmeas`, `category=1` = real measures)
pub const MEASURE_PATH: &str = "/measure";

pub const UNIT: &str = "kg";
pub const ICON: &str = "mdi:human";

/// Authorization-code configuration for a Withings application.
///
/// `callback_base_url` is the externally reachable host URL; the redirect
/// URI is `callback_base_url` + [`CALLBACK_PATH`].
pub fn oauth_config(config: &WithingsConfig, callback_base_url: &str) -> OAuthConfig {
    OAuthConfig {
        auth_url: AUTH_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
        scope_separator: ",".to_string(),
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        redirect_uri: format!(
            "{}{}",
            callback_base_url.trim_end_matches('/'),
            CALLBACK_PATH
        ),
    }
}
