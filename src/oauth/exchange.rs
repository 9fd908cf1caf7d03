//! OAuth token exchange logic.
//!
//! Handles exchanging authorization codes and refresh tokens for access
//! tokens. Token responses may be a bare OAuth 2.0 object or wrapped in a
//! provider envelope (`{"status": 0, "body": {...}}`).

use super::{OAuthConfig, RefreshStyle, TokenEndpoint};
use crate::credentials::Credentials;
use crate::error::AdapterError;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

/// OAuth token response (standard OAuth 2.0 plus provider extras)
#[derive(Clone, Debug, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Account owner; numeric for some providers
    #[serde(default, alias = "user_id")]
    pub userid: Option<Value>,
    /// Resource server for this session (questrade)
    #[serde(default)]
    pub api_server: Option<String>,
}

impl TokenGrant {
    /// Builds the credential record for `client_id`.
    ///
    /// Fields the provider did not send (a non-rotated refresh token, the
    /// owner id, the resource server) carry over from `previous`.
    pub fn into_credentials(
        self,
        client_id: &str,
        previous: Option<&Credentials>,
        now: DateTime<Utc>,
    ) -> Credentials {
        let user_id = self.userid.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Credentials {
            client_id: client_id.to_string(),
            access_token: Some(self.access_token),
            refresh_token: self
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            user_id: user_id.or_else(|| previous.and_then(|p| p.user_id.clone())),
            token_type: self
                .token_type
                .or_else(|| previous.and_then(|p| p.token_type.clone())),
            api_server: self
                .api_server
                .or_else(|| previous.and_then(|p| p.api_server.clone())),
        }
    }
}

/// Exchange authorization code for access token
///
/// # Arguments
/// * `http` - HTTP capability
/// * `config` - Provider OAuth configuration (token URL, client, redirect URI)
/// * `code` - Authorization code from the redirect callback
///
/// # Returns
/// * `Ok(TokenGrant)` - Access token, refresh token, and expiration
/// * `Err(AdapterError::Authorization)` - Any failure; codes are single-use
///   so nothing is retried
pub async fn exchange_code(
    http: &dyn HttpClient,
    config: &OAuthConfig,
    code: &str,
) -> Result<TokenGrant, AdapterError> {
    let request = HttpRequest::post(&config.token_url)
        .form_field("grant_type", "authorization_code")
        .form_field("client_id", &config.client_id)
        .form_field("client_secret", &config.client_secret)
        .form_field("code", code)
        .form_field("redirect_uri", &config.redirect_uri);

    tracing::debug!("Exchanging authorization code for token at {}", config.token_url);

    let response = http
        .execute(request)
        .await
        .map_err(|e| AdapterError::Authorization(e.to_string()))?;

    let grant = parse_grant(&response).map_err(AdapterError::Authorization)?;

    tracing::debug!(
        "Token exchange successful, has_refresh_token={}, expires_in={:?}",
        grant.refresh_token.is_some(),
        grant.expires_in
    );

    Ok(grant)
}

/// Exchange a refresh token for a new access token
///
/// # Returns
/// * `Ok(TokenGrant)` - New access token (refresh token possibly rotated)
/// * `Err(AdapterError::TokenRefresh)` - Provider rejected the refresh token
/// * `Err(AdapterError::Http)` - Transport failure or provider-side 5xx;
///   the refresh token may still be valid
pub async fn refresh_token(
    http: &dyn HttpClient,
    endpoint: &TokenEndpoint,
    refresh_token: &str,
) -> Result<TokenGrant, AdapterError> {
    let mut params = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    if let Some(secret) = &endpoint.client_secret {
        params.push(("client_id", endpoint.client_id.as_str()));
        params.push(("client_secret", secret.as_str()));
    }

    let request = match endpoint.style {
        RefreshStyle::FormPost => params
            .iter()
            .fold(HttpRequest::post(&endpoint.token_url), |req, (k, v)| {
                req.form_field(k, v)
            }),
        RefreshStyle::QueryGet => params
            .iter()
            .fold(HttpRequest::get(&endpoint.token_url), |req, (k, v)| {
                req.query(k, v)
            }),
    };

    let response = http.execute(request).await?;

    if response.status >= 500 {
        return Err(AdapterError::Http(format!(
            "token endpoint returned status {}",
            response.status
        )));
    }

    parse_grant(&response).map_err(AdapterError::TokenRefresh)
}

/// Parses a token endpoint response, rejecting error payloads.
fn parse_grant(response: &HttpResponse) -> Result<TokenGrant, String> {
    if !response.is_success() {
        return Err(format!(
            "token endpoint returned status {}: {}",
            response.status, response.body
        ));
    }

    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| format!("failed to parse token response: {}", e))?;

    if let Some(error) = value.get("error") {
        let description = value
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        let error = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Err(format!("{} - {}", error, description));
    }

    if let Some(status) = value.get("status").and_then(Value::as_i64) {
        if status != 0 {
            return Err(format!("token endpoint reported status {}", status));
        }
    }

    let payload = match value.get("body") {
        Some(body) if body.is_object() => body.clone(),
        _ => value,
    };

    serde_json::from_value(payload).map_err(|e| format!("invalid token response: {}", e))
}
