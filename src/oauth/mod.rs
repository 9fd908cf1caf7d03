//! OAuth 2.0 helpers for provider adapters.
//!
//! Implements both halves of the token lifecycle:
//! 1. Adapter has no usable credentials → build authorization URL
//! 2. User authorizes on the provider's site
//! 3. Provider redirects with `code` + `state` to the host callback
//! 4. Host validates `state`, adapter exchanges `code` for tokens
//! 5. On expiry, adapter exchanges the refresh token for a new access token

mod exchange;
mod state_manager;

pub use exchange::{exchange_code, refresh_token, TokenGrant};
pub use state_manager::{run_state_purge, StateEntry, StateManager, STATE_TTL_SECS};

use serde::{Deserialize, Serialize};

/// How a provider's token endpoint expects refresh requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshStyle {
    /// `POST` with an urlencoded form body
    FormPost,
    /// `GET` with the grant carried in the query string
    QueryGet,
}

/// Token endpoint used for refresh-token exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenEndpoint {
    pub token_url: String,
    pub style: RefreshStyle,
    pub client_id: String,
    /// Sent along with refresh requests when the provider requires it
    pub client_secret: Option<String>,
}

/// Authorization-code flow configuration for a provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token exchange endpoint URL
    pub token_url: String,

    /// Required OAuth scopes
    pub scopes: Vec<String>,

    /// Joins scopes in the authorization URL (`" "` per RFC 6749, some
    /// providers want `","`)
    pub scope_separator: String,

    pub client_id: String,

    pub client_secret: String,

    /// Callback URL registered with the provider
    pub redirect_uri: String,
}

impl OAuthConfig {
    /// Build authorization URL carrying the CSRF `state`.
    pub fn build_auth_url(&self, state: &str) -> String {
        let scopes = self.scopes.join(&self.scope_separator);
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }

    /// Refresh endpoint for tokens obtained through this configuration.
    pub fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint {
            token_url: self.token_url.clone(),
            style: RefreshStyle::FormPost,
            client_id: self.client_id.clone(),
            client_secret: Some(self.client_secret.clone()),
        }
    }
}
