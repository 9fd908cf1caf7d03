//! Token refresher - obtains and persists new credentials.
//!
//! Two exchanges end in persisted credentials:
//! - authorization code → token pair (once, after the user authorizes)
//! - refresh token → new access token (whenever credentials are stale)
//!
//! Neither is retried here; a rejected code or refresh token needs a human.

use chrono::Utc;
use sensorpoll::credentials::{CredentialStore, Credentials};
use sensorpoll::http::HttpClient;
use sensorpoll::oauth::{self, OAuthConfig, TokenEndpoint};
use sensorpoll::AdapterError;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TokenRefresher {
    http: Arc<dyn HttpClient>,
    store: Arc<CredentialStore>,
    endpoint: TokenEndpoint,
    /// Present for providers supporting the authorization-code flow
    oauth: Option<OAuthConfig>,
}

impl TokenRefresher {
    /// Refresher for tokens issued out of band (refresh-token exchange only).
    pub fn new(http: Arc<dyn HttpClient>, store: Arc<CredentialStore>, endpoint: TokenEndpoint) -> Self {
        Self {
            http,
            store,
            endpoint,
            oauth: None,
        }
    }

    /// Refresher for a provider using the full authorization-code flow.
    pub fn with_authorization(
        http: Arc<dyn HttpClient>,
        store: Arc<CredentialStore>,
        oauth: OAuthConfig,
    ) -> Self {
        Self {
            http,
            store,
            endpoint: oauth.token_endpoint(),
            oauth: Some(oauth),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.endpoint.client_id
    }

    pub fn oauth(&self) -> Option<&OAuthConfig> {
        self.oauth.as_ref()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Exchanges an authorization code and persists the result.
    pub async fn exchange_code(&self, code: &str) -> Result<Credentials, AdapterError> {
        let oauth = self.oauth.as_ref().ok_or_else(|| {
            AdapterError::Authorization(format!(
                "client {} has no authorization-code flow",
                self.client_id()
            ))
        })?;

        let grant = oauth::exchange_code(self.http.as_ref(), oauth, code).await?;
        let credentials = grant.into_credentials(self.client_id(), None, Utc::now());

        info!(client_id = %self.client_id(), "Authorization code exchanged");
        self.persist(&credentials);
        Ok(credentials)
    }

    /// Exchanges the refresh token in `current` and persists the result.
    ///
    /// On failure `current` stays untouched (in memory and on disk).
    pub async fn refresh(&self, current: &Credentials) -> Result<Credentials, AdapterError> {
        let refresh_token = current.refresh_token.as_deref().ok_or_else(|| {
            AdapterError::TokenRefresh("no refresh token available".to_string())
        })?;

        info!(client_id = %self.client_id(), "Refreshing OAuth token");

        let grant = oauth::refresh_token(self.http.as_ref(), &self.endpoint, refresh_token).await?;
        let credentials = grant.into_credentials(self.client_id(), Some(current), Utc::now());

        self.persist(&credentials);

        info!(client_id = %self.client_id(), "OAuth token refreshed successfully");
        Ok(credentials)
    }

    /// Saves credentials; a failure is logged and the caller keeps going
    /// with the in-memory copy.
    fn persist(&self, credentials: &Credentials) {
        if let Err(e) = self.store.save(credentials) {
            warn!(
                client_id = %self.client_id(),
                path = %self.store.path().display(),
                error = %e,
                "Failed to persist credentials, continuing with in-memory copy"
            );
        }
    }
}
