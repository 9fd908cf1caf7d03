//! In-memory credentials for one client identifier.
//!
//! Every adapter using the same client id shares one session, so a stale
//! token is refreshed once no matter how many adapters notice it. All
//! refreshes and code exchanges run under the session lock.

use crate::refresher::TokenRefresher;
use sensorpoll::credentials::Credentials;
use sensorpoll::AdapterError;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct CredentialSession {
    refresher: TokenRefresher,
    /// Refresh token from configuration, used while nothing is stored
    seed: Option<String>,
    /// Set once the seed has been sent to the token endpoint
    seed_tried: AtomicBool,
    current: Mutex<Option<Credentials>>,
}

impl CredentialSession {
    pub fn new(refresher: TokenRefresher) -> Self {
        Self {
            refresher,
            seed: None,
            seed_tried: AtomicBool::new(false),
            current: Mutex::new(None),
        }
    }

    /// Falls back to `refresh_token` when the store holds nothing usable.
    pub fn with_seed(mut self, refresh_token: impl Into<String>) -> Self {
        self.seed = Some(refresh_token.into());
        self
    }

    pub fn client_id(&self) -> &str {
        self.refresher.client_id()
    }

    /// True if the provider supports the authorization-code flow.
    pub fn can_authorize(&self) -> bool {
        self.refresher.oauth().is_some()
    }

    /// Authorization URL carrying `state`, for code-flow providers.
    pub fn authorization_url(&self, state: &str) -> Option<String> {
        self.refresher.oauth().map(|oauth| oauth.build_auth_url(state))
    }

    /// Loads stored credentials unless the session already holds some.
    ///
    /// An unreadable credential file is logged and treated like a missing
    /// one, so the seed (or a new authorization) takes over.
    ///
    /// # Returns
    /// `true` if credentials are available (stored, seeded, or already
    /// loaded), `false` if authorization is required
    pub async fn load(&self) -> bool {
        let mut current = self.current.lock().await;
        if current.is_some() {
            return true;
        }

        let stored = match self.refresher.store().load(self.client_id()) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    client_id = %self.client_id(),
                    path = %self.refresher.store().path().display(),
                    error = %e,
                    "Credential file unreadable, treating as absent"
                );
                None
            }
        };

        if let Some(stored) = stored {
            debug!(client_id = %self.client_id(), "Loaded stored credentials");
            *current = Some(stored);
        } else if let Some(seed) = &self.seed {
            debug!(client_id = %self.client_id(), "Seeding credentials from configuration");
            self.seed_tried.store(true, Ordering::SeqCst);
            *current = Some(Credentials::seeded(self.client_id(), seed.as_str()));
        }

        current.is_some()
    }

    pub async fn current(&self) -> Option<Credentials> {
        self.current.lock().await.clone()
    }

    pub async fn has_credentials(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Returns usable credentials, refreshing first if they are stale.
    ///
    /// The flag is true when this call performed the refresh.
    pub async fn ensure_fresh(&self) -> Result<(Credentials, bool), AdapterError> {
        let mut current = self.current.lock().await;
        let creds = current.as_ref().ok_or_else(|| {
            AdapterError::Authorization(format!(
                "no credentials for client {}, authorization required",
                self.client_id()
            ))
        })?;

        if !creds.is_stale() {
            return Ok((creds.clone(), false));
        }

        let refreshed = self.refresh_or_reseed(creds).await?;
        *current = Some(refreshed.clone());
        Ok((refreshed, true))
    }

    /// Refreshes after the provider rejected `rejected`.
    ///
    /// If another adapter already replaced that access token, the newer
    /// credentials are returned without another exchange.
    pub async fn refresh_rejected(&self, rejected: &Credentials) -> Result<Credentials, AdapterError> {
        let mut current = self.current.lock().await;
        let creds = current.as_ref().ok_or_else(|| {
            AdapterError::Authorization(format!(
                "no credentials for client {}, authorization required",
                self.client_id()
            ))
        })?;

        if creds.access_token != rejected.access_token {
            debug!(client_id = %self.client_id(), "Token already replaced by another adapter");
            return Ok(creds.clone());
        }

        let refreshed = self.refresh_or_reseed(creds).await?;
        *current = Some(refreshed.clone());
        Ok(refreshed)
    }

    /// Refreshes `creds`; if the provider rejects that refresh token and the
    /// configured seed is a different token not tried yet, the seed gets one
    /// attempt. Called with the session lock held.
    async fn refresh_or_reseed(&self, creds: &Credentials) -> Result<Credentials, AdapterError> {
        let rejection = match self.refresher.refresh(creds).await {
            Err(e @ AdapterError::TokenRefresh(_)) => e,
            other => return other,
        };

        let seed = match &self.seed {
            Some(seed) if creds.refresh_token.as_deref() != Some(seed.as_str()) => seed,
            _ => return Err(rejection),
        };
        if self.seed_tried.swap(true, Ordering::SeqCst) {
            return Err(rejection);
        }

        warn!(
            client_id = %self.client_id(),
            error = %rejection,
            "Stored refresh token rejected, trying the configured one"
        );
        let seeded = Credentials {
            refresh_token: Some(seed.clone()),
            ..creds.clone()
        };
        self.refresher.refresh(&seeded).await
    }

    /// Completes the authorization-code flow and installs the credentials.
    pub async fn authorize(&self, code: &str) -> Result<Credentials, AdapterError> {
        let mut current = self.current.lock().await;
        let creds = self.refresher.exchange_code(code).await?;
        *current = Some(creds.clone());
        info!(client_id = %self.client_id(), "Credentials installed");
        Ok(creds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sensorpoll::credentials::CredentialStore;
    use sensorpoll::http::mock::ScriptedHttpClient;
    use sensorpoll::http::Method;
    use sensorpoll::oauth::{RefreshStyle, TokenEndpoint};
    use std::sync::Arc;
    use tempfile::TempDir;

    const TOKEN_URL: &str = "https://login.example.com/oauth2/token";

    fn make_session(http: &Arc<ScriptedHttpClient>, dir: &TempDir) -> CredentialSession {
        let store = Arc::new(CredentialStore::open(dir.path(), "questrade"));
        let endpoint = TokenEndpoint {
            token_url: TOKEN_URL.to_string(),
            style: RefreshStyle::QueryGet,
            client_id: "cid".to_string(),
            client_secret: None,
        };
        CredentialSession::new(TokenRefresher::new(Arc::clone(http) as _, store, endpoint))
    }

    fn fresh(token: &str) -> Credentials {
        Credentials {
            access_token: Some(token.to_string()),
            refresh_token: Some("r".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            ..Credentials::for_client("cid")
        }
    }

    #[tokio::test]
    async fn test_load_nothing_stored() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        let session = make_session(&http, &dir);

        assert!(!session.load().await);
        assert!(!session.can_authorize());
        assert!(session.authorization_url("state").is_none());
    }

    #[tokio::test]
    async fn test_load_uses_seed() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        let session = make_session(&http, &dir).with_seed("seed-token");

        assert!(session.load().await);
        let creds = session.current().await.unwrap();
        assert_eq!(creds.refresh_token.as_deref(), Some("seed-token"));
        assert!(creds.is_stale());
    }

    #[tokio::test]
    async fn test_stored_credentials_win_over_seed() {
        let dir = TempDir::new().unwrap();
        CredentialStore::open(dir.path(), "questrade")
            .save(&fresh("stored"))
            .unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        let session = make_session(&http, &dir).with_seed("seed-token");

        session.load().await;
        assert_eq!(
            session.current().await.unwrap().access_token.as_deref(),
            Some("stored")
        );
    }

    #[tokio::test]
    async fn test_rejected_stored_token_falls_back_to_new_seed() {
        let dir = TempDir::new().unwrap();
        CredentialStore::open(dir.path(), "questrade")
            .save(&Credentials::seeded("cid", "dead"))
            .unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond(Method::Get, TOKEN_URL, 400, r#"{"error":"invalid_grant"}"#)
            .respond(
                Method::Get,
                TOKEN_URL,
                200,
                r#"{"access_token":"a1","refresh_token":"rotated","expires_in":1800}"#,
            );
        let session = make_session(&http, &dir).with_seed("brand-new");
        assert!(session.load().await);

        let (creds, refreshed) = session.ensure_fresh().await.unwrap();
        assert!(refreshed);
        assert_eq!(creds.access_token.as_deref(), Some("a1"));

        let sent: Vec<_> = http
            .requests_to(TOKEN_URL)
            .iter()
            .map(|r| r.query_value("refresh_token").unwrap().to_string())
            .collect();
        assert_eq!(sent, vec!["dead", "brand-new"]);

        let stored = CredentialStore::open(dir.path(), "questrade")
            .load("cid")
            .unwrap()
            .unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn test_seed_fallback_tried_once() {
        let dir = TempDir::new().unwrap();
        CredentialStore::open(dir.path(), "questrade")
            .save(&Credentials::seeded("cid", "dead"))
            .unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond(Method::Get, TOKEN_URL, 400, r#"{"error":"invalid_grant"}"#);
        let session = make_session(&http, &dir).with_seed("also-dead");
        session.load().await;

        let err = session.ensure_fresh().await.unwrap_err();
        assert!(matches!(err, AdapterError::TokenRefresh(_)));
        assert_eq!(http.count(TOKEN_URL), 2);

        session.ensure_fresh().await.unwrap_err();
        assert_eq!(http.count(TOKEN_URL), 3);
    }

    #[tokio::test]
    async fn test_same_seed_not_retried() {
        let dir = TempDir::new().unwrap();
        CredentialStore::open(dir.path(), "questrade")
            .save(&Credentials::seeded("cid", "seed-token"))
            .unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond(Method::Get, TOKEN_URL, 400, r#"{"error":"invalid_grant"}"#);
        let session = make_session(&http, &dir).with_seed("seed-token");
        session.load().await;

        session.ensure_fresh().await.unwrap_err();
        assert_eq!(http.count(TOKEN_URL), 1);
    }

    #[tokio::test]
    async fn test_ensure_fresh_skips_refresh() {
        let dir = TempDir::new().unwrap();
        CredentialStore::open(dir.path(), "questrade")
            .save(&fresh("valid"))
            .unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        let session = make_session(&http, &dir);
        session.load().await;

        let (creds, refreshed) = session.ensure_fresh().await.unwrap();
        assert!(!refreshed);
        assert_eq!(creds.access_token.as_deref(), Some("valid"));
        assert_eq!(http.count(TOKEN_URL), 0);
    }

    #[tokio::test]
    async fn test_ensure_fresh_refreshes_once() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond(
            Method::Get,
            TOKEN_URL,
            200,
            r#"{"access_token":"a1","refresh_token":"r1","expires_in":1800}"#,
        );
        let session = make_session(&http, &dir).with_seed("r0");
        session.load().await;

        let (first, refreshed) = session.ensure_fresh().await.unwrap();
        assert!(refreshed);
        assert_eq!(first.access_token.as_deref(), Some("a1"));

        let (_, refreshed_again) = session.ensure_fresh().await.unwrap();
        assert!(!refreshed_again);
        assert_eq!(http.count(TOKEN_URL), 1);
    }

    #[tokio::test]
    async fn test_ensure_fresh_without_credentials() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        let session = make_session(&http, &dir);

        let err = session.ensure_fresh().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_refresh_rejected_skips_when_already_replaced() {
        let dir = TempDir::new().unwrap();
        CredentialStore::open(dir.path(), "questrade")
            .save(&fresh("newer"))
            .unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        let session = make_session(&http, &dir);
        session.load().await;

        let creds = session.refresh_rejected(&fresh("older")).await.unwrap();
        assert_eq!(creds.access_token.as_deref(), Some("newer"));
        assert_eq!(http.count(TOKEN_URL), 0);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_happens_once() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(ScriptedHttpClient::new());
        http.respond(
            Method::Get,
            TOKEN_URL,
            200,
            r#"{"access_token":"a1","refresh_token":"r1","expires_in":1800}"#,
        );
        let session = Arc::new(make_session(&http, &dir).with_seed("r0"));
        session.load().await;

        let a = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.ensure_fresh().await.map(|(c, _)| c) }
        });
        let b = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.ensure_fresh().await.map(|(c, _)| c) }
        });

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(http.count(TOKEN_URL), 1);
    }
}
