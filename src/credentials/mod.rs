//! OAuth credentials and their JSON file store.
//!
//! Each provider keeps one small JSON file inside the configuration
//! directory. A cached record is only reused when it was issued to the
//! client identifier currently configured; anything else is treated as if
//! no credentials were stored and forces re-authorization.
//!
//! # Usage
//!
//! ```no_run
//! use sensorpoll::credentials::{CredentialStore, Credentials};
//! use chrono::{Duration, Utc};
//!
//! # fn main() -> Result<(), sensorpoll::AdapterError> {
//! let store = CredentialStore::open("/var/lib/sensorpoll", "withings");
//!
//! let creds = Credentials {
//!     access_token: Some("access".to_string()),
//!     refresh_token: Some("refresh".to_string()),
//!     expires_at: Some(Utc::now() + Duration::hours(3)),
//!     ..Credentials::for_client("my-client-id")
//! };
//! store.save(&creds)?;
//!
//! if let Some(creds) = store.load("my-client-id")? {
//!     assert!(!creds.is_stale());
//! }
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod storage;

pub use storage::CredentialStore;

/// Authentication material for one provider account.
///
/// Stored as a flat JSON object; every field except `client_id` is optional
/// so a record can be seeded from configuration (a bare refresh token) and
/// completed by the first refresh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Client identifier the tokens were issued to
    pub client_id: String,

    /// OAuth access token (used for API requests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// OAuth refresh token (used to obtain new access tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// When the access token expires (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Provider-side account owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Resource server handed out alongside the token, for providers whose
    /// API host varies per session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server: Option<String>,
}

impl Credentials {
    /// Empty record bound to a client identifier.
    pub fn for_client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Record holding only a refresh token, to be completed by a refresh.
    pub fn seeded(client_id: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: Some(refresh_token.into()),
            ..Self::for_client(client_id)
        }
    }

    /// Returns true if a new access token must be obtained before use.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    /// Staleness relative to `now`: no access token, or `expires_at <= now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}
