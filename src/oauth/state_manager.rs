//! CSRF `state` tokens for the authorization-code redirect.
//!
//! Each authorization URL carries a single-use token bound to the adapter
//! that requested it. The redirect callback must present the token back
//! before any code exchange happens.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;
use uuid::Uuid;

/// Default lifetime of an issued token
pub const STATE_TTL_SECS: i64 = 600;

/// Adapter an issued token belongs to.
#[derive(Clone, Debug)]
pub struct StateEntry {
    /// Adapter that will receive the authorization code
    pub adapter: String,
    pub issued_at: DateTime<Utc>,
}

impl StateEntry {
    fn expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at > ttl
    }
}

/// Issued tokens, shared between the adapters and the callback route.
#[derive(Clone)]
pub struct StateManager {
    issued: Arc<Mutex<HashMap<String, StateEntry>>>,
    ttl: Duration,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(STATE_TTL_SECS)
    }
}

impl StateManager {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            issued: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    fn issued(&self) -> MutexGuard<'_, HashMap<String, StateEntry>> {
        self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issues a fresh UUID v4 token for `adapter`.
    pub fn issue(&self, adapter: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.issued().insert(
            token.clone(),
            StateEntry {
                adapter: adapter.to_string(),
                issued_at: Utc::now(),
            },
        );
        token
    }

    /// Removes `token` and returns its entry if it had not expired.
    ///
    /// An expired token is removed too; it can never be presented twice.
    pub fn consume(&self, token: &str) -> Option<StateEntry> {
        self.consume_at(token, Utc::now())
    }

    pub fn consume_at(&self, token: &str, now: DateTime<Utc>) -> Option<StateEntry> {
        let entry = self.issued().remove(token)?;
        (!entry.expired(now, self.ttl)).then_some(entry)
    }

    /// Invalidates every outstanding token of `adapter`.
    pub fn revoke(&self, adapter: &str) {
        self.issued().retain(|_, entry| entry.adapter != adapter);
    }

    pub fn purge_expired(&self) {
        self.purge_expired_at(Utc::now());
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.issued().retain(|_, entry| !entry.expired(now, ttl));
    }

    /// Number of outstanding tokens.
    pub fn pending(&self) -> usize {
        self.issued().len()
    }
}

/// Purges expired tokens every `every_secs` seconds, forever.
pub async fn run_state_purge(states: StateManager, every_secs: u64) {
    let mut ticker = tokio::time::interval(StdDuration::from_secs(every_secs));

    loop {
        ticker.tick().await;
        states.purge_expired();
        tracing::debug!(pending = states.pending(), "Purged expired authorization states");
    }
}
