//! Human-in-the-loop authorization requests.

use chrono::{DateTime, Utc};
use sensorpoll::AdapterError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{error, info};

/// A request for the user to visit `url` and grant access.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuthorizationRequest {
    pub adapter: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub requested_at: DateTime<Utc>,
}

/// Most recent authorization failure of one adapter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuthorizationFailure {
    pub adapter: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Receives authorization requests and their outcome.
///
/// Injected into every adapter at construction; the host decides how to
/// surface the request (notification, dashboard card, log line).
pub trait AuthorizationPrompt: Send + Sync {
    fn request_authorization(&self, request: &AuthorizationRequest);

    fn authorization_completed(&self, adapter: &str);

    fn authorization_failed(&self, adapter: &str, error: &AdapterError);
}

/// Default prompt: logs requests and keeps the pending ones for the HTTP API.
#[derive(Default)]
pub struct AuthorizationBoard {
    pending: Mutex<HashMap<String, AuthorizationRequest>>,
    failures: Mutex<HashMap<String, AuthorizationFailure>>,
}

impl AuthorizationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending requests, sorted by adapter name.
    pub fn pending(&self) -> Vec<AuthorizationRequest> {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let mut requests: Vec<_> = pending.values().cloned().collect();
        requests.sort_by(|a, b| a.adapter.cmp(&b.adapter));
        requests
    }

    /// Adapters whose credentials were rejected and not yet re-authorized,
    /// sorted by adapter name.
    pub fn failures(&self) -> Vec<AuthorizationFailure> {
        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<_> = failures.values().cloned().collect();
        list.sort_by(|a, b| a.adapter.cmp(&b.adapter));
        list
    }

    /// Error message of the most recent failure for `adapter`.
    pub fn last_failure(&self, adapter: &str) -> Option<String> {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(adapter)
            .map(|f| f.error.clone())
    }
}

impl AuthorizationPrompt for AuthorizationBoard {
    fn request_authorization(&self, request: &AuthorizationRequest) {
        info!(
            adapter = %request.adapter,
            url = %request.url,
            "Authorization required, visit the URL to grant access"
        );
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(request.adapter.clone(), request.clone());
    }

    fn authorization_completed(&self, adapter: &str) {
        info!(adapter = %adapter, "Authorization completed");
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(adapter);
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(adapter);
    }

    fn authorization_failed(&self, adapter: &str, error: &AdapterError) {
        error!(adapter = %adapter, error = %error, "Authorization failed");
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                adapter.to_string(),
                AuthorizationFailure {
                    adapter: adapter.to_string(),
                    error: error.to_string(),
                    failed_at: Utc::now(),
                },
            );
    }
}
