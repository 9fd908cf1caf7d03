//! Per-adapter state machine and polling loop.
//!
//! Each adapter owns one provider, one fetcher and the latest snapshot.
//! Ticks are serialised: at most one fetch+map cycle runs per adapter.

use crate::fetcher::ApiFetcher;
use crate::prompt::{AuthorizationPrompt, AuthorizationRequest};
use crate::provider::Provider;
use crate::types::Presentation;
use chrono::{DateTime, Utc};
use sensorpoll::oauth::StateManager;
use sensorpoll::snapshot::{SensorView, Snapshot};
use sensorpoll::AdapterError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Shortest accepted polling interval
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of a polling adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Uninitialized,
    /// Waiting for the user to grant access
    Authorizing,
    Ready,
    /// Fetch+map cycle in flight
    Polling,
    /// Credentials rejected; polling stops until re-authorization
    Failed,
}

impl AdapterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterState::Uninitialized => "uninitialized",
            AdapterState::Authorizing => "authorizing",
            AdapterState::Ready => "ready",
            AdapterState::Polling => "polling",
            AdapterState::Failed => "failed",
        }
    }
}

/// Result of a single tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Snapshot replaced with a new reading
    Updated,
    /// Recoverable failure; previous snapshot kept
    Retained(AdapterError),
    /// Credentials rejected; adapter moved to `Failed`
    Halted(AdapterError),
    /// Adapter was not `Ready`
    Skipped(AdapterState),
}

/// Status information for an adapter.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AdapterStatus {
    /// Last successful poll timestamp
    pub last_poll: Option<DateTime<Utc>>,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// Total number of successful polls
    pub poll_count: u64,
    /// Total number of errors
    pub error_count: u64,
}

pub struct PollingAdapter {
    provider: Arc<dyn Provider>,
    fetcher: ApiFetcher,
    prompt: Arc<dyn AuthorizationPrompt>,
    /// CSRF states for the authorization-code flow
    states: StateManager,
    presentation: Presentation,
    state: Mutex<AdapterState>,
    /// Held for the full duration of initialize/tick/authorization
    cycle: Mutex<()>,
    snapshot: RwLock<Snapshot>,
    status: Arc<Mutex<AdapterStatus>>,
}

impl std::fmt::Debug for PollingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingAdapter").finish_non_exhaustive()
    }
}

impl PollingAdapter {
    pub fn new(
        provider: Arc<dyn Provider>,
        fetcher: ApiFetcher,
        prompt: Arc<dyn AuthorizationPrompt>,
        states: StateManager,
    ) -> Self {
        let presentation = provider.presentation();
        Self {
            provider,
            fetcher,
            prompt,
            states,
            presentation,
            state: Mutex::new(AdapterState::Uninitialized),
            cycle: Mutex::new(()),
            snapshot: RwLock::new(Snapshot::empty()),
            status: Arc::new(Mutex::new(AdapterStatus::default())),
        }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn kind(&self) -> &str {
        self.provider.kind()
    }

    pub fn poll_interval(&self) -> Duration {
        self.provider.poll_interval().max(MIN_POLL_INTERVAL)
    }

    pub async fn state(&self) -> AdapterState {
        *self.state.lock().await
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Returns a clone of the status tracker for external monitoring.
    pub fn status(&self) -> Arc<Mutex<AdapterStatus>> {
        Arc::clone(&self.status)
    }

    /// Snapshot with unit and icon resolved, for the host.
    pub async fn view(&self) -> SensorView {
        let snapshot = self.snapshot().await;
        let state = self.state().await;
        SensorView {
            name: self.name().to_string(),
            label: snapshot.label,
            source_id: snapshot.source_id,
            state: snapshot.value,
            unit: self.presentation.unit.clone(),
            icon: snapshot
                .icon
                .unwrap_or_else(|| self.presentation.icon.clone()),
            attributes: snapshot.attributes,
            fetched_at: snapshot.fetched_at,
            adapter_state: state.as_str().to_string(),
        }
    }

    async fn set_state(&self, next: AdapterState) {
        let mut state = self.state.lock().await;
        if *state != next {
            debug!(adapter = %self.name(), from = state.as_str(), to = next.as_str(), "State change");
            *state = next;
        }
    }

    /// Loads credentials and decides whether the adapter can poll.
    ///
    /// Adapters without credentials that support the authorization-code
    /// flow move to `Authorizing`; the rest fail.
    pub async fn initialize(&self) -> Result<AdapterState, AdapterError> {
        let _cycle = self.cycle.lock().await;

        let session = match self.fetcher.session() {
            Some(session) => Arc::clone(session),
            None => {
                self.set_state(AdapterState::Ready).await;
                return Ok(AdapterState::Ready);
            }
        };

        if session.load().await {
            info!(adapter = %self.name(), "Credentials available");
            self.set_state(AdapterState::Ready).await;
            return Ok(AdapterState::Ready);
        }

        if session.can_authorize() {
            self.request_authorization().await?;
            return Ok(AdapterState::Authorizing);
        }

        self.set_state(AdapterState::Failed).await;
        Err(AdapterError::Authorization(format!(
            "{} has no credentials and no authorization flow",
            self.name()
        )))
    }

    /// Asks the user to authorize this adapter.
    ///
    /// Valid from any state except `Polling`; this is also the way back
    /// from `Failed`.
    pub async fn begin_authorization(&self) -> Result<(), AdapterError> {
        let _cycle = self.cycle.lock().await;
        self.request_authorization().await
    }

    async fn request_authorization(&self) -> Result<(), AdapterError> {
        let session = self.fetcher.session().ok_or_else(|| {
            AdapterError::Authorization(format!("{} uses no credentials", self.name()))
        })?;

        // Only the newest authorization URL stays valid
        self.states.revoke(self.name());
        let state = self.states.issue(self.name());

        let url = session.authorization_url(&state).ok_or_else(|| {
            AdapterError::Authorization(format!(
                "{} has no authorization-code flow",
                self.name()
            ))
        })?;

        self.set_state(AdapterState::Authorizing).await;
        self.prompt.request_authorization(&AuthorizationRequest {
            adapter: self.name().to_string(),
            title: format!("Authorize {}", self.kind()),
            description: format!(
                "Open the link and grant access so {} can read your data.",
                self.name()
            ),
            url,
            requested_at: Utc::now(),
        });
        Ok(())
    }

    /// Exchanges the authorization code delivered by the callback.
    pub async fn complete_authorization(&self, code: &str) -> Result<(), AdapterError> {
        let _cycle = self.cycle.lock().await;

        let current = self.state().await;
        if current != AdapterState::Authorizing {
            return Err(AdapterError::Authorization(format!(
                "{} is not awaiting authorization (state: {})",
                self.name(),
                current.as_str()
            )));
        }

        let session = self.fetcher.session().ok_or_else(|| {
            AdapterError::Authorization(format!("{} uses no credentials", self.name()))
        })?;

        match session.authorize(code).await {
            Ok(_) => {
                self.set_state(AdapterState::Ready).await;
                self.prompt.authorization_completed(self.name());
                Ok(())
            }
            Err(e) => {
                self.set_state(AdapterState::Failed).await;
                self.prompt.authorization_failed(self.name(), &e);
                Err(e)
            }
        }
    }

    /// Runs one fetch+map cycle if the adapter is `Ready`.
    pub async fn tick(&self) -> TickOutcome {
        let _cycle = self.cycle.lock().await;

        {
            let mut state = self.state.lock().await;
            if *state != AdapterState::Ready {
                return TickOutcome::Skipped(*state);
            }
            *state = AdapterState::Polling;
        }

        debug!(adapter = %self.name(), "Polling provider");

        match self.provider.poll(&self.fetcher).await {
            Ok(reading) => {
                *self.snapshot.write().await = Snapshot::from_reading(reading, Utc::now());

                let mut status = self.status.lock().await;
                status.last_poll = Some(Utc::now());
                status.last_error = None;
                status.poll_count += 1;
                drop(status);

                self.set_state(AdapterState::Ready).await;
                TickOutcome::Updated
            }
            // Code-flow adapters ask for a new authorization right away and
            // end up in `Authorizing`; the rest stay `Failed`.
            Err(e) if e.is_fatal() => {
                error!(
                    adapter = %self.name(),
                    error = %e,
                    "Credentials rejected, polling suspended until re-authorization"
                );
                self.record_error(&e).await;
                self.set_state(AdapterState::Failed).await;
                self.prompt.authorization_failed(self.name(), &e);

                if self.can_authorize() {
                    if let Err(prompt_err) = self.request_authorization().await {
                        warn!(adapter = %self.name(), error = %prompt_err, "Could not request re-authorization");
                    }
                }
                TickOutcome::Halted(e)
            }
            Err(e) => {
                warn!(adapter = %self.name(), error = %e, "Poll failed, keeping previous snapshot");
                self.record_error(&e).await;
                self.set_state(AdapterState::Ready).await;
                TickOutcome::Retained(e)
            }
        }
    }

    fn can_authorize(&self) -> bool {
        self.fetcher
            .session()
            .map(|session| session.can_authorize())
            .unwrap_or(false)
    }

    async fn record_error(&self, e: &AdapterError) {
        let mut status = self.status.lock().await;
        status.last_error = Some(e.to_string());
        status.error_count += 1;
    }

    /// Starts the polling loop (non-blocking).
    ///
    /// Ticks on a fixed interval; ticks while the adapter is not `Ready` are
    /// skipped, so polling resumes on its own after re-authorization.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let period = self.poll_interval();

        tokio::spawn(async move {
            info!(
                adapter = %self.name(),
                interval_secs = period.as_secs(),
                "Starting adapter loop"
            );

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.tick().await {
                    TickOutcome::Updated => debug!(adapter = %self.name(), "Snapshot updated"),
                    TickOutcome::Skipped(state) => {
                        debug!(adapter = %self.name(), state = state.as_str(), "Tick skipped")
                    }
                    TickOutcome::Retained(_) | TickOutcome::Halted(_) => {}
                }
            }
        })
    }
}
