//! Sensor manager - Orchestrates adapter lifecycle.
//!
//! Initializes adapters, starts their polling loops, keeps retrying
//! account discovery for providers that need it, routes OAuth callbacks to
//! the adapter that requested them, and shuts everything down.

use crate::registry::QuestradeDiscovery;
use crate::runners::{AdapterState, PollingAdapter};
use sensorpoll::oauth::{run_state_purge, StateManager};
use sensorpoll::snapshot::SensorView;
use sensorpoll::AdapterError;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// How often expired CSRF states are purged
const STATE_PURGE_INTERVAL_SECS: u64 = 60;

type AdapterList = Arc<RwLock<Vec<Arc<PollingAdapter>>>>;
type TaskList = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Sensor manager - Orchestrates all adapter polling.
///
/// # Responsibilities
/// - Initialize each adapter (load credentials or request authorization)
/// - Start a polling loop per adapter
/// - Retry account discovery until it succeeds
/// - Complete authorizations arriving on the callback route
/// - Graceful shutdown
pub struct SensorManager {
    /// Grows when a discovery succeeds
    adapters: AdapterList,
    /// Taken by `start`
    discoveries: std::sync::Mutex<Vec<QuestradeDiscovery>>,
    states: StateManager,
    /// Adapter loops, discovery loops and the state cleanup task
    handles: TaskList,
}

impl SensorManager {
    pub fn new(adapters: Vec<Arc<PollingAdapter>>, states: StateManager) -> Self {
        Self {
            adapters: Arc::new(RwLock::new(adapters)),
            discoveries: std::sync::Mutex::new(Vec::new()),
            states,
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds providers whose adapters are found at runtime.
    pub fn with_discoveries(self, discoveries: Vec<QuestradeDiscovery>) -> Self {
        *self.discoveries.lock().unwrap_or_else(|e| e.into_inner()) = discoveries;
        self
    }

    /// Initializes every adapter and starts its loop.
    ///
    /// Adapters waiting for authorization get a loop too; their ticks are
    /// skipped until the callback completes. Discoveries run in the
    /// background and add their adapters when they succeed.
    ///
    /// # Returns
    /// Number of adapters ready to poll
    pub async fn start(&self) -> usize {
        let adapters = self.adapters();
        info!(adapter_count = adapters.len(), "Starting sensor manager");

        let mut ready = 0;
        let mut handles = self.handles.lock().await;

        for adapter in &adapters {
            if initialize(adapter).await {
                ready += 1;
            }
            handles.push(Arc::clone(adapter).start());
        }

        let discoveries = std::mem::take(&mut *self.discoveries.lock().unwrap_or_else(|e| e.into_inner()));
        for discovery in discoveries {
            handles.push(tokio::spawn(run_discovery(
                discovery,
                Arc::clone(&self.adapters),
                Arc::clone(&self.handles),
            )));
        }

        handles.push(tokio::spawn(run_state_purge(
            self.states.clone(),
            STATE_PURGE_INTERVAL_SECS,
        )));

        info!(ready = ready, "Sensor manager started");
        ready
    }

    /// Every adapter known so far, in registration order.
    pub fn adapters(&self) -> Vec<Arc<PollingAdapter>> {
        self.adapters.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn find(&self, name: &str) -> Option<Arc<PollingAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    pub async fn views(&self) -> Vec<SensorView> {
        let adapters = self.adapters();
        let mut views = Vec::with_capacity(adapters.len());
        for adapter in &adapters {
            views.push(adapter.view().await);
        }
        views
    }

    /// Asks the user to (re-)authorize the named adapter.
    ///
    /// This is the way back for an adapter whose credentials were revoked.
    ///
    /// # Returns
    /// `None` if no adapter has that name
    pub async fn begin_authorization(&self, name: &str) -> Option<Result<(), AdapterError>> {
        let adapter = self.find(name)?;
        Some(adapter.begin_authorization().await)
    }

    /// Completes an authorization from the provider redirect.
    ///
    /// The state must be one this process issued for an adapter of
    /// `provider`; it is consumed either way. On success the adapter polls
    /// right away instead of waiting for its next tick.
    ///
    /// # Returns
    /// Name of the authorized adapter
    pub async fn handle_callback(&self, provider: &str, code: &str, state: &str) -> Result<String, AdapterError> {
        let entry = self.states.consume(state).ok_or_else(|| {
            AdapterError::Authorization("unknown or expired authorization state".to_string())
        })?;

        let adapter = self
            .find(&entry.adapter)
            .filter(|a| a.kind() == provider)
            .ok_or_else(|| {
                AdapterError::Authorization(format!(
                    "authorization state does not belong to a {} adapter",
                    provider
                ))
            })?;

        adapter.complete_authorization(code).await?;

        tokio::spawn(async move {
            adapter.tick().await;
        });

        Ok(entry.adapter)
    }

    /// Aborts every loop. In-flight fetches are dropped with their task.
    pub async fn shutdown(&self) {
        info!("Shutting down sensor manager");

        let mut handles = self.handles.lock().await;
        let count = handles.len();
        for handle in handles.drain(..) {
            handle.abort();
        }

        info!(task_count = count, "All adapter tasks aborted");
    }
}

impl Drop for SensorManager {
    fn drop(&mut self) {
        // Best-effort abort (try_lock since Drop is sync)
        if let Ok(mut handles) = self.handles.try_lock() {
            for handle in handles.drain(..) {
                handle.abort();
            }
        }
    }
}

/// Returns true if the adapter can poll right away.
async fn initialize(adapter: &PollingAdapter) -> bool {
    match adapter.initialize().await {
        Ok(AdapterState::Ready) => true,
        Ok(state) => {
            info!(adapter = %adapter.name(), state = state.as_str(), "Adapter not ready yet");
            false
        }
        Err(e) => {
            warn!(adapter = %adapter.name(), error = %e, "Adapter failed to initialize");
            false
        }
    }
}

/// Retries `discovery` until it succeeds, then starts the adapters it found.
///
/// A fatal error (credentials rejected) ends the loop and is reported to
/// the authorization prompt.
async fn run_discovery(discovery: QuestradeDiscovery, adapters: AdapterList, handles: TaskList) {
    let period = discovery.retry_interval();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match discovery.discover().await {
            Ok(found) => {
                for adapter in &found {
                    initialize(adapter).await;
                }

                let mut handles = handles.lock().await;
                let mut list = adapters.write().unwrap_or_else(|e| e.into_inner());
                for adapter in found {
                    info!(adapter = %adapter.name(), "Discovered adapter");
                    handles.push(Arc::clone(&adapter).start());
                    list.push(adapter);
                }
                return;
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Account discovery rejected, giving up");
                discovery.report_failure(&e);
                return;
            }
            Err(e) => {
                warn!(error = %e, retry_secs = period.as_secs(), "Account discovery failed, retrying");
            }
        }
    }
}
