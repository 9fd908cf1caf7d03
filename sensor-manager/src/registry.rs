//! Adapter registry - builds adapters from configuration.
//!
//! One adapter per configured provider, except questrade which gets one
//! adapter per active account, all sharing one credential session. Those
//! accounts are only known after a network round trip, so questrade comes
//! back as a [`QuestradeDiscovery`] the manager keeps retrying.

use crate::fetcher::ApiFetcher;
use crate::prompt::AuthorizationPrompt;
use crate::provider::Provider;
use crate::providers::questrade::{self, QuestradeProvider};
use crate::providers::teksavvy::TeksavvyProvider;
use crate::providers::withings::{self, WithingsProvider};
use crate::refresher::TokenRefresher;
use crate::runners::PollingAdapter;
use crate::session::CredentialSession;
use sensorpoll::config::{GeneralConfig, QuestradeConfig, SensorConfig, TeksavvyConfig, WithingsConfig};
use sensorpoll::credentials::CredentialStore;
use sensorpoll::http::HttpClient;
use sensorpoll::oauth::StateManager;
use sensorpoll::AdapterError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Collaborators shared by every adapter.
#[derive(Clone)]
pub struct AdapterDeps {
    pub http: Arc<dyn HttpClient>,
    pub prompt: Arc<dyn AuthorizationPrompt>,
    pub states: StateManager,
}

impl AdapterDeps {
    fn adapter(&self, provider: Arc<dyn Provider>, session: Option<Arc<CredentialSession>>) -> Arc<PollingAdapter> {
        let fetcher = ApiFetcher::new(Arc::clone(&self.http), provider.endpoint(), session);
        Arc::new(PollingAdapter::new(
            provider,
            fetcher,
            Arc::clone(&self.prompt),
            self.states.clone(),
        ))
    }
}

/// What the configuration asks for.
#[derive(Default)]
pub struct Registry {
    /// Adapters known up front
    pub adapters: Vec<Arc<PollingAdapter>>,
    /// Providers whose adapters appear once discovery succeeds
    pub discoveries: Vec<QuestradeDiscovery>,
}

/// Builds every adapter the configuration asks for. Nothing here touches
/// the network.
pub fn build_adapters(config: &SensorConfig, deps: &AdapterDeps) -> Registry {
    let mut registry = Registry::default();

    if let Some(withings) = &config.withings {
        registry.adapters.push(build_withings(withings, &config.general, deps));
    }

    if let Some(questrade) = &config.questrade {
        registry
            .discoveries
            .push(build_questrade(questrade, &config.general, deps));
    }

    if let Some(teksavvy) = &config.teksavvy {
        registry.adapters.push(build_teksavvy(teksavvy, deps));
    }

    info!(
        adapter_count = registry.adapters.len(),
        discovery_count = registry.discoveries.len(),
        "Built adapters"
    );
    registry
}

pub fn build_withings(config: &WithingsConfig, general: &GeneralConfig, deps: &AdapterDeps) -> Arc<PollingAdapter> {
    let store = Arc::new(CredentialStore::open(&general.config_dir, withings::KIND));
    let oauth = withings::config::oauth_config(config, &general.callback_base_url);
    let refresher = TokenRefresher::with_authorization(Arc::clone(&deps.http), store, oauth);
    let session = Arc::new(CredentialSession::new(refresher));

    deps.adapter(Arc::new(WithingsProvider::new(config)), Some(session))
}

pub fn build_questrade(config: &QuestradeConfig, general: &GeneralConfig, deps: &AdapterDeps) -> QuestradeDiscovery {
    let store = Arc::new(CredentialStore::open(&general.config_dir, questrade::KIND));
    let refresher = TokenRefresher::new(
        Arc::clone(&deps.http),
        store,
        questrade::config::token_endpoint(config),
    );
    let session = Arc::new(CredentialSession::new(refresher).with_seed(config.refresh_token.as_str()));

    QuestradeDiscovery {
        config: config.clone(),
        session,
        deps: deps.clone(),
    }
}

/// Questrade account discovery, repeatable until it succeeds.
pub struct QuestradeDiscovery {
    config: QuestradeConfig,
    session: Arc<CredentialSession>,
    deps: AdapterDeps,
}

impl QuestradeDiscovery {
    /// Lists active accounts and builds one adapter for each.
    pub async fn discover(&self) -> Result<Vec<Arc<PollingAdapter>>, AdapterError> {
        if !self.session.load().await {
            return Err(AdapterError::Authorization(format!(
                "no credentials for client {}",
                self.session.client_id()
            )));
        }

        let fetcher = ApiFetcher::new(
            Arc::clone(&self.deps.http),
            questrade::endpoint(),
            Some(Arc::clone(&self.session)),
        );
        let accounts = questrade::discover_accounts(&fetcher).await?;

        if accounts.is_empty() {
            warn!(provider = questrade::KIND, "No active accounts found");
        }

        Ok(accounts
            .into_iter()
            .map(|account| {
                let provider = Arc::new(QuestradeProvider::new(&self.config, account));
                self.deps.adapter(provider, Some(Arc::clone(&self.session)))
            })
            .collect())
    }

    /// Delay between failed attempts
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_secs.max(1))
    }

    /// Hands a fatal discovery error to the authorization prompt.
    pub fn report_failure(&self, error: &AdapterError) {
        self.deps.prompt.authorization_failed(questrade::KIND, error);
    }
}

pub fn build_teksavvy(config: &TeksavvyConfig, deps: &AdapterDeps) -> Arc<PollingAdapter> {
    deps.adapter(Arc::new(TeksavvyProvider::new(config)), None)
}
