pub mod api;
pub mod config;
pub mod mapper;

use crate::fetcher::ApiFetcher;
use crate::provider::Provider;
use crate::types::{AuthHeader, BaseUrl, EndpointDescriptor, Presentation, RejectionRule};
use async_trait::async_trait;
use sensorpoll::config::TeksavvyConfig;
use sensorpoll::snapshot::Reading;
use sensorpoll::AdapterError;
use std::time::Duration;

use self::config::{API_KEY_HEADER, BASE_URL, CURRENT_FILTER, ICON, UNIT, USAGE_PATH};
use self::mapper::map_usage;

pub const KIND: &str = "teksavvy";

/// ISP data usage for the current billing period.
pub struct TeksavvyProvider {
    api_key: String,
    base_url: String,
    poll_interval: Duration,
}

impl TeksavvyProvider {
    pub fn new(config: &TeksavvyConfig) -> Self {
        Self::with_base_url(config, BASE_URL.to_string())
    }

    /// Create a provider with a custom API base URL (for testing).
    pub fn with_base_url(config: &TeksavvyConfig, base_url: String) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }
}

#[async_trait]
impl Provider for TeksavvyProvider {
    fn kind(&self) -> &str {
        KIND
    }

    fn name(&self) -> &str {
        KIND
    }

    fn endpoint(&self) -> EndpointDescriptor {
        EndpointDescriptor {
            base_url: BaseUrl::Fixed(self.base_url.clone()),
            auth: AuthHeader::ApiKey {
                header: API_KEY_HEADER.to_string(),
                key: self.api_key.clone(),
            },
            rejection: RejectionRule::Unauthorized,
        }
    }

    fn presentation(&self) -> Presentation {
        Presentation::new(UNIT, ICON)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn poll(&self, fetcher: &ApiFetcher) -> Result<Reading, AdapterError> {
        let json = fetcher.get_json(USAGE_PATH, &[CURRENT_FILTER]).await?;
        map_usage(&json)
    }
}
