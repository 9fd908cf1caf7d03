pub mod api;
pub mod config;
pub mod mapper;

use crate::fetcher::ApiFetcher;
use crate::provider::Provider;
use crate::types::{AuthHeader, BaseUrl, EndpointDescriptor, Presentation, RejectionRule};
use async_trait::async_trait;
use sensorpoll::config::WithingsConfig;
use sensorpoll::snapshot::Reading;
use sensorpoll::AdapterError;
use std::time::Duration;

use self::config::{BASE_URL, DEVICE_PATH, ICON, MEASURE_PATH, UNIT};
use self::mapper::{map_devices, map_measures};

pub const KIND: &str = "withings";

/// Withings scale - latest body weight plus the other measures of the
/// same weigh-in. The first device's model labels the reading and its id
/// identifies the source.
pub struct WithingsProvider {
    base_url: String,
    poll_interval: Duration,
}

impl WithingsProvider {
    pub fn new(config: &WithingsConfig) -> Self {
        Self::with_base_url(config, BASE_URL.to_string())
    }

    /// Create a provider with a custom API base URL (for testing).
    pub fn with_base_url(config: &WithingsConfig, base_url: String) -> Self {
        Self {
            base_url,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }
}

#[async_trait]
impl Provider for WithingsProvider {
    fn kind(&self) -> &str {
        KIND
    }

    fn name(&self) -> &str {
        KIND
    }

    fn endpoint(&self) -> EndpointDescriptor {
        EndpointDescriptor {
            base_url: BaseUrl::Fixed(self.base_url.clone()),
            auth: AuthHeader::Bearer,
            rejection: RejectionRule::UnauthorizedOrEnvelope,
        }
    }

    fn presentation(&self) -> Presentation {
        Presentation::new(UNIT, ICON)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn poll(&self, fetcher: &ApiFetcher) -> Result<Reading, AdapterError> {
        let measures = fetcher
            .get_json(MEASURE_PATH, &[("action", "getmeas"), ("category", "1")])
            .await?;
        let reading = map_measures(&measures)?;

        let devices = fetcher
            .get_json(DEVICE_PATH, &[("action", "getdevice")])
            .await?;
        let device = map_devices(&devices)?;

        let reading = match device.model {
            Some(model) => reading.label(model),
            None => reading,
        };
        Ok(match device.deviceid {
            Some(id) => reading.source_id(id),
            None => reading,
        })
    }
}
