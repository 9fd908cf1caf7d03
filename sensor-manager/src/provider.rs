use crate::fetcher::ApiFetcher;
use crate::types::{EndpointDescriptor, Presentation};
use async_trait::async_trait;
use sensorpoll::snapshot::Reading;
use sensorpoll::AdapterError;
use std::time::Duration;

/// Provider interface for polled sensor integrations.
///
/// A provider knows one third-party API: where it lives, how requests are
/// authenticated, and how a response maps onto a [`Reading`]. Providers are
/// stateless - credentials, snapshots and schedules belong to the
/// [`PollingAdapter`](crate::runners::PollingAdapter) driving them.
///
/// # Lifecycle
/// 1. Registry builds the provider from configuration
/// 2. Adapter authorizes (if needed) through its credential session
/// 3. Adapter calls `poll(fetcher)` on every tick
/// 4. The returned reading replaces the adapter's snapshot
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use sensor_manager::fetcher::ApiFetcher;
/// use sensor_manager::types::{
///     AuthHeader, BaseUrl, EndpointDescriptor, Presentation, RejectionRule,
/// };
/// use sensor_manager::Provider;
/// use sensorpoll::snapshot::Reading;
/// use sensorpoll::AdapterError;
/// use std::time::Duration;
///
/// struct Thermometer;
///
/// #[async_trait]
/// impl Provider for Thermometer {
///     fn kind(&self) -> &str {
///         "thermometer"
///     }
///
///     fn name(&self) -> &str {
///         "thermometer"
///     }
///
///     fn endpoint(&self) -> EndpointDescriptor {
///         EndpointDescriptor {
///             base_url: BaseUrl::Fixed("https://api.example.com".to_string()),
///             auth: AuthHeader::Bearer,
///             rejection: RejectionRule::Unauthorized,
///         }
///     }
///
///     fn presentation(&self) -> Presentation {
///         Presentation::new("°C", "mdi:thermometer")
///     }
///
///     fn poll_interval(&self) -> Duration {
///         Duration::from_secs(60)
///     }
///
///     async fn poll(&self, fetcher: &ApiFetcher) -> Result<Reading, AdapterError> {
///         let json = fetcher.get_json("/temperature", &[]).await?;
///         let celsius = json["celsius"]
///             .as_f64()
///             .ok_or_else(|| AdapterError::MalformedResponse("missing celsius".into()))?;
///         Ok(Reading::new(celsius))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider family (e.g. "withings"); used for credential files and
    /// OAuth callback routes.
    fn kind(&self) -> &str;

    /// Unique adapter name (e.g. "questrade_26598145").
    fn name(&self) -> &str;

    /// Base URL, auth header shape and rejection rule for API requests.
    fn endpoint(&self) -> EndpointDescriptor;

    /// Unit label and default icon.
    fn presentation(&self) -> Presentation;

    /// How often the adapter should call `poll()`.
    fn poll_interval(&self) -> Duration;

    /// Fetches provider data and maps it to a reading.
    ///
    /// # Error Handling
    /// - `Authorization` / `TokenRefresh` → adapter stops polling until re-authorized
    /// - Anything else → logged, previous snapshot kept, next tick as scheduled
    async fn poll(&self, fetcher: &ApiFetcher) -> Result<Reading, AdapterError>;
}
