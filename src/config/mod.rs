use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete sensorpoll configuration
///
/// Every provider section is optional; a provider without a section is not
/// started.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub withings: Option<WithingsConfig>,
    #[serde(default)]
    pub questrade: Option<QuestradeConfig>,
    #[serde(default)]
    pub teksavvy: Option<TeksavvyConfig>,
}

/// Host-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding `<provider>.json` credential files
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Upper bound on a single outbound HTTP request
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Port of the host HTTP API (sensor views and OAuth callback)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Externally reachable base URL used to build OAuth redirect URIs
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_http_timeout() -> u64 {
    10
}

fn default_api_port() -> u16 {
    3002
}

fn default_callback_base_url() -> String {
    format!("http://localhost:{}", default_api_port())
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            http_timeout_secs: default_http_timeout(),
            api_port: default_api_port(),
            callback_base_url: default_callback_base_url(),
        }
    }
}

impl GeneralConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Health-metrics scale (OAuth2 authorization code)
#[derive(Debug, Clone, Deserialize)]
pub struct WithingsConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_withings_interval")]
    pub poll_interval_secs: u64,
}

fn default_withings_interval() -> u64 {
    1800 // 30 minutes
}

/// Brokerage balances (OAuth2 refresh token issued out of band)
#[derive(Debug, Clone, Deserialize)]
pub struct QuestradeConfig {
    pub client_id: String,
    /// Initial refresh token. Used until a credential file exists, and once
    /// more when the stored refresh token is rejected
    pub refresh_token: String,
    /// Currency whose combined balance becomes the sensor state
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

pub const DEFAULT_CURRENCY: &str = "CAD";

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_poll_interval() -> u64 {
    30
}

/// ISP data usage (static API key)
#[derive(Debug, Clone, Deserialize)]
pub struct TeksavvyConfig {
    pub api_key: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SensorConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Parse configuration from a TOML string
pub fn parse_config(contents: &str) -> Result<SensorConfig> {
    let config: SensorConfig = toml::from_str(contents)?;
    Ok(config)
}
