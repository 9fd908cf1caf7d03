pub mod api;
pub mod config;
pub mod mapper;

use crate::fetcher::ApiFetcher;
use crate::provider::Provider;
use crate::types::{AuthHeader, BaseUrl, EndpointDescriptor, Presentation, RejectionRule};
use async_trait::async_trait;
use sensorpoll::config::QuestradeConfig;
use sensorpoll::snapshot::Reading;
use sensorpoll::AdapterError;
use std::time::Duration;
use tracing::info;

use self::api::Account;
use self::config::{balances_path, ACCOUNTS_PATH, API_VERSION_PREFIX, ICON_TRENDING_UP};
use self::mapper::{map_accounts, map_balances};

pub const KIND: &str = "questrade";

/// Requests go to the `api_server` handed out with each token.
pub fn endpoint() -> EndpointDescriptor {
    EndpointDescriptor {
        base_url: BaseUrl::FromCredentials {
            suffix: API_VERSION_PREFIX.to_string(),
        },
        auth: AuthHeader::Bearer,
        rejection: RejectionRule::Unauthorized,
    }
}

/// Lists the active accounts reachable with the session behind `fetcher`.
pub async fn discover_accounts(fetcher: &ApiFetcher) -> Result<Vec<Account>, AdapterError> {
    let json = fetcher.get_json(ACCOUNTS_PATH, &[]).await?;
    let accounts = map_accounts(&json)?;
    info!(count = accounts.len(), "Discovered active brokerage accounts");
    Ok(accounts)
}

/// One brokerage account - total equity in the configured currency.
pub struct QuestradeProvider {
    name: String,
    account: Account,
    currency: String,
    poll_interval: Duration,
}

impl QuestradeProvider {
    pub fn new(config: &QuestradeConfig, account: Account) -> Self {
        Self {
            name: format!("{}_{}", KIND, account.number),
            account,
            currency: config.currency.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }
}

#[async_trait]
impl Provider for QuestradeProvider {
    fn kind(&self) -> &str {
        KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> EndpointDescriptor {
        endpoint()
    }

    fn presentation(&self) -> Presentation {
        Presentation::new(&self.currency, ICON_TRENDING_UP)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn poll(&self, fetcher: &ApiFetcher) -> Result<Reading, AdapterError> {
        let json = fetcher
            .get_json(&balances_path(&self.account.number), &[])
            .await?;
        Ok(map_balances(&json, &self.currency)?
            .label(self.account.account_type.as_str())
            .source_id(self.account.number.as_str()))
    }
}
