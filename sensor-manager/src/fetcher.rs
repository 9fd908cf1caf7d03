//! Authenticated JSON fetches against one provider API.

use crate::session::CredentialSession;
use crate::types::{AuthHeader, BaseUrl, EndpointDescriptor};
use sensorpoll::credentials::Credentials;
use sensorpoll::http::{HttpClient, HttpRequest};
use sensorpoll::AdapterError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Issues GET requests for a provider, refreshing tokens as needed.
///
/// A single `get_json` call refreshes at most once: either up front because
/// the credentials are stale, or after the provider rejected them.
pub struct ApiFetcher {
    http: Arc<dyn HttpClient>,
    endpoint: EndpointDescriptor,
    /// Required for bearer auth; `None` for API-key providers
    session: Option<Arc<CredentialSession>>,
}

impl ApiFetcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        endpoint: EndpointDescriptor,
        session: Option<Arc<CredentialSession>>,
    ) -> Self {
        Self {
            http,
            endpoint,
            session,
        }
    }

    pub fn session(&self) -> Option<&Arc<CredentialSession>> {
        self.session.as_ref()
    }

    pub fn endpoint(&self) -> &EndpointDescriptor {
        &self.endpoint
    }

    /// Fetches `<base><resource>` and parses the body as JSON.
    ///
    /// # Errors
    /// - `Authorization` / `TokenRefresh` when credentials are missing or
    ///   cannot be refreshed
    /// - `Http` for transport failures, non-2xx statuses and a rejection
    ///   that survives a refresh
    /// - `MalformedResponse` for a body that is not JSON
    pub async fn get_json(&self, resource: &str, query: &[(&str, &str)]) -> Result<Value, AdapterError> {
        let (mut credentials, mut refreshed) = match &self.endpoint.auth {
            AuthHeader::Bearer => {
                let (creds, refreshed) = self.require_session()?.ensure_fresh().await?;
                (Some(creds), refreshed)
            }
            AuthHeader::ApiKey { .. } => (None, false),
        };

        loop {
            let request = self.build_request(resource, query, credentials.as_ref())?;
            let url = request.url.clone();
            let response = self.http.execute(request).await?;
            let body = response.json();

            if self
                .endpoint
                .rejection
                .is_rejected(response.status, body.as_ref().ok())
            {
                if let (Some(rejected), false) = (credentials.take(), refreshed) {
                    warn!(url = %url, status = response.status, "Credentials rejected, refreshing");
                    let session = self.require_session()?;
                    credentials = Some(session.refresh_rejected(&rejected).await?);
                    refreshed = true;
                    continue;
                }
                return Err(AdapterError::Http(format!(
                    "{} rejected credentials (status {})",
                    url, response.status
                )));
            }

            if !response.is_success() {
                return Err(AdapterError::Http(format!(
                    "{} returned status {}",
                    url, response.status
                )));
            }

            debug!(url = %url, "Fetched resource");
            return body;
        }
    }

    fn require_session(&self) -> Result<&CredentialSession, AdapterError> {
        self.session.as_deref().ok_or_else(|| {
            AdapterError::Authorization("bearer endpoint without a credential session".to_string())
        })
    }

    fn build_request(
        &self,
        resource: &str,
        query: &[(&str, &str)],
        credentials: Option<&Credentials>,
    ) -> Result<HttpRequest, AdapterError> {
        let base = match &self.endpoint.base_url {
            BaseUrl::Fixed(url) => url.clone(),
            BaseUrl::FromCredentials { suffix } => {
                let server = credentials
                    .and_then(|c| c.api_server.as_deref())
                    .ok_or_else(|| {
                        AdapterError::Http("credentials carry no API server".to_string())
                    })?;
                format!("{}{}", server, suffix)
            }
        };

        let mut request = HttpRequest::get(format!("{}{}", base, resource));
        for (key, value) in query {
            request = request.query(key, value);
        }

        match &self.endpoint.auth {
            AuthHeader::Bearer => {
                let token = credentials
                    .and_then(|c| c.access_token.as_deref())
                    .ok_or_else(|| AdapterError::Authorization("no access token".to_string()))?;
                request = request.bearer(token);
            }
            AuthHeader::ApiKey { header, key } => {
                request = request.header(header, key);
            }
        }

        Ok(request)
    }
}
