//! Outbound HTTP capability.
//!
//! Adapters never talk to `reqwest` directly; they receive an
//! `Arc<dyn HttpClient>` at construction. Production code uses
//! [`ReqwestClient`], tests use the scripted double in [`mock`].

use crate::error::AdapterError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

/// Default bound on a single request, connect through body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP method subset used by provider APIs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully described outbound request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    /// URL without query string
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Form fields, sent urlencoded on POST
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {}", token))
    }

    pub fn form_field(mut self, key: &str, value: &str) -> Self {
        self.form.push((key.to_string(), value.to_string()));
        self
    }

    /// Value of the first query parameter named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    /// Value of the first form field named `key`.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        lookup(&self.form, key)
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Status and raw body of a completed request.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> Result<Value, AdapterError> {
        serde_json::from_str(&self.body).map_err(|e| {
            AdapterError::MalformedResponse(format!("response body is not JSON: {}", e))
        })
    }
}

/// Capability to execute HTTP requests.
///
/// Transport-level failures (DNS, connect, timeout) are reported as
/// `AdapterError::Http`; any response, whatever its status, is `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, AdapterError>;
}

/// [`HttpClient`] backed by `reqwest` with a bounded per-request timeout.
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .user_agent("sensorpoll/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, AdapterError> {
        debug!(method = ?request.method, url = %request.url, "Sending request");

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.method == Method::Post && !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AdapterError::Http(format!("request to {} failed: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::Http(format!("failed to read response body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::get("https://api.example.com/v1/accounts")
            .query("$filter", "IsCurrent eq true")
            .bearer("abc");

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.query_value("$filter"), Some("IsCurrent eq true"));
        assert_eq!(request.header_value("authorization"), Some("Bearer abc"));
        assert_eq!(request.form_value("code"), None);
    }

    #[test]
    fn test_response_json() {
        assert!(HttpResponse::new(200, r#"{"a":1}"#).json().is_ok());
        let err = HttpResponse::new(200, "<html>").json().unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_reqwest_get_with_query_and_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/web/Usage/UsageSummaryRecords")
            .match_query(Matcher::UrlEncoded(
                "$filter".into(),
                "IsCurrent eq true".into(),
            ))
            .match_header("TekSavvy-APIKey", "secret")
            .with_status(200)
            .with_body(r#"{"value":[]}"#)
            .create_async()
            .await;

        let client = ReqwestClient::new(DEFAULT_TIMEOUT).unwrap();
        let request = HttpRequest::get(format!("{}/web/Usage/UsageSummaryRecords", server.url()))
            .query("$filter", "IsCurrent eq true")
            .header("TekSavvy-APIKey", "secret");

        let response = client.execute(request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.json().unwrap()["value"], serde_json::json!([]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reqwest_post_form() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "r1".into()),
            ]))
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let client = ReqwestClient::new(DEFAULT_TIMEOUT).unwrap();
        let request = HttpRequest::post(format!("{}/oauth2/token", server.url()))
            .form_field("grant_type", "refresh_token")
            .form_field("refresh_token", "r1");

        let response = client.execute(request).await.unwrap();
        assert_eq!(response.status, 400);
        assert!(!response.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reqwest_unreachable_is_http_error() {
        let client = ReqwestClient::new(Duration::from_secs(2)).unwrap();
        let err = client
            .execute(HttpRequest::get("http://127.0.0.1:9/unreachable"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Http(_)));
    }
}
