//! Scripted [`HttpClient`] for deterministic tests.
//!
//! Responses are queued per `(method, url)`; the last queued response for a
//! route keeps being served once the queue drains, so a route scripted once
//! can be polled repeatedly. Every request is recorded for later assertions.

use super::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::error::AdapterError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type Scripted = Result<HttpResponse, String>;

struct Route {
    method: Method,
    url: String,
    responses: VecDeque<Scripted>,
}

/// In-memory HTTP double.
#[derive(Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `method url`.
    pub fn respond(&self, method: Method, url: &str, status: u16, body: &str) -> &Self {
        self.push(method, url, Ok(HttpResponse::new(status, body)))
    }

    /// Queues a transport failure for `method url`.
    pub fn fail(&self, method: Method, url: &str, message: &str) -> &Self {
        self.push(method, url, Err(message.to_string()))
    }

    fn push(&self, method: Method, url: &str, scripted: Scripted) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.method == method && r.url == url) {
            Some(route) => route.responses.push_back(scripted),
            None => routes.push(Route {
                method,
                url: url.to_string(),
                responses: VecDeque::from([scripted]),
            }),
        }
        self
    }

    /// All requests executed so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests executed against `url`.
    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }

    /// Number of requests executed against `url`.
    pub fn count(&self, url: &str) -> usize {
        self.requests_to(url).len()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, AdapterError> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && r.url == request.url)
            .ok_or_else(|| {
                AdapterError::Http(format!(
                    "no scripted response for {:?} {}",
                    request.method, request.url
                ))
            })?;

        let scripted = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        };

        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(AdapterError::Http(message)),
            None => Err(AdapterError::Http(format!(
                "no scripted response for {:?} {}",
                request.method, request.url
            ))),
        }
    }
}
