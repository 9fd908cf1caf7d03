//! Provider implementations.
//!
//! Each provider lives in its own module:
//! - `config` - API constants and credential endpoints
//! - `api` - typed response bodies
//! - `mapper` - pure response → [`Reading`](sensorpoll::snapshot::Reading) mapping

pub mod questrade;
pub mod teksavvy;
pub mod withings;

use sensorpoll::AdapterError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes a JSON response into a typed body.
///
/// Missing required fields and type mismatches are `MalformedResponse`.
pub(crate) fn decode<T: DeserializeOwned>(json: &Value, what: &str) -> Result<T, AdapterError> {
    T::deserialize(json)
        .map_err(|e| AdapterError::MalformedResponse(format!("invalid {} response: {}", what, e)))
}
