use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where requests for a provider are sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BaseUrl {
    /// Fixed API host (e.g. `https://wbsapi.withings.net`)
    Fixed(String),
    /// Host handed out with each token (`Credentials::api_server`),
    /// followed by `suffix`
    FromCredentials { suffix: String },
}

/// How credentials are attached to API requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthHeader {
    /// `Authorization: Bearer <access_token>` from the credential session
    Bearer,
    /// Static key in a provider-specific header
    ApiKey { header: String, key: String },
}

/// Recognizes a response that rejected the credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionRule {
    /// HTTP 401
    Unauthorized,
    /// HTTP 401, or HTTP 200 with `{"status": 401}` in the body envelope
    UnauthorizedOrEnvelope,
}

impl RejectionRule {
    pub fn is_rejected(&self, status: u16, body: Option<&Value>) -> bool {
        if status == 401 {
            return true;
        }
        match self {
            RejectionRule::Unauthorized => false,
            RejectionRule::UnauthorizedOrEnvelope => body
                .and_then(|b| b.get("status"))
                .and_then(Value::as_i64)
                .map(|s| s == 401)
                .unwrap_or(false),
        }
    }
}

/// Static description of a provider API.
///
/// Resource paths and response field paths are constants of each provider
/// module; the descriptor only carries what the fetcher needs.
#[derive(Clone, Debug)]
pub struct EndpointDescriptor {
    pub base_url: BaseUrl,
    pub auth: AuthHeader,
    pub rejection: RejectionRule,
}

/// Unit and default icon shown next to the sensor state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub unit: String,
    pub icon: String,
}

impl Presentation {
    pub fn new(unit: &str, icon: &str) -> Self {
        Self {
            unit: unit.to_string(),
            icon: icon.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_401_always_rejected() {
        assert!(RejectionRule::Unauthorized.is_rejected(401, None));
        assert!(RejectionRule::UnauthorizedOrEnvelope.is_rejected(401, None));
    }

    #[test]
    fn test_envelope_status() {
        let body = json!({"status": 401, "error": "invalid_token"});
        assert!(RejectionRule::UnauthorizedOrEnvelope.is_rejected(200, Some(&body)));
        assert!(!RejectionRule::Unauthorized.is_rejected(200, Some(&body)));

        let ok = json!({"status": 0, "body": {}});
        assert!(!RejectionRule::UnauthorizedOrEnvelope.is_rejected(200, Some(&ok)));
    }
}
