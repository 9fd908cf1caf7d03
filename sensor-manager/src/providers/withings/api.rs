use crate::providers::decode;
use sensorpoll::AdapterError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Withings response envelope (`{"status": 0, "body": {...}}`).
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub status: i64,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Withings device.
#[derive(Debug, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub deviceid: Option<String>,
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
}

/// Body of `action=getdevice`.
#[derive(Debug, Deserialize)]
pub struct DevicesBody {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Single measure; the real value is `value × 10^unit`.
#[derive(Debug, Deserialize)]
pub struct Measure {
    pub value: i64,
    #[serde(rename = "type")]
    pub measure_type: i64,
    pub unit: i32,
}

impl Measure {
    pub fn real_value(&self) -> f64 {
        let value = self.value as f64;
        if self.unit < 0 {
            // Division keeps decimal fractions exact (152 / 10 == 15.2)
            value / 10f64.powi(-self.unit)
        } else {
            value * 10f64.powi(self.unit)
        }
    }
}

/// Measures taken together at one point in time.
#[derive(Debug, Deserialize)]
pub struct MeasureGroup {
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// Body of `action=getmeas`.
#[derive(Debug, Deserialize)]
pub struct MeasuresBody {
    #[serde(default)]
    pub measuregrps: Vec<MeasureGroup>,
}

/// Unwraps the envelope and decodes its body.
///
/// A non-zero status is an API-level failure (`Http`); authentication
/// rejections (status 401) never get here, the fetcher handles them.
pub fn unwrap_envelope<T: DeserializeOwned>(json: &Value, what: &str) -> Result<T, AdapterError> {
    let envelope: Envelope = decode(json, what)?;
    if envelope.status != 0 {
        return Err(AdapterError::Http(format!(
            "withings {} returned status {}{}",
            what,
            envelope.status,
            envelope
                .error
                .map(|e| format!(": {}", e))
                .unwrap_or_default()
        )));
    }
    let body = envelope
        .body
        .ok_or_else(|| AdapterError::MalformedResponse(format!("withings {} has no body", what)))?;
    decode(&body, what)
}
