use serde::Deserialize;
use serde_json::Value;

/// Usage summary for one billing period (values in GB).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UsageRecord {
    /// Record identifier; numeric or string depending on the API version
    #[serde(rename = "OID", default)]
    pub oid: Option<Value>,
    #[serde(default)]
    pub is_current: Option<bool>,
    #[serde(default)]
    pub on_peak_download: Option<f64>,
    #[serde(default)]
    pub on_peak_upload: Option<f64>,
    #[serde(default)]
    pub off_peak_download: Option<f64>,
    #[serde(default)]
    pub off_peak_upload: Option<f64>,
}

impl UsageRecord {
    pub fn oid_string(&self) -> Option<String> {
        match self.oid.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// OData response of `UsageSummaryRecords`.
#[derive(Debug, Deserialize)]
pub struct UsageResponse {
    pub value: Vec<UsageRecord>,
}
