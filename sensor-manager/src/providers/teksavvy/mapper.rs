use super::api::UsageResponse;
use crate::providers::decode;
use sensorpoll::snapshot::Reading;
use sensorpoll::AdapterError;
use serde_json::Value;

/// Maps the current billing period to a reading of on-peak download.
///
/// The request already filters on `IsCurrent`; records explicitly marked
/// not current are still skipped.
pub fn map_usage(json: &Value) -> Result<Reading, AdapterError> {
    let response: UsageResponse = decode(json, "usage")?;
    let record = response
        .value
        .into_iter()
        .find(|r| r.is_current.unwrap_or(true))
        .ok_or_else(|| AdapterError::NoMatchingRecord("IsCurrent".to_string()))?;

    let on_peak_download = record.on_peak_download.ok_or_else(|| {
        AdapterError::MalformedResponse("usage record has no OnPeakDownload".to_string())
    })?;

    let reading = Reading::new(on_peak_download)
        .optional("on_peak_download", record.on_peak_download)
        .optional("on_peak_upload", record.on_peak_upload)
        .optional("off_peak_download", record.off_peak_download)
        .optional("off_peak_upload", record.off_peak_upload);

    Ok(match record.oid_string() {
        Some(oid) => reading.label(format!("teksavvy_{}", oid)).source_id(oid),
        None => reading,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_current_usage() {
        let json = json!({"value": [{
            "OID": 8413,
            "IsCurrent": true,
            "OnPeakDownload": 120.5,
            "OnPeakUpload": 10.25,
            "OffPeakDownload": 40.0,
            "OffPeakUpload": 2.5
        }]});

        let reading = map_usage(&json).unwrap();
        assert_eq!(reading.value, 120.5);
        assert_eq!(reading.label.as_deref(), Some("teksavvy_8413"));
        assert_eq!(reading.source_id.as_deref(), Some("8413"));
        assert_eq!(reading.attributes.len(), 4);
        assert_eq!(reading.attributes["on_peak_upload"], 10.25);
        assert_eq!(reading.attributes["off_peak_download"], 40.0);
    }

    #[test]
    fn test_skips_records_not_current() {
        let json = json!({"value": [
            {"OID": "old", "IsCurrent": false, "OnPeakDownload": 300.0},
            {"OID": "new", "OnPeakDownload": 12.0}
        ]});

        let reading = map_usage(&json).unwrap();
        assert_eq!(reading.value, 12.0);
        assert_eq!(reading.label.as_deref(), Some("teksavvy_new"));
        assert_eq!(reading.attributes.len(), 1);
    }

    #[test]
    fn test_empty_value_list() {
        let err = map_usage(&json!({"value": []})).unwrap_err();
        assert!(matches!(err, AdapterError::NoMatchingRecord(_)));
    }

    #[test]
    fn test_missing_value_list() {
        let err = map_usage(&json!({"odata.metadata": "x"})).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_on_peak_download() {
        let json = json!({"value": [{"OID": 1, "OnPeakUpload": 3.0}]});
        let err = map_usage(&json).unwrap_err();
        assert!(matches!(err, AdapterError::MalformedResponse(_)));
    }
}
