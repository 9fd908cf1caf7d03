//! Readings, snapshots and the view handed to the host.
//!
//! A mapper produces a [`Reading`]; the adapter stamps it into a
//! [`Snapshot`] and the host sees a [`SensorView`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Named attributes attached to a reading (sorted for stable output)
pub type Attributes = BTreeMap<String, Value>;

/// Result of mapping one provider response
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    /// Primary scalar value (the sensor state)
    pub value: f64,

    pub attributes: Attributes,

    /// What was measured (device model, account type, usage record)
    pub label: Option<String>,

    /// Provider-side identifier of the measured thing (device id, account
    /// number, usage record OID)
    pub source_id: Option<String>,

    /// Overrides the provider's default icon
    pub icon: Option<String>,
}

impl Reading {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            attributes: Attributes::new(),
            label: None,
            source_id: None,
            icon: None,
        }
    }

    /// Sets `key`, replacing any previous value.
    pub fn attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Sets `key` only when a value is present; absent fields are omitted.
    pub fn optional(self, key: &str, value: Option<f64>) -> Self {
        match value {
            Some(v) => self.attribute(key, v),
            None => self,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Latest successfully fetched state of one adapter
///
/// Replaced wholesale on every successful poll; never patched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub value: f64,

    pub attributes: Attributes,

    pub label: Option<String>,

    pub source_id: Option<String>,

    pub icon: Option<String>,

    /// When the reading was taken (None until the first successful poll)
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Snapshot {
    /// Zero-valued snapshot of an adapter that never fetched successfully
    pub fn empty() -> Self {
        Self {
            value: 0.0,
            attributes: Attributes::new(),
            label: None,
            source_id: None,
            icon: None,
            fetched_at: None,
        }
    }

    pub fn from_reading(reading: Reading, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value: reading.value,
            attributes: reading.attributes,
            label: reading.label,
            source_id: reading.source_id,
            icon: reading.icon,
            fetched_at: Some(fetched_at),
        }
    }

    pub fn has_data(&self) -> bool {
        self.fetched_at.is_some()
    }

    /// True if both snapshots carry the same reading, ignoring fetch time.
    pub fn same_reading(&self, other: &Snapshot) -> bool {
        self.value == other.value
            && self.attributes == other.attributes
            && self.label == other.label
            && self.source_id == other.source_id
            && self.icon == other.icon
    }
}

/// Snapshot as presented to the host, with unit and icon resolved
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SensorView {
    /// Adapter name (e.g. `questrade_26598145`)
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub state: f64,
    pub unit: String,
    pub icon: String,
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    /// Adapter lifecycle state (`ready`, `authorizing`, `failed`, ...)
    pub adapter_state: String,
}
