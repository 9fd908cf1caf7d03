use super::api::{unwrap_envelope, Device, DevicesBody, MeasuresBody};
use sensorpoll::snapshot::Reading;
use sensorpoll::AdapterError;
use serde_json::Value;

pub const ATTR_WEIGHT: &str = "weight";

/// Measure type code → attribute name. Unknown codes are ignored.
const MEASURE_TYPES: &[(i64, &str)] = &[
    (1, ATTR_WEIGHT),
    (4, "height"),
    (5, "fat_free_mass"),
    (6, "fat_ratio"),
    (8, "fat_mass_weight"),
    (9, "diastolic_blood_pressure"),
    (10, "systolic_blood_pressure"),
    (11, "heart_pulse"),
    (12, "temperature"),
    (54, "spo2"),
    (71, "body_temperature"),
    (73, "skin_temperature"),
    (76, "muscle_mass"),
    (77, "hydration"),
    (88, "bone_mass"),
    (91, "pulse_wave_velocity"),
];

fn attribute_name(measure_type: i64) -> Option<&'static str> {
    MEASURE_TYPES
        .iter()
        .find(|(code, _)| *code == measure_type)
        .map(|(_, name)| *name)
}

/// Picks the first device of a `getdevice` response.
pub fn map_devices(json: &Value) -> Result<Device, AdapterError> {
    let body: DevicesBody = unwrap_envelope(json, "getdevice")?;
    body.devices
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::NoMatchingRecord("first device".to_string()))
}

/// Maps the most recent measure group to a reading with weight as primary.
pub fn map_measures(json: &Value) -> Result<Reading, AdapterError> {
    let body: MeasuresBody = unwrap_envelope(json, "getmeas")?;
    let group = body
        .measuregrps
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::NoMatchingRecord("latest measure group".to_string()))?;

    let weight = group
        .measures
        .iter()
        .find(|m| attribute_name(m.measure_type) == Some(ATTR_WEIGHT))
        .map(|m| m.real_value())
        .ok_or_else(|| AdapterError::MalformedResponse("measure group has no weight".to_string()))?;

    let reading = group
        .measures
        .iter()
        .filter_map(|m| attribute_name(m.measure_type).map(|name| (name, m.real_value())))
        .fold(Reading::new(weight), |reading, (name, value)| {
            reading.attribute(name, value)
        });

    Ok(reading)
}
