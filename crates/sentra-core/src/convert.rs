// ── API-to-domain conversions ──
//
// Bridges raw `sentra_api` records into canonical domain types, plus the
// two pure value converters used by the schema and write layers.

use serde_json::Value;

use sentra_api::models::{BaseStationRecord, ElementRecord, EndpointRecord};

use crate::error::CoreError;
use crate::ident::subtype_tag;
use crate::model::{BaseStation, ConnectionStatus, Element, ElementCaps, ElementKind, Endpoint};

// ── Value converters ────────────────────────────────────────────────

/// Map a raw position string onto the stored ordinal: 0 closed, 1
/// tilted, 2 opened. Anything else is [`CoreError::UnknownEnumValue`],
/// fatal for the single write it occurred in.
pub fn position_ordinal(raw: &str) -> Result<u8, CoreError> {
    match raw {
        "closed" | "close" | "probably_closed" => Ok(0),
        "tilted" | "tilt" | "probably_tilted" => Ok(1),
        "opened" | "open" | "probably_open" => Ok(2),
        other => Err(CoreError::UnknownEnumValue(other.to_owned())),
    }
}

/// Convert the ordered list of single-key mode markers into a serialized
/// lookup table mapping each mode name to itself. Used as the
/// declarative `states` enumeration on the intrusion-mode node.
pub fn intrusion_modes_lookup(modes: &[serde_json::Map<String, Value>]) -> String {
    let table: serde_json::Map<String, Value> = modes
        .iter()
        .filter_map(|marker| marker.keys().next())
        .map(|name| (name.clone(), Value::String(name.clone())))
        .collect();
    Value::Object(table).to_string()
}

/// Mode names of a base station, in cloud order.
pub fn mode_names(modes: &[serde_json::Map<String, Value>]) -> Vec<String> {
    modes
        .iter()
        .filter_map(|marker| marker.keys().next().cloned())
        .collect()
}

// ── Record ingestion ────────────────────────────────────────────────

impl From<BaseStationRecord> for BaseStation {
    fn from(record: BaseStationRecord) -> Self {
        Self {
            id: record.id,
            name: record.friendly_name,
            online: record.status == "online",
            modes: mode_names(&record.intrusion_settings.modes),
            modes_lookup: intrusion_modes_lookup(&record.intrusion_settings.modes),
            active_mode: record.intrusion_settings.active_mode,
        }
    }
}

impl From<ElementRecord> for Element {
    fn from(record: ElementRecord) -> Self {
        let tag = subtype_tag(&record.type_tag).to_owned();
        let kind = ElementKind::from_tag(&tag);
        let states = record.states.unwrap_or_default();

        // Older firmware reports testRequired at the record level, newer
        // firmware nests it under states; either counts.
        let test_required = states.test_required.or(record.test_required);

        let caps = ElementCaps {
            room: record.room.is_some(),
            battery: record.battery_status.is_some(),
            position: record.position_status.is_some(),
            relay: states.relay.is_some(),
            temperature: states.temperature.is_some(),
            pressure: states.pressure.is_some(),
            humidity: states.humidity.is_some(),
            test_required: test_required.is_some(),
            smoke_detected: record.smoke_detected.is_some(),
            unmounted: record.unmounted.is_some(),
            permanent_battery_low: record.permanent_battery_low.is_some(),
            permanent_battery_change_request: record.permanent_battery_change_request.is_some(),
            smoke_chamber_fail: record.smoke_chamber_fail.is_some(),
            smoke_detector_off: record.smoke_detector_off.is_some(),
        };

        Self {
            id: record.id,
            tag,
            kind,
            name: record.friendly_name,
            connection: ConnectionStatus::parse(&record.connection_status),
            firmware: record.firmware_status,
            room: record.room.map(|r| r.friendly_name),
            battery: record.battery_status,
            position: record.position_status,
            relay_on: states.relay.as_deref().map(|r| r == "on"),
            temperature: states.temperature,
            pressure: states.pressure,
            humidity: states.humidity,
            test_required,
            smoke_detected: record.smoke_detected,
            unmounted: record.unmounted,
            permanent_battery_low: record.permanent_battery_low,
            permanent_battery_change_request: record.permanent_battery_change_request,
            smoke_chamber_fail: record.smoke_chamber_fail,
            smoke_detector_off: record.smoke_detector_off,
            caps,
        }
    }
}

impl From<EndpointRecord> for Endpoint {
    fn from(record: EndpointRecord) -> Self {
        Self {
            id: record.id,
            name: record.friendly_name,
            connection: ConnectionStatus::parse(&record.connection_status),
            room: record.room.map(|r| r.friendly_name),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn position_ordinal_covers_all_recognized_strings() {
        for (raw, expected) in [
            ("closed", 0),
            ("close", 0),
            ("probably_closed", 0),
            ("tilted", 1),
            ("tilt", 1),
            ("probably_tilted", 1),
            ("opened", 2),
            ("open", 2),
            ("probably_open", 2),
        ] {
            assert_eq!(position_ordinal(raw).unwrap(), expected, "input: {raw}");
        }
    }

    #[test]
    fn position_ordinal_rejects_unknown_input() {
        let err = position_ordinal("ajar").unwrap_err();
        assert!(matches!(err, CoreError::UnknownEnumValue(v) if v == "ajar"));
    }

    #[test]
    fn intrusion_modes_round_trip() {
        let modes: Vec<serde_json::Map<String, Value>> = vec![
            json!({ "home": { "sirenOn": false } }),
            json!({ "away": { "sirenOn": true } }),
            json!({ "night": {} }),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect();

        let serialized = intrusion_modes_lookup(&modes);
        let parsed: serde_json::Map<String, Value> =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(parsed.len(), 3);
        for name in ["home", "away", "night"] {
            assert_eq!(parsed.get(name).and_then(Value::as_str), Some(name));
        }
    }

    #[test]
    fn element_ingestion_computes_capability_set() {
        let record: ElementRecord = serde_json::from_value(json!({
            "id": "abcde001.01234",
            "type": "bs01.um01",
            "friendlyName": "Garage Switch",
            "connectionStatus": "online",
            "firmwareStatus": "up_to_date",
            "states": { "relay": "on", "temperature": 21.0 }
        }))
        .unwrap();

        let element = Element::from(record);
        assert_eq!(element.tag, "um01");
        assert_eq!(element.kind, ElementKind::Universal);
        assert!(element.caps.relay);
        assert!(element.caps.temperature);
        assert!(!element.caps.position);
        assert!(!element.caps.room);
        assert_eq!(element.relay_on, Some(true));
        assert!(!element.updates_available());
    }

    #[test]
    fn element_test_required_merges_both_locations() {
        let nested: ElementRecord = serde_json::from_value(json!({
            "id": "a.1", "type": "bs01.sd01", "friendlyName": "Smoke",
            "connectionStatus": "online", "firmwareStatus": "up_to_date",
            "states": { "testRequired": true }
        }))
        .unwrap();
        let top_level: ElementRecord = serde_json::from_value(json!({
            "id": "a.2", "type": "bs01.sd01", "friendlyName": "Smoke",
            "connectionStatus": "online", "firmwareStatus": "up_to_date",
            "testRequired": false
        }))
        .unwrap();

        assert_eq!(Element::from(nested).test_required, Some(true));
        let converted = Element::from(top_level);
        assert_eq!(converted.test_required, Some(false));
        assert!(converted.caps.test_required);
    }

    #[test]
    fn base_station_ingestion_extracts_mode_names() {
        let record: BaseStationRecord = serde_json::from_value(json!({
            "id": "F0AD4E000000",
            "friendly_name": "Home",
            "status": "offline",
            "intrusion_settings": {
                "active_mode": "away",
                "modes": [ { "home": {} }, { "away": {} } ]
            }
        }))
        .unwrap();

        let bs = BaseStation::from(record);
        assert!(!bs.online);
        assert_eq!(bs.modes, vec!["home", "away"]);
        assert_eq!(bs.active_mode, "away");
        let lookup: serde_json::Map<String, Value> =
            serde_json::from_str(&bs.modes_lookup).unwrap();
        assert_eq!(lookup.len(), 2);
    }
}
