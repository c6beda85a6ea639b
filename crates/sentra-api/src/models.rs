// ── Raw wire records ──
//
// Typed payloads as the cloud returns them. Field names follow the wire
// format (camelCase / snake_case mix); unknown fields are preserved in
// `extra` maps so debug tooling can round-trip full payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Base stations ───────────────────────────────────────────────────

/// One base station as returned by `GET /api/v1/me/basestations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStationRecord {
    pub id: String,
    pub friendly_name: String,
    /// `"online"` when the station is connected to the cloud.
    pub status: String,
    pub intrusion_settings: IntrusionSettings,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrusionSettings {
    pub active_mode: String,
    /// Ordered list of single-key mode markers, e.g. `[{"home": {...}}, ...]`.
    #[serde(default)]
    pub modes: Vec<serde_json::Map<String, Value>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ── Elements ────────────────────────────────────────────────────────

/// Root payload of `GET /api/v2/me/elements`: subelements grouped by the
/// base station that owns them, plus the independent phone-like endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementsRoot {
    #[serde(default)]
    pub bs01: Vec<BaseElements>,
    #[serde(default)]
    pub gp02: Vec<EndpointRecord>,
}

/// Subelements attached to one base station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseElements {
    pub id: String,
    #[serde(default)]
    pub subelements: Vec<ElementRecord>,
}

/// Nested per-element live values. Presence of a field doubles as a
/// capability signal for the element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementStates {
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    /// `"on"` / `"off"` for relay-capable elements.
    pub relay: Option<String>,
    #[serde(rename = "testRequired")]
    pub test_required: Option<bool>,
}

/// A sensor/actuator element. The compound `id` is `{baseId}.{localId}`;
/// `type` is dotted, e.g. `"bs01.um01"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    #[serde(rename = "connectionStatus")]
    pub connection_status: String,
    #[serde(rename = "firmwareStatus", default)]
    pub firmware_status: String,
    pub room: Option<Room>,
    #[serde(rename = "batteryStatus")]
    pub battery_status: Option<String>,
    #[serde(rename = "positionStatus")]
    pub position_status: Option<String>,
    pub states: Option<ElementStates>,
    #[serde(rename = "testRequired")]
    pub test_required: Option<bool>,
    #[serde(rename = "smokeDetected")]
    pub smoke_detected: Option<bool>,
    pub unmounted: Option<bool>,
    #[serde(rename = "permanentBatteryLow")]
    pub permanent_battery_low: Option<bool>,
    #[serde(rename = "permanentBatteryChangeRequest")]
    pub permanent_battery_change_request: Option<bool>,
    #[serde(rename = "smokeChamberFail")]
    pub smoke_chamber_fail: Option<bool>,
    #[serde(rename = "smokeDetectorOff")]
    pub smoke_detector_off: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
}

/// A phone-like endpoint device. Distinguished on the wire by having a
/// `connectionStatus` but no `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub id: String,
    #[serde(rename = "friendlyName")]
    pub friendly_name: String,
    #[serde(rename = "connectionStatus")]
    pub connection_status: String,
    pub room: Option<Room>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ── Events ──────────────────────────────────────────────────────────

/// Page of events from `GET /api/v2/me/events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub events: Vec<EventRecord>,
    pub home_state: Option<String>,
}

/// A single cloud event. `ts` is a fixed-width epoch-milliseconds string,
/// so lexicographic comparison equals chronological comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub source_id: String,
    pub source_type: Option<String>,
    pub o: Option<EventOrigin>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Nested origin of an event: the entity it refers to, or an
/// event-specific payload (mode changes, calls).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventOrigin {
    #[serde(rename = "type")]
    pub type_tag: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "modeAfter")]
    pub mode_after: Option<String>,
    #[serde(rename = "callType")]
    pub call_type: Option<String>,
    #[serde(rename = "callerId")]
    pub caller_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl EventRecord {
    /// Epoch milliseconds of the event, or 0 for a malformed timestamp.
    pub fn ts_millis(&self) -> i64 {
        self.ts.parse().unwrap_or(0)
    }

    /// Event timestamp as a `DateTime`, if the string parses.
    pub fn ts_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.ts.parse().ok()?)
    }
}

// ── Status / health ─────────────────────────────────────────────────

/// Cloud-wide status probe payload (separate status host).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceStatus {
    #[serde(rename = "isMaintenance", default)]
    pub is_maintenance: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// System health payload from `GET /api/v2/me/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Overall state, e.g. `"green"` / `"orange"` / `"red"`.
    #[serde(default)]
    pub system_health: String,
    pub status_msg_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}
