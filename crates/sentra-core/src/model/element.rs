// ── Element domain type ──
//
// An element is a base record plus an explicit capability set computed
// at ingestion. Schema declaration is driven by the capability set;
// value writes are driven by the optional fields.

use strum::Display;

/// Connection status reported by the cloud for elements and endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline,
    /// Any other raw value, preserved verbatim.
    Other(String),
}

impl ConnectionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "online" => Self::Online,
            "offline" => Self::Offline,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Element subtype, derived from the tag segment of the dotted wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ElementKind {
    Door,
    Window,
    Siren,
    Universal,
    Water,
    Smoke,
    Other,
}

impl ElementKind {
    /// Map a raw subtype tag (e.g. `"um01"`) to a kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ds01" | "ds02" => Self::Door,
            "ws02" => Self::Window,
            "is01" => Self::Siren,
            "um01" => Self::Universal,
            "wd01" => Self::Water,
            "sd01" => Self::Smoke,
            _ => Self::Other,
        }
    }

    /// Whether elements of this kind get an alarm state node.
    pub fn alarm_capable(self) -> bool {
        matches!(
            self,
            Self::Siren | Self::Universal | Self::Door | Self::Window | Self::Water
        )
    }
}

/// Capability set of one element, fixed at ingestion. Drives which
/// optional schema nodes exist for the element's channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ElementCaps {
    pub room: bool,
    pub battery: bool,
    pub position: bool,
    pub relay: bool,
    pub temperature: bool,
    pub pressure: bool,
    pub humidity: bool,
    pub test_required: bool,
    pub smoke_detected: bool,
    pub unmounted: bool,
    pub permanent_battery_low: bool,
    pub permanent_battery_change_request: bool,
    pub smoke_chamber_fail: bool,
    pub smoke_detector_off: bool,
}

/// A sensor/actuator element attached to a base station.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Compound cloud id: `{baseId}.{localId}`.
    pub id: String,
    /// Raw subtype tag, e.g. `"um01"` — part of the canonical channel key.
    pub tag: String,
    pub kind: ElementKind,
    pub name: String,
    pub connection: ConnectionStatus,
    pub firmware: String,
    pub room: Option<String>,
    pub battery: Option<String>,
    /// Raw position enum as reported (`"closed"`, `"tilted"`, ...).
    pub position: Option<String>,
    pub relay_on: Option<bool>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub test_required: Option<bool>,
    pub smoke_detected: Option<bool>,
    pub unmounted: Option<bool>,
    pub permanent_battery_low: Option<bool>,
    pub permanent_battery_change_request: Option<bool>,
    pub smoke_chamber_fail: Option<bool>,
    pub smoke_detector_off: Option<bool>,
    pub caps: ElementCaps,
}

impl Element {
    /// Whether firmware updates are pending.
    pub fn updates_available(&self) -> bool {
        self.firmware != "up_to_date"
    }
}
