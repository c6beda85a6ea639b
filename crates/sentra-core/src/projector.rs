// ── Schema projector ──
//
// Idempotently declares the tree nodes an entity needs before any value
// write targets them. Declarations are upserts: repeated calls with
// evolving data never duplicate or corrupt nodes. Sibling declarations
// are fanned out and collected — one failure does not stop the rest.

use futures_util::future::join_all;
use tracing::warn;

use crate::error::CoreError;
use crate::global;
use crate::ident::{ENDPOINT_PREFIX, channel_id, state_id};
use crate::model::{BaseStation, Element, Endpoint};
use crate::tree::{NodeDef, StateTree, ValueKind};

/// Declare all sibling nodes, logging individual failures. The first
/// error is reported only after every declaration has settled.
async fn define_all<S: StateTree>(
    tree: &S,
    nodes: Vec<(String, NodeDef)>,
) -> Result<(), CoreError> {
    let results = join_all(
        nodes
            .into_iter()
            .map(|(id, def)| async move { (id.clone(), tree.define(&id, def).await) }),
    )
    .await;

    let mut first_error = None;
    for (id, result) in results {
        if let Err(err) = result {
            warn!(node = %id, error = %err, "schema declaration failed");
            first_error.get_or_insert(CoreError::Tree(err));
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Declare the process-wide info nodes.
pub async fn declare_globals<S: StateTree>(tree: &S) -> Result<(), CoreError> {
    define_all(
        tree,
        vec![
            (
                "info".to_owned(),
                NodeDef::channel("Connection and status information", "info"),
            ),
            (
                global::CONNECTION.to_owned(),
                NodeDef::state(
                    "whether the engine is connected to the cloud",
                    ValueKind::Bool,
                    "indicator.connected",
                ),
            ),
            (
                global::MAINTENANCE.to_owned(),
                NodeDef::state(
                    "whether the cloud is under maintenance",
                    ValueKind::Bool,
                    "indicator.maintenance",
                ),
            ),
            (
                global::INTRUSION.to_owned(),
                NodeDef::state(
                    "whether there is an active intrusion alert",
                    ValueKind::Bool,
                    "indicator.alarm",
                ),
            ),
            (
                global::INTRUSION_MODE.to_owned(),
                NodeDef::state("active intrusion mode", ValueKind::String, "text").writable(),
            ),
            (
                global::USER_ALARM.to_owned(),
                NodeDef::state("manual user alarm", ValueKind::Bool, "indicator.alarm")
                    .writable(),
            ),
            (
                global::SYSTEM_HEALTH.to_owned(),
                NodeDef::state("overall system health", ValueKind::String, "info.status"),
            ),
        ],
    )
    .await
}

/// Declare a base station device and its states. The intrusion-mode
/// node carries the configured modes as its declarative enumeration.
pub async fn declare_base_station<S: StateTree>(
    tree: &S,
    bs: &BaseStation,
) -> Result<(), CoreError> {
    define_all(
        tree,
        vec![
            (bs.id.clone(), NodeDef::device("Base station")),
            (
                state_id(&bs.id, "name"),
                NodeDef::state(bs.name.clone(), ValueKind::String, "text"),
            ),
            (
                state_id(&bs.id, "online"),
                NodeDef::state(
                    "whether the base station is connected to the cloud",
                    ValueKind::Bool,
                    "indicator.reachable",
                ),
            ),
            (
                state_id(&bs.id, "intrusionMode"),
                NodeDef::state("configured intrusion mode", ValueKind::String, "text")
                    .states(bs.modes_lookup.clone()),
            ),
            (
                state_id(&bs.id, "intrusion"),
                NodeDef::state(
                    "whether there is an active intrusion alert",
                    ValueKind::Bool,
                    "indicator.alarm",
                ),
            ),
        ],
    )
    .await
}

/// Declare an element channel and its states. Optional nodes follow the
/// element's capability set — a one-time decision made at ingestion.
#[allow(clippy::too_many_lines)]
pub async fn declare_element<S: StateTree>(tree: &S, element: &Element) -> Result<(), CoreError> {
    let channel = channel_id(&element.id, &element.tag);
    let sid = |field: &str| state_id(&channel, field);

    let mut nodes = vec![
        (channel.clone(), NodeDef::channel(element.name.clone(), "sensor")),
        (
            sid("name"),
            NodeDef::state(element.name.clone(), ValueKind::String, "text"),
        ),
        (
            sid("connectionStatus"),
            NodeDef::state("connection status", ValueKind::String, "text"),
        ),
        (
            sid("online"),
            NodeDef::state(
                "whether the element is online",
                ValueKind::Bool,
                "indicator.reachable",
            ),
        ),
        (
            sid("updateStatus"),
            NodeDef::state("update status", ValueKind::String, "info.status"),
        ),
        (
            sid("updatesAvailable"),
            NodeDef::state(
                "whether firmware updates are available",
                ValueKind::Bool,
                "indicator",
            ),
        ),
    ];

    if element.kind.alarm_capable() {
        nodes.push((
            sid("alarm"),
            NodeDef::state(
                "whether the element has an alarm",
                ValueKind::Bool,
                "sensor.alarm",
            )
            .default_value(false),
        ));
    }

    let caps = &element.caps;
    if caps.room {
        nodes.push((
            sid("roomName"),
            NodeDef::state("room friendly name", ValueKind::String, "text"),
        ));
    }
    if caps.battery {
        nodes.push((
            sid("battery"),
            NodeDef::state("battery state", ValueKind::String, "text"),
        ));
    }
    if caps.position {
        nodes.push((
            sid("position"),
            NodeDef::state("window/door state", ValueKind::Number, "value.window")
                .min(0.0)
                .max(2.0),
        ));
    }
    if caps.relay {
        nodes.push((
            sid("relay"),
            NodeDef::state("Relay", ValueKind::Bool, "switch.power").writable(),
        ));
        nodes.push((
            sid("relayButton"),
            NodeDef::state("Button", ValueKind::Bool, "button").write_only(),
        ));
    }
    if caps.temperature {
        nodes.push((
            sid("temperature"),
            NodeDef::state("temperature", ValueKind::Number, "value.temperature").unit("°C"),
        ));
    }
    if caps.pressure {
        nodes.push((
            sid("pressure"),
            NodeDef::state("air pressure", ValueKind::Number, "value.pressure").unit("hPa"),
        ));
    }
    if caps.humidity {
        nodes.push((
            sid("humidity"),
            NodeDef::state("humidity", ValueKind::Number, "value.humidity").unit("%"),
        ));
    }

    for (field, present, role) in [
        ("testRequired", caps.test_required, "indicator.maintenance"),
        ("smokeDetected", caps.smoke_detected, "indicator.alarm.fire"),
        ("unmounted", caps.unmounted, "indicator"),
        ("permanentBatteryLow", caps.permanent_battery_low, "indicator.lowbat"),
        (
            "permanentBatteryChangeRequest",
            caps.permanent_battery_change_request,
            "indicator.maintenance.lowbat",
        ),
        ("smokeChamberFail", caps.smoke_chamber_fail, "indicator.maintenance"),
        ("smokeDetectorOff", caps.smoke_detector_off, "indicator"),
    ] {
        if present {
            nodes.push((sid(field), NodeDef::state(field, ValueKind::Bool, role)));
        }
    }

    define_all(tree, nodes).await
}

/// Declare a phone-like endpoint channel. The three last-call nodes are
/// unconditional; only call events mutate them.
pub async fn declare_endpoint<S: StateTree>(tree: &S, endpoint: &Endpoint) -> Result<(), CoreError> {
    let channel = format!("{ENDPOINT_PREFIX}{}", endpoint.id);
    let sid = |field: &str| state_id(&channel, field);

    let mut nodes = vec![
        (channel.clone(), NodeDef::channel(endpoint.name.clone(), "phone")),
        (
            sid("name"),
            NodeDef::state(endpoint.name.clone(), ValueKind::String, "text"),
        ),
        (
            sid("connectionStatus"),
            NodeDef::state("connection status", ValueKind::String, "text"),
        ),
        (
            sid("online"),
            NodeDef::state(
                "whether the element is online",
                ValueKind::Bool,
                "indicator.reachable",
            ),
        ),
        (
            sid("lastCallIncoming"),
            NodeDef::state("last incoming call", ValueKind::String, "text.phone"),
        ),
        (
            sid("lastCallOutgoing"),
            NodeDef::state("last outgoing call", ValueKind::String, "text.phone"),
        ),
        (
            sid("lastCallMissed"),
            NodeDef::state("last missed call", ValueKind::String, "text.phone"),
        ),
    ];
    if endpoint.room.is_some() {
        nodes.push((
            sid("roomName"),
            NodeDef::state("room friendly name", ValueKind::String, "text"),
        ));
    }

    define_all(tree, nodes).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use sentra_api::models::{ElementRecord, EndpointRecord};

    use super::*;
    use crate::model::{Element, Endpoint};
    use crate::tree::MemoryTree;

    fn element(value: serde_json::Value) -> Element {
        let record: ElementRecord = serde_json::from_value(value).unwrap();
        Element::from(record)
    }

    #[tokio::test]
    async fn relay_capability_declares_writable_pair() {
        let tree = MemoryTree::new();
        let el = element(json!({
            "id": "base01.03ef",
            "type": "bs01.um01",
            "friendlyName": "Garage Switch",
            "connectionStatus": "online",
            "firmwareStatus": "up_to_date",
            "states": { "relay": "off" }
        }));

        declare_element(&tree, &el).await.unwrap();

        let relay = tree.node("base01.um01-03ef.relay").unwrap();
        assert!(relay.read);
        assert!(relay.write);

        let button = tree.node("base01.um01-03ef.relayButton").unwrap();
        assert!(!button.read);
        assert!(button.write);
    }

    #[tokio::test]
    async fn missing_capability_declares_no_node() {
        let tree = MemoryTree::new();
        let el = element(json!({
            "id": "base01.05bb",
            "type": "bs01.is01",
            "friendlyName": "Siren",
            "connectionStatus": "online",
            "firmwareStatus": "up_to_date"
        }));

        declare_element(&tree, &el).await.unwrap();

        assert!(tree.node("base01.is01-05bb.position").is_none());
        assert!(tree.node("base01.is01-05bb.temperature").is_none());
        assert!(tree.node("base01.is01-05bb.roomName").is_none());
        // Sirens are alarm-capable.
        assert!(tree.node("base01.is01-05bb.alarm").is_some());
    }

    #[tokio::test]
    async fn smoke_detector_is_not_alarm_capable() {
        let tree = MemoryTree::new();
        let el = element(json!({
            "id": "base01.04aa",
            "type": "bs01.sd01",
            "friendlyName": "Smoke Alarm",
            "connectionStatus": "online",
            "firmwareStatus": "up_to_date",
            "smokeDetected": false
        }));

        declare_element(&tree, &el).await.unwrap();

        assert!(tree.node("base01.sd01-04aa.alarm").is_none());
        assert!(tree.node("base01.sd01-04aa.smokeDetected").is_some());
    }

    #[tokio::test]
    async fn declaring_twice_is_idempotent() {
        let tree = MemoryTree::new();
        let el = element(json!({
            "id": "base01.01ab",
            "type": "bs01.ds02",
            "friendlyName": "Front Door",
            "connectionStatus": "online",
            "firmwareStatus": "up_to_date",
            "positionStatus": "closed"
        }));

        declare_element(&tree, &el).await.unwrap();
        let count = tree.node_count();
        declare_element(&tree, &el).await.unwrap();
        assert_eq!(tree.node_count(), count);
    }

    #[tokio::test]
    async fn base_station_intrusion_mode_carries_enumeration() {
        let tree = MemoryTree::new();
        let bs = crate::model::BaseStation {
            id: "F0AD4E000000".to_owned(),
            name: "Home".to_owned(),
            online: true,
            modes: vec!["home".to_owned(), "away".to_owned()],
            modes_lookup: r#"{"away":"away","home":"home"}"#.to_owned(),
            active_mode: "home".to_owned(),
        };

        declare_base_station(&tree, &bs).await.unwrap();

        let node = tree.node("F0AD4E000000.intrusionMode").unwrap();
        let states: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(node.states.as_deref().unwrap()).unwrap();
        assert_eq!(states.get("home").and_then(serde_json::Value::as_str), Some("home"));
        assert_eq!(states.get("away").and_then(serde_json::Value::as_str), Some("away"));
    }

    #[tokio::test]
    async fn endpoint_declares_last_call_nodes() {
        let tree = MemoryTree::new();
        let record: EndpointRecord = serde_json::from_value(json!({
            "id": "1c0000aa",
            "friendlyName": "Handset",
            "connectionStatus": "online"
        }))
        .unwrap();
        let ep = Endpoint::from(record);

        declare_endpoint(&tree, &ep).await.unwrap();

        for field in ["lastCallIncoming", "lastCallOutgoing", "lastCallMissed"] {
            assert!(tree.node(&format!("gp02-1c0000aa.{field}")).is_some(), "{field}");
        }
        assert!(tree.node("gp02-1c0000aa.roomName").is_none());
    }
}
