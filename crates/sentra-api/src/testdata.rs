// ── Canned test data ──
//
// A small but representative account snapshot used by the diagnostic
// `process-test-data` RPC and by integration tests: one base station,
// the common element subtypes, one phone endpoint, and an event batch
// covering every dispatch arm.

use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{BaseStationRecord, ElementsRoot, EventsPage};

/// Canned base stations.
pub fn canned_base_stations() -> Vec<BaseStationRecord> {
    serde_json::from_value(json!([
        {
            "id": "F0AD4E000000",
            "friendly_name": "Home",
            "status": "online",
            "intrusion_settings": {
                "active_mode": "home",
                "modes": [
                    { "home": { "sirenOn": false } },
                    { "away": { "sirenOn": true } },
                    { "night": { "sirenOn": true } },
                    { "custom": { "sirenOn": true } }
                ]
            }
        }
    ]))
    .expect("canned base station data is valid")
}

/// Canned elements root: subelements for the base station above plus one
/// phone endpoint.
pub fn canned_elements() -> ElementsRoot {
    serde_json::from_value(json!({
        "bs01": [
            {
                "id": "F0AD4E000000",
                "subelements": [
                    {
                        "id": "F0AD4E000000.01ab",
                        "type": "bs01.ds02",
                        "friendlyName": "Front Door",
                        "connectionStatus": "online",
                        "firmwareStatus": "up_to_date",
                        "room": { "friendlyName": "Hallway" },
                        "batteryStatus": "ok",
                        "positionStatus": "closed"
                    },
                    {
                        "id": "F0AD4E000000.02cd",
                        "type": "bs01.ws02",
                        "friendlyName": "Kitchen Window",
                        "connectionStatus": "online",
                        "firmwareStatus": "up_to_date",
                        "room": { "friendlyName": "Kitchen" },
                        "batteryStatus": "ok",
                        "positionStatus": "tilted"
                    },
                    {
                        "id": "F0AD4E000000.03ef",
                        "type": "bs01.um01",
                        "friendlyName": "Garage Switch",
                        "connectionStatus": "online",
                        "firmwareStatus": "up_to_date",
                        "states": {
                            "relay": "off",
                            "temperature": 19.5,
                            "pressure": 1013.0,
                            "humidity": 54.0,
                            "testRequired": false
                        }
                    },
                    {
                        "id": "F0AD4E000000.04aa",
                        "type": "bs01.sd01",
                        "friendlyName": "Bedroom Smoke Alarm",
                        "connectionStatus": "online",
                        "firmwareStatus": "up_to_date",
                        "room": { "friendlyName": "Bedroom" },
                        "batteryStatus": "ok",
                        "smokeDetected": false,
                        "unmounted": false,
                        "permanentBatteryLow": false,
                        "smokeChamberFail": false,
                        "smokeDetectorOff": false,
                        "testRequired": false
                    },
                    {
                        "id": "F0AD4E000000.05bb",
                        "type": "bs01.is01",
                        "friendlyName": "Siren",
                        "connectionStatus": "offline",
                        "firmwareStatus": "up_to_date"
                    }
                ]
            }
        ],
        "gp02": [
            {
                "id": "1c0000aa",
                "friendlyName": "Living Room Handset",
                "connectionStatus": "online",
                "room": { "friendlyName": "Living Room" }
            }
        ]
    }))
    .expect("canned elements data is valid")
}

/// Canned event batch, deliberately out of timestamp order.
pub fn canned_events() -> EventsPage {
    serde_json::from_value(json!({
        "home_state": "ok",
        "events": [
            {
                "ts": "1700000002000",
                "type": "close",
                "source_id": "F0AD4E000000",
                "o": { "type": "ds02", "id": "01ab" }
            },
            {
                "ts": "1700000001000",
                "type": "open",
                "source_id": "F0AD4E000000",
                "o": { "type": "ds02", "id": "01ab" }
            },
            {
                "ts": "1700000003000",
                "type": "intrusion",
                "source_id": "F0AD4E000000",
                "o": { "type": "bs01", "id": "F0AD4E000000" }
            },
            {
                "ts": "1700000004000",
                "type": "ack_intrusion",
                "source_id": "F0AD4E000000",
                "o": { "type": "bs01", "id": "F0AD4E000000" }
            },
            {
                "ts": "1700000005000",
                "type": "call",
                "source_id": "1c0000aa",
                "o": { "type": "gp02.call", "callType": "missed", "callerId": "+4912345" }
            },
            {
                "ts": "1700000006000",
                "type": "battery_critical",
                "source_id": "F0AD4E000000",
                "o": { "type": "ws02", "id": "02cd" }
            }
        ]
    }))
    .expect("canned event data is valid")
}

/// Fetch a live account snapshot and strip personal data, for attaching
/// to bug reports. Friendly names, rooms, and caller ids are replaced;
/// structural fields (ids, types, states) are kept verbatim.
pub async fn retrieve_and_prepare(
    api: &ApiClient,
    from_ts: i64,
) -> Result<(Vec<BaseStationRecord>, ElementsRoot, EventsPage), Error> {
    let mut stations = api.get_base_stations().await?;
    let mut elements = api.get_elements().await?;
    let mut events = api.get_events_range(from_ts, None).await?;

    for (i, bs) in stations.iter_mut().enumerate() {
        bs.friendly_name = format!("basestation-{i}");
        bs.extra.clear();
    }
    for group in &mut elements.bs01 {
        for (i, el) in group.subelements.iter_mut().enumerate() {
            el.friendly_name = format!("element-{i}");
            if let Some(room) = &mut el.room {
                room.friendly_name = format!("room-{i}");
            }
            el.extra.clear();
        }
    }
    for (i, ep) in elements.gp02.iter_mut().enumerate() {
        ep.friendly_name = format!("endpoint-{i}");
        if let Some(room) = &mut ep.room {
            room.friendly_name = format!("room-{i}");
        }
        ep.extra.clear();
    }
    for ev in &mut events.events {
        if let Some(o) = &mut ev.o {
            if o.caller_id.is_some() {
                o.caller_id = Some("anonymous".to_owned());
            }
            o.extra.clear();
        }
        ev.extra.clear();
    }

    Ok((stations, elements, events))
}

/// Raw JSON rendering of the canned dataset, for debug responses.
pub fn canned_snapshot() -> Value {
    json!({
        "bs": canned_base_stations(),
        "elements": canned_elements(),
        "events": canned_events(),
    })
}
