// ── Event processor ──
//
// Applies an ordered event stream as targeted state mutations. Events
// are sorted ascending by timestamp (the fixed-width source format
// makes lexicographic comparison chronological) and applied strictly in
// order: some event types are ordering-dependent — an intrusion "ack"
// after an intrusion "start" must net to inactive.

use tracing::{debug, info, warn};

use sentra_api::models::EventRecord;

use crate::convert::position_ordinal;
use crate::error::CoreError;
use crate::global;
use crate::ident::event_state_id;
use crate::tree::StateTree;
use crate::writer::DiffWriter;

/// Placeholder stored for calls without a transmitted caller id.
const UNKNOWN_CALLER: &str = "unknown";

/// Sort events ascending by timestamp and apply them one at a time.
/// Event *n+1* is not started before event *n*'s mutation has been
/// applied. Unknown event types are logged and skipped.
pub async fn process_events<S: StateTree>(
    diff: &DiffWriter<S>,
    events: &[EventRecord],
) -> Result<(), CoreError> {
    let mut sorted: Vec<&EventRecord> = events.iter().collect();
    sorted.sort_by(|a, b| a.ts.cmp(&b.ts));

    for event in sorted {
        process_event(diff, event).await?;
    }
    Ok(())
}

/// Apply a single event.
pub async fn process_event<S: StateTree>(
    diff: &DiffWriter<S>,
    event: &EventRecord,
) -> Result<(), CoreError> {
    match event.type_tag.as_str() {
        "open" | "tilt" | "close" => {
            let Some(id) = event_state_id(event, "position") else {
                return skip_untargeted(event);
            };
            match position_ordinal(&event.type_tag) {
                Ok(ordinal) => {
                    diff.set(&id, ordinal).await?;
                }
                Err(err) => warn!(event = %event.type_tag, error = %err, "skipping position event"),
            }
        }
        "bs_online_notification" | "bs_offline_notification" => {
            let id = format!("{}.online", event.source_id);
            diff.set(&id, event.type_tag.starts_with("bs_online")).await?;
        }
        "intrusion" | "ack_intrusion" => {
            diff.set(global::INTRUSION, !event.type_tag.starts_with("ack_"))
                .await?;
        }
        "intrusion_mode_loaded"
        | "isl01.bs01.intrusion_mode_loaded"
        | "isl01.bs01.intrusion_mode_loaded.fail"
        | "isl01.configuration_changed.user.intrusion_mode" => {
            let mode = event.o.as_ref().and_then(|o| o.mode_after.as_deref());
            match mode {
                Some(mode) => {
                    diff.set(global::INTRUSION_MODE, mode).await?;
                }
                None => warn!(event = %event.type_tag, "mode change event without modeAfter"),
            }
        }
        "sirenon" | "sirenoff" => {
            let Some(id) = event_state_id(event, "alarm") else {
                return skip_untargeted(event);
            };
            diff.set(&id, event.type_tag == "sirenon").await?;
        }
        "battery_critical" => {
            let Some(id) = event_state_id(event, "battery") else {
                return skip_untargeted(event);
            };
            diff.set(&id, "critical").await?;
        }
        "sensor_online_notification"
        | "endnode_online_notification"
        | "sensor_offline_notification"
        | "endnode_offline_notification" => {
            let online = event.type_tag.contains("_online_");
            let (Some(online_id), Some(status_id)) = (
                event_state_id(event, "online"),
                event_state_id(event, "connectionStatus"),
            ) else {
                return skip_untargeted(event);
            };
            diff.set(&online_id, online).await?;
            diff.set(&status_id, if online { "online" } else { "offline" })
                .await?;
        }
        "drilling_suspected" | "drilling_alert" | "water_detected" => {
            let Some(id) = event_state_id(event, "alarm") else {
                return skip_untargeted(event);
            };
            diff.set(&id, true).await?;
        }
        "drilling_off" | "water_no_longer_detected" => {
            let Some(id) = event_state_id(event, "alarm") else {
                return skip_untargeted(event);
            };
            diff.set(&id, false).await?;
        }
        "user_alarm_start" | "user_alarm_end" => {
            diff.set(global::USER_ALARM, event.type_tag.ends_with("start"))
                .await?;
        }
        "call" => {
            let call_type = event.o.as_ref().and_then(|o| o.call_type.as_deref());
            let field = match call_type {
                Some("missed") => "lastCallMissed",
                Some("outgoing") => "lastCallOutgoing",
                _ => "lastCallIncoming",
            };
            let Some(id) = event_state_id(event, field) else {
                return skip_untargeted(event);
            };
            let caller = event
                .o
                .as_ref()
                .and_then(|o| o.caller_id.as_deref())
                .unwrap_or(UNKNOWN_CALLER);
            diff.set(&id, caller).await?;
        }
        unknown => info!(event = unknown, "unknown event type, skipping"),
    }
    Ok(())
}

fn skip_untargeted(event: &EventRecord) -> Result<(), CoreError> {
    debug!(event = %event.type_tag, source = %event.source_id, "event has no addressable target, skipping");
    Ok(())
}
