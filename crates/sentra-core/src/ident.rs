// ── Canonical identifier resolution ──
//
// The same logical state key must be reachable from a polled element
// snapshot and from an asynchronous event referencing the same entity,
// using two different input shapes. Everything here is a deterministic
// function of the record's identifying fields.
//
// Key scheme:
//   element channel   {baseId}.{tag}-{localId}
//   endpoint channel  gp02-{id}
//   state             {channel}.{field}

use serde_json::Value;

use sentra_api::models::{ElementRecord, EndpointRecord, EventRecord};

use crate::error::CoreError;

/// Channel prefix for phone-like endpoints.
pub const ENDPOINT_PREFIX: &str = "gp02-";

/// Origin type of call events; their key is derived from `source_id`
/// alone, ignoring the origin id.
pub const CALL_ORIGIN_TYPE: &str = "gp02.call";

/// Extract the subtype tag from a dotted wire type (`"bs01.um01"` →
/// `"um01"`). An undotted input is already a tag and passes through.
pub fn subtype_tag(type_tag: &str) -> &str {
    type_tag.split_once('.').map_or(type_tag, |(_, tag)| tag)
}

/// Split a compound element id (`"{baseId}.{localId}"`).
fn split_compound(id: &str) -> (&str, &str) {
    id.split_once('.').unwrap_or((id, ""))
}

/// Canonical channel key for an element, from its compound id and its
/// (dotted or bare) type tag.
pub fn channel_id(compound_id: &str, type_tag: &str) -> String {
    let tag = subtype_tag(type_tag);
    let (base, local) = split_compound(compound_id);
    format!("{base}.{tag}-{local}")
}

/// State key under a channel.
pub fn state_id(channel: &str, field: &str) -> String {
    format!("{channel}.{field}")
}

/// Canonical channel key for an element snapshot record.
pub fn element_channel_id(element: &ElementRecord) -> String {
    channel_id(&element.id, &element.type_tag)
}

pub fn element_state_id(element: &ElementRecord, field: &str) -> String {
    state_id(&element_channel_id(element), field)
}

/// Canonical channel key for a phone-like endpoint record.
pub fn endpoint_channel_id(endpoint: &EndpointRecord) -> String {
    format!("{ENDPOINT_PREFIX}{}", endpoint.id)
}

pub fn endpoint_state_id(endpoint: &EndpointRecord, field: &str) -> String {
    state_id(&endpoint_channel_id(endpoint), field)
}

/// Resolve the state key an event targets, or `None` when the event has
/// no addressable target (callers skip, they do not error).
///
/// Call events are special: their key comes from `source_id` with the
/// endpoint prefix, ignoring the origin id.
pub fn event_state_id(event: &EventRecord, field: &str) -> Option<String> {
    let origin = event.o.as_ref()?;
    let origin_type = origin.type_tag.as_deref()?;
    if origin_type == CALL_ORIGIN_TYPE {
        return Some(format!("{ENDPOINT_PREFIX}{}.{field}", event.source_id));
    }
    let id = origin.id.as_deref()?;
    Some(format!("{}.{origin_type}-{id}.{field}", event.source_id))
}

// ── Raw shape classification ────────────────────────────────────────

/// A raw payload classified into one of the three known record shapes.
///
/// Structural probing happens here and only here; everything downstream
/// dispatches on the variant.
#[derive(Debug, Clone)]
pub enum Record {
    Event(EventRecord),
    Element(ElementRecord),
    Endpoint(EndpointRecord),
}

/// Classify a raw record by field presence. Dispatch order matters:
/// event first (`ts`), then element-like (`connectionStatus` + `type`),
/// then bare endpoint (`connectionStatus` without `type`).
pub fn classify(raw: &Value) -> Result<Record, CoreError> {
    let decode_err = |e: serde_json::Error| CoreError::UnsupportedRecordShape(e.to_string());

    if raw.get("ts").is_some() {
        return serde_json::from_value(raw.clone())
            .map(Record::Event)
            .map_err(decode_err);
    }
    if raw.get("connectionStatus").is_some() {
        if raw.get("type").is_some() {
            return serde_json::from_value(raw.clone())
                .map(Record::Element)
                .map_err(decode_err);
        }
        return serde_json::from_value(raw.clone())
            .map(Record::Endpoint)
            .map_err(decode_err);
    }

    Err(CoreError::UnsupportedRecordShape(raw.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn element() -> ElementRecord {
        serde_json::from_value(json!({
            "id": "abcde001.01234",
            "type": "bs01.um01",
            "friendlyName": "Garage Switch",
            "connectionStatus": "online",
            "firmwareStatus": "up_to_date"
        }))
        .unwrap()
    }

    fn event(origin: Value) -> EventRecord {
        serde_json::from_value(json!({
            "ts": "1700000001000",
            "type": "open",
            "source_id": "abcde001",
            "o": origin
        }))
        .unwrap()
    }

    #[test]
    fn element_channel_key_combines_base_tag_local() {
        assert_eq!(element_channel_id(&element()), "abcde001.um01-01234");
    }

    #[test]
    fn element_state_key_appends_field() {
        assert_eq!(
            element_state_id(&element(), "position"),
            "abcde001.um01-01234.position"
        );
    }

    #[test]
    fn event_and_element_shapes_resolve_identically() {
        let via_event = event(json!({ "type": "um01", "id": "01234" }));
        assert_eq!(
            event_state_id(&via_event, "position").unwrap(),
            element_state_id(&element(), "position"),
        );
    }

    #[test]
    fn event_without_origin_type_has_no_target() {
        assert_eq!(event_state_id(&event(json!({})), "alarm"), None);

        let mut no_origin = event(json!({}));
        no_origin.o = None;
        assert_eq!(event_state_id(&no_origin, "alarm"), None);
    }

    #[test]
    fn call_event_key_ignores_origin_id() {
        let call = event(json!({ "type": "gp02.call", "id": "ignored" }));
        assert_eq!(
            event_state_id(&call, "lastCallMissed").unwrap(),
            "gp02-abcde001.lastCallMissed"
        );
    }

    #[test]
    fn endpoint_channel_key_uses_fixed_prefix() {
        let endpoint: EndpointRecord = serde_json::from_value(json!({
            "id": "1c0000aa",
            "friendlyName": "Handset",
            "connectionStatus": "online"
        }))
        .unwrap();
        assert_eq!(endpoint_channel_id(&endpoint), "gp02-1c0000aa");
        assert_eq!(endpoint_state_id(&endpoint, "online"), "gp02-1c0000aa.online");
    }

    #[test]
    fn classify_checks_event_shape_first() {
        // Carries both `ts` and `connectionStatus` -- the event probe wins.
        let raw = json!({
            "ts": "1700000001000",
            "type": "open",
            "source_id": "abcde001",
            "connectionStatus": "online"
        });
        assert!(matches!(classify(&raw).unwrap(), Record::Event(_)));
    }

    #[test]
    fn classify_distinguishes_element_from_endpoint_by_type() {
        let with_type = json!({
            "id": "a.1", "type": "bs01.ds02", "friendlyName": "Door",
            "connectionStatus": "online"
        });
        let without_type = json!({
            "id": "1c0000aa", "friendlyName": "Handset",
            "connectionStatus": "online"
        });
        assert!(matches!(classify(&with_type).unwrap(), Record::Element(_)));
        assert!(matches!(classify(&without_type).unwrap(), Record::Endpoint(_)));
    }

    #[test]
    fn classify_rejects_unknown_shapes() {
        let raw = json!({ "id": "x", "friendlyName": "mystery" });
        assert!(matches!(
            classify(&raw),
            Err(CoreError::UnsupportedRecordShape(_))
        ));
    }
}
