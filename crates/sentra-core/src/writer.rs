// ── Differential writer ──
//
// Applies current remote values to the tree with change detection:
// a write is suppressed when the new value equals the last-applied
// value, so downstream consumers never observe redundant change
// notifications. All field writes for one entity are issued
// concurrently; schema declaration always precedes the first write.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use tracing::warn;

use crate::convert::position_ordinal;
use crate::error::CoreError;
use crate::global;
use crate::ident::{channel_id, state_id};
use crate::model::{BaseStation, Element, Endpoint};
use crate::tree::{StateTree, StateValue};

/// Change-detecting write layer over a [`StateTree`].
pub struct DiffWriter<S> {
    tree: Arc<S>,
    last: DashMap<String, StateValue>,
}

impl<S: StateTree> DiffWriter<S> {
    pub fn new(tree: Arc<S>) -> Self {
        Self {
            tree,
            last: DashMap::new(),
        }
    }

    pub fn tree(&self) -> &Arc<S> {
        &self.tree
    }

    /// Write `value` to `id` unless it equals the last-applied value.
    /// Returns whether a write was actually issued.
    pub async fn set(
        &self,
        id: &str,
        value: impl Into<StateValue> + Send,
    ) -> Result<bool, CoreError> {
        let value = value.into();
        if self.last.get(id).is_some_and(|prev| *prev == value) {
            return Ok(false);
        }
        self.tree.write(id, value.clone()).await?;
        self.last.insert(id.to_owned(), value);
        Ok(true)
    }
}

/// Issue all writes of one entity concurrently. Individual failures are
/// logged; the first error is reported after every sibling has settled.
async fn write_all<S: StateTree>(
    diff: &DiffWriter<S>,
    writes: Vec<(String, StateValue)>,
) -> Result<(), CoreError> {
    let results = join_all(
        writes
            .into_iter()
            .map(|(id, value)| async move { (id.clone(), diff.set(&id, value).await) }),
    )
    .await;

    let mut first_error = None;
    for (id, result) in results {
        if let Err(err) = result {
            warn!(node = %id, error = %err, "state write failed");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Reset the global connectivity indicators to safe defaults. Called
/// once during startup, before the first connection attempt.
pub async fn reset_globals<S: StateTree>(diff: &DiffWriter<S>) -> Result<(), CoreError> {
    write_all(
        diff,
        vec![
            (global::CONNECTION.to_owned(), StateValue::Bool(false)),
            (global::MAINTENANCE.to_owned(), StateValue::Bool(false)),
        ],
    )
    .await
}

/// Apply base station values: name, online flag, and the global active
/// intrusion mode.
pub async fn apply_base_station<S: StateTree>(
    diff: &DiffWriter<S>,
    bs: &BaseStation,
) -> Result<(), CoreError> {
    write_all(
        diff,
        vec![
            (state_id(&bs.id, "name"), StateValue::from(bs.name.clone())),
            (state_id(&bs.id, "online"), StateValue::Bool(bs.online)),
            (
                global::INTRUSION_MODE.to_owned(),
                StateValue::from(bs.active_mode.clone()),
            ),
        ],
    )
    .await
}

/// Apply element values. Optional fields follow the data actually
/// present; the position of an offline element is forced to 0 rather
/// than converted, so stale enum values never surface.
pub async fn apply_element<S: StateTree>(
    diff: &DiffWriter<S>,
    element: &Element,
) -> Result<(), CoreError> {
    let channel = channel_id(&element.id, &element.tag);
    let sid = |field: &str| state_id(&channel, field);

    let mut writes = vec![
        (sid("name"), StateValue::from(element.name.clone())),
        (
            sid("connectionStatus"),
            StateValue::from(element.connection.as_str()),
        ),
        (sid("online"), StateValue::Bool(element.connection.is_online())),
        (sid("updateStatus"), StateValue::from(element.firmware.clone())),
        (
            sid("updatesAvailable"),
            StateValue::Bool(element.updates_available()),
        ),
    ];

    if let Some(room) = &element.room {
        writes.push((sid("roomName"), StateValue::from(room.clone())));
    }
    if let Some(battery) = &element.battery {
        writes.push((sid("battery"), StateValue::from(battery.clone())));
    }
    if let Some(raw) = &element.position {
        if element.connection.is_online() {
            match position_ordinal(raw) {
                Ok(ordinal) => writes.push((sid("position"), StateValue::from(ordinal))),
                Err(err) => {
                    // Aborts only this field; siblings still apply.
                    warn!(element = %element.id, error = %err, "skipping position write");
                }
            }
        } else {
            writes.push((sid("position"), StateValue::Int(0)));
        }
    }
    if let Some(on) = element.relay_on {
        writes.push((sid("relay"), StateValue::Bool(on)));
    }
    if let Some(v) = element.temperature {
        writes.push((sid("temperature"), StateValue::Num(v)));
    }
    if let Some(v) = element.pressure {
        writes.push((sid("pressure"), StateValue::Num(v)));
    }
    if let Some(v) = element.humidity {
        writes.push((sid("humidity"), StateValue::Num(v)));
    }

    for (field, flag) in [
        ("testRequired", element.test_required),
        ("smokeDetected", element.smoke_detected),
        ("unmounted", element.unmounted),
        ("permanentBatteryLow", element.permanent_battery_low),
        (
            "permanentBatteryChangeRequest",
            element.permanent_battery_change_request,
        ),
        ("smokeChamberFail", element.smoke_chamber_fail),
        ("smokeDetectorOff", element.smoke_detector_off),
    ] {
        if let Some(v) = flag {
            writes.push((sid(field), StateValue::Bool(v)));
        }
    }

    write_all(diff, writes).await
}

/// Apply endpoint values. Last-call fields are event-driven and not
/// touched here.
pub async fn apply_endpoint<S: StateTree>(
    diff: &DiffWriter<S>,
    endpoint: &Endpoint,
) -> Result<(), CoreError> {
    let channel = format!("{}{}", crate::ident::ENDPOINT_PREFIX, endpoint.id);
    let sid = |field: &str| state_id(&channel, field);

    let mut writes = vec![
        (sid("name"), StateValue::from(endpoint.name.clone())),
        (
            sid("connectionStatus"),
            StateValue::from(endpoint.connection.as_str()),
        ),
        (
            sid("online"),
            StateValue::Bool(endpoint.connection.is_online()),
        ),
    ];
    if let Some(room) = &endpoint.room {
        writes.push((sid("roomName"), StateValue::from(room.clone())));
    }

    write_all(diff, writes).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::sync::broadcast;

    use sentra_api::models::ElementRecord;

    use super::*;
    use crate::model::Element;
    use crate::projector;
    use crate::tree::{ExternalWrite, MemoryTree, NodeDef, TreeError};

    /// MemoryTree wrapper that counts issued value writes.
    struct CountingTree {
        inner: MemoryTree,
        writes: AtomicUsize,
    }

    impl CountingTree {
        fn new() -> Self {
            Self {
                inner: MemoryTree::new(),
                writes: AtomicUsize::new(0),
            }
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    impl StateTree for CountingTree {
        async fn define(&self, id: &str, node: NodeDef) -> Result<(), TreeError> {
            self.inner.define(id, node).await
        }

        async fn write(&self, id: &str, value: StateValue) -> Result<(), TreeError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.write(id, value).await
        }

        fn external_writes(&self) -> broadcast::Receiver<ExternalWrite> {
            self.inner.external_writes()
        }
    }

    fn element(value: serde_json::Value) -> Element {
        let record: ElementRecord = serde_json::from_value(value).unwrap();
        Element::from(record)
    }

    fn door(connection: &str, position: &str) -> Element {
        element(json!({
            "id": "base01.01ab",
            "type": "bs01.ds02",
            "friendlyName": "Front Door",
            "connectionStatus": connection,
            "firmwareStatus": "up_to_date",
            "positionStatus": position
        }))
    }

    #[tokio::test]
    async fn set_suppresses_unchanged_values() {
        let tree = Arc::new(CountingTree::new());
        tree.define("a.x", NodeDef::state("x", crate::tree::ValueKind::Bool, "indicator"))
            .await
            .unwrap();
        let diff = DiffWriter::new(Arc::clone(&tree));

        assert!(diff.set("a.x", true).await.unwrap());
        assert!(!diff.set("a.x", true).await.unwrap());
        assert!(diff.set("a.x", false).await.unwrap());
        assert_eq!(tree.write_count(), 2);
    }

    #[tokio::test]
    async fn repeated_apply_with_unchanged_input_issues_no_writes() {
        let tree = Arc::new(CountingTree::new());
        let el = door("online", "closed");
        projector::declare_element(tree.as_ref(), &el).await.unwrap();
        let diff = DiffWriter::new(Arc::clone(&tree));

        apply_element(&diff, &el).await.unwrap();
        let after_first = tree.write_count();
        assert!(after_first > 0);

        apply_element(&diff, &el).await.unwrap();
        assert_eq!(tree.write_count(), after_first);
    }

    #[tokio::test]
    async fn offline_element_position_is_forced_to_zero() {
        let tree = Arc::new(MemoryTree::new());
        // Raw value would convert to 2; offline forces 0 instead.
        let el = door("offline", "opened");
        projector::declare_element(tree.as_ref(), &el).await.unwrap();
        let diff = DiffWriter::new(Arc::clone(&tree));

        apply_element(&diff, &el).await.unwrap();

        let channel = channel_id(&el.id, &el.tag);
        assert_eq!(
            tree.value(&state_id(&channel, "position")),
            Some(StateValue::Int(0))
        );
        assert_eq!(
            tree.value(&state_id(&channel, "online")),
            Some(StateValue::Bool(false))
        );
    }

    #[tokio::test]
    async fn unknown_position_value_skips_only_that_field() {
        let tree = Arc::new(MemoryTree::new());
        let el = door("online", "ajar");
        projector::declare_element(tree.as_ref(), &el).await.unwrap();
        let diff = DiffWriter::new(Arc::clone(&tree));

        apply_element(&diff, &el).await.unwrap();

        let channel = channel_id(&el.id, &el.tag);
        assert_eq!(tree.value(&state_id(&channel, "position")), None);
        // Sibling fields still applied.
        assert_eq!(
            tree.value(&state_id(&channel, "name")),
            Some(StateValue::from("Front Door"))
        );
    }
}
