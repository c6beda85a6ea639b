// ── Inbound diagnostic messages ──
//
// Message-style RPC surface for diagnostics and test tooling. Every
// call resolves to `{"response": ...}` or `{"error": "..."}`.

use serde_json::{Value, json};
use tracing::{debug, error};

use sentra_api::testdata;

use crate::error::CoreError;
use crate::events;
use crate::supervisor::Engine;
use crate::tree::StateTree;

/// An inbound message: a command with an arbitrary payload.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub command: String,
    pub message: Value,
}

impl InboundMessage {
    pub fn new(command: impl Into<String>, message: Value) -> Self {
        Self {
            command: command.into(),
            message,
        }
    }
}

/// Handle one message, always producing a response envelope.
pub async fn handle_message<S: StateTree>(engine: &Engine<S>, msg: &InboundMessage) -> Value {
    debug!(command = %msg.command, "message received");
    match dispatch(engine, msg).await {
        Ok(response) => json!({ "response": response }),
        Err(err) => {
            error!(command = %msg.command, error = %err, "error processing message");
            json!({ "error": err.to_string() })
        }
    }
}

async fn dispatch<S: StateTree>(
    engine: &Engine<S>,
    msg: &InboundMessage,
) -> Result<Value, CoreError> {
    match msg.command.as_str() {
        "test" => handle_test(engine, &msg.message).await,
        "debug" => handle_debug(engine, &msg.message).await,
        other => Err(CoreError::UnsupportedCommand(other.to_owned())),
    }
}

async fn handle_test<S: StateTree>(
    engine: &Engine<S>,
    message: &Value,
) -> Result<Value, CoreError> {
    match message.as_str() {
        Some("ping") => Ok(json!("pong")),
        Some("process-test-data") => {
            process_test_data(engine).await?;
            Ok(json!("successfully processed test data"))
        }
        _ => Err(CoreError::UnsupportedAction(format!(
            "'test' message: {message}"
        ))),
    }
}

async fn handle_debug<S: StateTree>(
    engine: &Engine<S>,
    message: &Value,
) -> Result<Value, CoreError> {
    let action = message.get("action").and_then(Value::as_str);
    match action {
        Some("load-bases-elements") => {
            let bs = engine.api().get_base_stations().await?;
            let elements = engine.api().get_elements().await?;
            Ok(json!({ "bs": bs, "elements": elements }))
        }
        Some("load-events") => {
            let from = ts_arg(message, "from").ok_or_else(|| {
                CoreError::UnsupportedAction("load-events requires a 'from' timestamp".into())
            })?;
            let to = ts_arg(message, "to");
            let events = engine.api().get_events_range(from, to).await?;
            Ok(json!({ "events": events }))
        }
        Some("prepare-test-data") => {
            let from = ts_arg(message, "from").ok_or_else(|| {
                CoreError::UnsupportedAction(
                    "prepare-test-data requires a 'from' timestamp".into(),
                )
            })?;
            let (bs, elements, events) = testdata::retrieve_and_prepare(engine.api(), from).await?;
            Ok(json!({ "bs": bs, "elements": elements, "events": events }))
        }
        Some(other) => Err(CoreError::UnsupportedAction(format!(
            "'debug' action: {other}"
        ))),
        None => Err(CoreError::UnsupportedAction(
            "'debug' message without an action".into(),
        )),
    }
}

/// Epoch-milliseconds argument, accepted as number or numeric string.
fn ts_arg(message: &Value, key: &str) -> Option<i64> {
    let value = message.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Run a full synchronization over the canned dataset.
async fn process_test_data<S: StateTree>(engine: &Engine<S>) -> Result<(), CoreError> {
    crate::projector::declare_globals(engine.tree().as_ref()).await?;
    for record in testdata::canned_base_stations() {
        engine.sync_base_station(record).await;
    }
    engine.sync_elements(testdata::canned_elements()).await;
    events::process_events(engine.diff(), &testdata::canned_events().events).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use secrecy::SecretString;

    use sentra_api::ApiClient;

    use super::*;
    use crate::config::EngineConfig;
    use crate::tree::{MemoryTree, StateValue};

    fn engine() -> (Engine<MemoryTree>, Arc<MemoryTree>) {
        let config = EngineConfig::new(
            "user@example.com",
            SecretString::from("secret".to_owned()),
        );
        let api = ApiClient::new(config.api_config()).unwrap();
        let tree = Arc::new(MemoryTree::new());
        (Engine::new(config, api, Arc::clone(&tree)), tree)
    }

    #[tokio::test]
    async fn ping_answers_pong() {
        let (engine, _) = engine();
        let reply = handle_message(
            &engine,
            &InboundMessage::new("test", serde_json::json!("ping")),
        )
        .await;
        assert_eq!(reply, serde_json::json!({ "response": "pong" }));
    }

    #[tokio::test]
    async fn unknown_command_yields_error_envelope() {
        let (engine, _) = engine();
        let reply = handle_message(
            &engine,
            &InboundMessage::new("selftest", serde_json::json!("ping")),
        )
        .await;
        assert!(reply.get("error").is_some());
        assert!(reply.get("response").is_none());
    }

    #[tokio::test]
    async fn unknown_test_message_yields_error_envelope() {
        let (engine, _) = engine();
        let reply = handle_message(
            &engine,
            &InboundMessage::new("test", serde_json::json!("reboot")),
        )
        .await;
        assert!(reply.get("error").is_some());
    }

    #[tokio::test]
    async fn process_test_data_projects_the_canned_account() {
        let (engine, tree) = engine();
        let reply = handle_message(
            &engine,
            &InboundMessage::new("test", serde_json::json!("process-test-data")),
        )
        .await;
        assert!(reply.get("response").is_some(), "reply: {reply}");

        // Element snapshot applied...
        assert_eq!(
            tree.value("F0AD4E000000.um01-03ef.relay"),
            Some(StateValue::Bool(false))
        );
        assert_eq!(
            tree.value("F0AD4E000000.um01-03ef.temperature"),
            Some(StateValue::Num(19.5))
        );
        // ...then events on top: open then close nets to closed.
        assert_eq!(
            tree.value("F0AD4E000000.ds02-01ab.position"),
            Some(StateValue::Int(0))
        );
        // Intrusion acked after start nets to inactive.
        assert_eq!(
            tree.value(crate::global::INTRUSION),
            Some(StateValue::Bool(false))
        );
        // Missed call recorded on the endpoint.
        assert_eq!(
            tree.value("gp02-1c0000aa.lastCallMissed"),
            Some(StateValue::from("+4912345"))
        );
        // Battery-critical event on the window sensor.
        assert_eq!(
            tree.value("F0AD4E000000.ws02-02cd.battery"),
            Some(StateValue::from("critical"))
        );
    }
}
