// ── Host state-tree contract ──
//
// The engine projects everything into a hierarchical tree of typed
// key/value nodes owned by the host platform. The platform must provide
// two idempotent primitives — define schema, write value — and surface
// writes arriving from outside the engine. `MemoryTree` is the
// reference implementation used by the CLI and the test suite.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::broadcast;

const EXTERNAL_WRITE_CHANNEL_SIZE: usize = 64;

// ── Values ──────────────────────────────────────────────────────────

/// A typed value stored at a state node.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Num(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for StateValue {
    fn from(v: u8) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Num(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Declared value type of a state node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    String,
}

// ── Schema metadata ─────────────────────────────────────────────────

/// Structural role of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Device,
    Channel,
    State,
}

/// Schema metadata for one tree node. Declaring is an upsert: repeated
/// declarations with evolving data must not duplicate or corrupt the
/// node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDef {
    pub kind: NodeKind,
    pub name: String,
    pub role: String,
    /// `None` for device/channel nodes.
    pub value: Option<ValueKind>,
    pub unit: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub read: bool,
    pub write: bool,
    /// Declarative enumeration: serialized lookup table of allowed values.
    pub states: Option<String>,
    pub default: Option<StateValue>,
}

impl NodeDef {
    pub fn device(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Device,
            name: name.into(),
            role: String::new(),
            value: None,
            unit: None,
            min: None,
            max: None,
            read: true,
            write: false,
            states: None,
            default: None,
        }
    }

    pub fn channel(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Channel,
            role: role.into(),
            ..Self::device(name)
        }
    }

    /// A read-only state node — the default for everything the engine
    /// projects.
    pub fn state(name: impl Into<String>, value: ValueKind, role: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::State,
            role: role.into(),
            value: Some(value),
            ..Self::device(name)
        }
    }

    /// Allow external writes in addition to reads.
    pub fn writable(mut self) -> Self {
        self.write = true;
        self
    }

    /// Write-only trigger node (buttons).
    pub fn write_only(mut self) -> Self {
        self.read = false;
        self.write = true;
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn states(mut self, states: impl Into<String>) -> Self {
        self.states = Some(states.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<StateValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

// ── Errors & external writes ────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A value write targeted a node whose schema was never declared.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// An external write targeted a node not declared writable.
    #[error("node is read-only: {0}")]
    ReadOnly(String),
}

/// A write arriving from outside the engine (UI, automation, …) on a
/// write-capable node. The supervisor turns these into remote commands.
#[derive(Debug, Clone)]
pub struct ExternalWrite {
    pub id: String,
    pub value: StateValue,
}

// ── Contract ────────────────────────────────────────────────────────

/// The host platform surface the engine requires.
pub trait StateTree: Send + Sync + 'static {
    /// Idempotently create or update a node's schema metadata. Never
    /// touches the node's value (a declared default is only applied to
    /// a node that has no value yet).
    fn define(
        &self,
        id: &str,
        node: NodeDef,
    ) -> impl Future<Output = Result<(), TreeError>> + Send;

    /// Write a value. The node's schema must already be declared.
    fn write(
        &self,
        id: &str,
        value: StateValue,
    ) -> impl Future<Output = Result<(), TreeError>> + Send;

    /// Subscribe to writes arriving from outside the engine.
    fn external_writes(&self) -> broadcast::Receiver<ExternalWrite>;
}

// ── In-memory reference implementation ──────────────────────────────

/// DashMap-backed `StateTree` for the CLI and tests.
pub struct MemoryTree {
    nodes: DashMap<String, NodeDef>,
    values: DashMap<String, StateValue>,
    external_tx: broadcast::Sender<ExternalWrite>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        let (external_tx, _) = broadcast::channel(EXTERNAL_WRITE_CHANNEL_SIZE);
        Self {
            nodes: DashMap::new(),
            values: DashMap::new(),
            external_tx,
        }
    }

    /// Current schema of a node, if declared.
    pub fn node(&self, id: &str) -> Option<NodeDef> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    /// Current value of a node, if any.
    pub fn value(&self, id: &str) -> Option<StateValue> {
        self.values.get(id).map(|entry| entry.value().clone())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All current values, sorted by node id.
    pub fn dump_values(&self) -> Vec<(String, StateValue)> {
        let mut out: Vec<(String, StateValue)> = self
            .values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Simulate a write from outside the engine. Applies the value and
    /// notifies subscribers; refused for undeclared or read-only nodes.
    pub fn external_write(
        &self,
        id: &str,
        value: impl Into<StateValue>,
    ) -> Result<(), TreeError> {
        let Some(node) = self.nodes.get(id) else {
            return Err(TreeError::UnknownNode(id.to_owned()));
        };
        if !node.write {
            return Err(TreeError::ReadOnly(id.to_owned()));
        }
        drop(node);

        let value = value.into();
        self.values.insert(id.to_owned(), value.clone());
        let _ = self.external_tx.send(ExternalWrite {
            id: id.to_owned(),
            value,
        });
        Ok(())
    }
}

impl StateTree for MemoryTree {
    async fn define(&self, id: &str, node: NodeDef) -> Result<(), TreeError> {
        if let Some(default) = &node.default {
            if !self.values.contains_key(id) {
                self.values.insert(id.to_owned(), default.clone());
            }
        }
        self.nodes.insert(id.to_owned(), node);
        Ok(())
    }

    async fn write(&self, id: &str, value: StateValue) -> Result<(), TreeError> {
        if !self.nodes.contains_key(id) {
            return Err(TreeError::UnknownNode(id.to_owned()));
        }
        self.values.insert(id.to_owned(), value);
        Ok(())
    }

    fn external_writes(&self) -> broadcast::Receiver<ExternalWrite> {
        self.external_tx.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn define_is_an_upsert() {
        let tree = MemoryTree::new();
        tree.define("a.name", NodeDef::state("old", ValueKind::String, "text"))
            .await
            .unwrap();
        tree.define("a.name", NodeDef::state("new", ValueKind::String, "text"))
            .await
            .unwrap();

        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.node("a.name").unwrap().name, "new");
    }

    #[tokio::test]
    async fn write_requires_declared_schema() {
        let tree = MemoryTree::new();
        let err = tree.write("a.online", StateValue::Bool(true)).await.unwrap_err();
        assert!(matches!(err, TreeError::UnknownNode(_)));

        tree.define("a.online", NodeDef::state("online", ValueKind::Bool, "indicator"))
            .await
            .unwrap();
        tree.write("a.online", StateValue::Bool(true)).await.unwrap();
        assert_eq!(tree.value("a.online"), Some(StateValue::Bool(true)));
    }

    #[tokio::test]
    async fn default_applies_only_once() {
        let tree = MemoryTree::new();
        let def = NodeDef::state("alarm", ValueKind::Bool, "sensor.alarm").default_value(false);

        tree.define("a.alarm", def.clone()).await.unwrap();
        assert_eq!(tree.value("a.alarm"), Some(StateValue::Bool(false)));

        tree.write("a.alarm", StateValue::Bool(true)).await.unwrap();
        tree.define("a.alarm", def).await.unwrap();
        // Re-declaring must not clobber the live value.
        assert_eq!(tree.value("a.alarm"), Some(StateValue::Bool(true)));
    }

    #[tokio::test]
    async fn external_write_enforces_write_flag() {
        let tree = MemoryTree::new();
        tree.define("a.relay", NodeDef::state("relay", ValueKind::Bool, "switch").writable())
            .await
            .unwrap();
        tree.define("a.online", NodeDef::state("online", ValueKind::Bool, "indicator"))
            .await
            .unwrap();

        let mut rx = tree.external_writes();
        tree.external_write("a.relay", true).unwrap();
        assert!(matches!(
            tree.external_write("a.online", true),
            Err(TreeError::ReadOnly(_))
        ));
        assert!(matches!(
            tree.external_write("a.missing", true),
            Err(TreeError::UnknownNode(_))
        ));

        let seen = rx.try_recv().unwrap();
        assert_eq!(seen.id, "a.relay");
        assert_eq!(seen.value, StateValue::Bool(true));
    }
}
