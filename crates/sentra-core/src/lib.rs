//! Synchronization engine for the Sentra home-security cloud.
//!
//! Keeps a local hierarchical state tree consistent with the remote
//! service: polls and authenticates against the cloud, classifies and
//! recovers from failures, and projects base stations, elements,
//! phone-like endpoints, and an ordered event stream into a stable,
//! idempotent tree of typed key/value entries.
//!
//! - **[`Engine`]** — connection lifecycle state machine, periodic
//!   refresh jobs (elements / events / health), failure classification,
//!   and the reactive write-back path from writable tree nodes to
//!   remote commands.
//! - **[`StateTree`]** — the contract required from the host platform:
//!   idempotent schema declaration, value writes, and notification of
//!   external writes. [`MemoryTree`] is the in-process reference
//!   implementation.
//! - **[`ident`]** — canonical key derivation for all three record
//!   shapes plus events; two derivations of the same logical entity
//!   always agree.
//! - **[`projector`]** / **[`writer`]** — schema declaration driven by
//!   per-element capability sets, and change-detecting value writes.
//! - **[`events`]** — strictly ordered event application.
//! - **[`rpc`]** — inbound diagnostic message handling.

pub mod config;
pub mod convert;
pub mod error;
pub mod events;
pub mod global;
pub mod ident;
pub mod model;
pub mod projector;
pub mod rpc;
pub mod supervisor;
pub mod tree;
pub mod writer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use error::CoreError;
pub use rpc::{InboundMessage, handle_message};
pub use supervisor::{Engine, EngineState};
pub use tree::{
    ExternalWrite, MemoryTree, NodeDef, NodeKind, StateTree, StateValue, TreeError, ValueKind,
};
pub use writer::DiffWriter;

pub use model::{BaseStation, ConnectionStatus, Element, ElementCaps, ElementKind, Endpoint};
