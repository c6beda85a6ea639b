//! Async client for the Sentra home-security cloud.
//!
//! The cloud exposes a small authenticated REST surface: base stations,
//! sensor/actuator elements grouped under them, phone-like endpoints, a
//! paged event stream, an account health summary, and a handful of
//! command endpoints (relay switching, intrusion mode, user alarm).
//!
//! - **[`ApiClient`]** — cookie-session client with proactive renewal.
//!   Errors are classified into [`Error::Transport`] (network-level) and
//!   [`Error::Rejected`] (non-success status with method/target context)
//!   so callers can pick between retry, reconnect, and giving up.
//! - **[`models`]** — typed wire records. Unknown fields are preserved
//!   in `extra` maps for debug round-tripping.
//! - **[`testdata`]** — canned account snapshot for diagnostics and
//!   tests, plus an anonymized live-snapshot helper.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod testdata;

pub use client::{ApiClient, ApiConfig, DEFAULT_BASE_URL, DEFAULT_STATUS_URL};
pub use error::Error;
pub use models::{
    BaseElements, BaseStationRecord, ElementRecord, ElementStates, ElementsRoot, EndpointRecord,
    EventOrigin, EventRecord, EventsPage, HealthRecord, IntrusionSettings, MaintenanceStatus, Room,
};
