// ── Canonical domain types ──
//
// Produced once at ingestion from raw `sentra_api` records; everything
// downstream (projector, writer, events) works on these.

pub mod base_station;
pub mod element;
pub mod endpoint;

pub use base_station::BaseStation;
pub use element::{ConnectionStatus, Element, ElementCaps, ElementKind};
pub use endpoint::Endpoint;
