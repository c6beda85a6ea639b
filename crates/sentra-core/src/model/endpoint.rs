// ── Phone-like endpoint domain type ──

use super::element::ConnectionStatus;

/// A phone-like endpoint device, tracked independently of base stations.
/// Its three last-call states are declared up front and mutated only by
/// call events.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub connection: ConnectionStatus,
    pub room: Option<String>,
}
