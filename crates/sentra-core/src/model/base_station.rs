// ── Base station domain type ──

/// The hub device of a site. Created once per remote id and mutated on
/// every poll; never deleted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseStation {
    pub id: String,
    pub name: String,
    /// Whether the station is connected to the cloud.
    pub online: bool,
    /// Configured intrusion mode names, in cloud order.
    pub modes: Vec<String>,
    /// Serialized mode lookup table, used as the declarative
    /// enumeration on the intrusion-mode schema node.
    pub modes_lookup: String,
    pub active_mode: String,
}
