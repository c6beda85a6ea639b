// ── Process-wide state node ids ──
//
// Fields not scoped to a device. External consumers observe engine
// health through `CONNECTION` / `MAINTENANCE` without reading logs.

pub const CONNECTION: &str = "info.connection";
pub const MAINTENANCE: &str = "info.maintenance";
pub const INTRUSION: &str = "info.intrusion";
pub const INTRUSION_MODE: &str = "info.intrusionMode";
pub const USER_ALARM: &str = "info.userAlarm";
pub const SYSTEM_HEALTH: &str = "info.systemHealth";
