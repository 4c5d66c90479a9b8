//! Wall clock access.

/// Current UNIX time in whole seconds. A clock set before the epoch reads
/// as 0.
pub fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
