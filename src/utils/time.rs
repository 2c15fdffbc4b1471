use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// return milliseconds since the unix epoch
pub(crate) fn get_now_as_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
