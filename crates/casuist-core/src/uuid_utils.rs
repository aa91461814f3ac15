//! UUIDv7 utilities for time-ordered identifiers.
//!
//! Rows created by this engine use UUIDv7 ids: unique like any UUID,
//! and embedding a millisecond timestamp in the first 48 bits so ids
//! sort in creation order. That gives the ledger its monotonic id
//! without a shared counter.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Whether a UUID is version 7.
pub fn is_v7(id: &Uuid) -> bool {
    id.get_version_num() == 7
}

/// Extract the embedded creation timestamp from a UUIDv7.
///
/// Returns `None` for other UUID versions.
pub fn extract_timestamp(id: &Uuid) -> Option<DateTime<Utc>> {
    if !is_v7(id) {
        return None;
    }
    let bytes = id.as_bytes();
    let mut millis: u64 = 0;
    for b in &bytes[..6] {
        millis = (millis << 8) | u64::from(*b);
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_version_7() {
        assert!(is_v7(&new_v7()));
        assert!(!is_v7(&Uuid::new_v4()));
    }

    #[test]
    fn test_v7_ids_sort_by_creation_time() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b);
    }

    #[test]
    fn test_extract_timestamp_close_to_now() {
        let id = new_v7();
        let ts = extract_timestamp(&id).unwrap();
        let delta = (Utc::now() - ts).num_seconds().abs();
        assert!(delta < 5);
    }

    #[test]
    fn test_extract_timestamp_rejects_v4() {
        assert!(extract_timestamp(&Uuid::new_v4()).is_none());
    }
}
