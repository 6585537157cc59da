use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A persisted index entry: one record per path, whole-record replacement on
/// re-index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Unique path identifier (primary key)
    pub path: String,

    /// Perceptual fingerprint, canonical hex form
    pub fingerprint: String,

    /// File size in bytes at index time
    pub file_size: u64,

    /// Last-modified unix timestamp at index time
    pub modified_time: i64,

    /// Pixel width at index time
    pub width: u32,

    /// Pixel height at index time
    pub height: u32,

    /// Monotonic insertion counter maintained by the store, audit only
    pub created_at: i64,
}

/// Fields supplied by the indexer; `created_at` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub path: String,
    pub fingerprint: String,
    pub file_size: u64,
    pub modified_time: i64,
    pub width: u32,
    pub height: u32,
}

/// Convert a filesystem timestamp to the stored unix-seconds form
pub fn system_time_to_unix(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => {
            let secs = duration.as_secs();
            if secs > i64::MAX as u64 {
                i64::MAX
            } else {
                secs as i64
            }
        }
        Err(_) => 0,
    }
}
