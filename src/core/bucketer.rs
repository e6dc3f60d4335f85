//! Deterministic traffic bucketing.

use std::io::Cursor;

use crate::config::{TrafficAllocation, MAX_TRAFFIC_VALUE};

/// Seed shared with every SDK that reads the same datafiles.
pub const HASH_SEED: u32 = 1;

/// Maps `(user id, salt)` to a bucket in `[0, 10000)`.
///
/// Implementations must be pure: the same inputs always produce the same bucket.
pub trait Bucketer: Send + Sync {
    fn bucket(&self, user_id: &str, salt: &str) -> u32;

    /// Entity allocated to the user in `allocation`, if any.
    fn allocate<'a>(
        &self,
        allocation: &'a TrafficAllocation,
        user_id: &str,
        salt: &str,
    ) -> Option<&'a str> {
        allocation.entity_for(self.bucket(user_id, salt))
    }
}

/// MurmurHash3 x86 32-bit over `user_id + salt`, scaled to the bucket range.
#[derive(Debug, Clone, Copy, Default)]
pub struct MurmurBucketer;

impl MurmurBucketer {
    pub fn new() -> Self {
        Self
    }

    pub fn hash(user_id: &str, salt: &str) -> u32 {
        let key = format!("{}{}", user_id, salt);
        // Reading from an in-memory cursor cannot fail.
        murmur3::murmur3_32(&mut Cursor::new(key.as_bytes()), HASH_SEED).unwrap_or_default()
    }
}

impl Bucketer for MurmurBucketer {
    fn bucket(&self, user_id: &str, salt: &str) -> u32 {
        let hash = Self::hash(user_id, salt);
        ((hash as u64 * MAX_TRAFFIC_VALUE as u64) >> 32) as u32
    }
}
