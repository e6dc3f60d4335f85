use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, FlagKitError, Result};

/// Exclusive upper bound of every bucket value.
pub const MAX_TRAFFIC_VALUE: u32 = 10_000;

/// One slot of a traffic allocation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficRange {
    /// Variation id (experiments) or experiment id (groups). Empty marks an unallocated hole.
    pub entity_id: String,
    pub end_of_range: u32,
}

impl TrafficRange {
    pub fn new(entity_id: impl Into<String>, end_of_range: u32) -> Self {
        Self {
            entity_id: entity_id.into(),
            end_of_range,
        }
    }
}

/// Ordered, non-overlapping allocation of `[0, 10000)` to entities.
///
/// A bucket `b` belongs to the first range whose `end_of_range` is greater than `b`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficAllocation {
    ranges: Vec<TrafficRange>,
}

impl TrafficAllocation {
    /// Builds a table, rejecting unsorted or out-of-range ends.
    pub fn new(ranges: Vec<TrafficRange>) -> Result<Self> {
        let mut previous_end = 0u32;
        for (index, range) in ranges.iter().enumerate() {
            if range.end_of_range > MAX_TRAFFIC_VALUE {
                return Err(FlagKitError::config_error(
                    ErrorCode::ConfigInvalidTrafficAllocation,
                    format!(
                        "endOfRange {} exceeds {} at position {}",
                        range.end_of_range, MAX_TRAFFIC_VALUE, index
                    ),
                ));
            }
            if index > 0 && range.end_of_range <= previous_end {
                return Err(FlagKitError::config_error(
                    ErrorCode::ConfigInvalidTrafficAllocation,
                    format!(
                        "endOfRange {} at position {} does not follow {}",
                        range.end_of_range, index, previous_end
                    ),
                ));
            }
            previous_end = range.end_of_range;
        }

        Ok(Self { ranges })
    }

    /// Entity allocated to `bucket`, if any.
    pub fn entity_for(&self, bucket: u32) -> Option<&str> {
        let index = self.ranges.partition_point(|r| r.end_of_range <= bucket);
        self.ranges
            .get(index)
            .map(|r| r.entity_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn ranges(&self) -> &[TrafficRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Non-empty entity ids in table order.
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.ranges
            .iter()
            .map(|r| r.entity_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Number of buckets that map to some entity.
    pub fn allocated_span(&self) -> u32 {
        let mut start = 0;
        let mut span = 0;
        for range in &self.ranges {
            if !range.entity_id.is_empty() {
                span += range.end_of_range - start;
            }
            start = range.end_of_range;
        }
        span
    }
}
