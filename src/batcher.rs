//! # Read Batching
//!
//! Collects the register ranges callers want refreshed and turns them into
//! the fewest physical read requests the device allows.
//!
//! ## How It Works
//!
//! Ranges are grouped by `(unit, function)`. Within a group they are sorted by
//! address; overlapping or touching ranges (or ranges separated by at most
//! [`DeviceLimits::max_gap`] registers) are merged, and the merged spans are
//! split again at [`DeviceLimits::max_read_registers`].
//!
//! ## Example
//!
//! ```rust
//! use voltage_sample::{DeviceLimits, ReadBatcher, ReadFunction, RegisterRange};
//!
//! let mut batcher = ReadBatcher::new();
//! batcher.add(RegisterRange::holding(1, 40070, 10));
//! batcher.add(RegisterRange::holding(1, 40080, 5));
//! batcher.add(RegisterRange::holding(1, 40002, 66));
//!
//! let requests = batcher.take_requests(&DeviceLimits::new().with_max_gap(2));
//! assert_eq!(requests, vec![RegisterRange::holding(1, 40002, 83)]);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device_limits::DeviceLimits;
use crate::transport::{ReadFunction, SlaveId};

/// A contiguous block of registers on one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterRange {
    #[serde(default = "default_unit")]
    pub unit: SlaveId,
    #[serde(default)]
    pub function: ReadFunction,
    pub address: u16,
    pub count: u16,
}

fn default_unit() -> SlaveId {
    1
}

impl RegisterRange {
    pub fn new(unit: SlaveId, function: ReadFunction, address: u16, count: u16) -> Self {
        Self {
            unit,
            function,
            address,
            count,
        }
    }

    /// Holding-register range, the common case.
    pub fn holding(unit: SlaveId, address: u16, count: u16) -> Self {
        Self::new(unit, ReadFunction::Holding, address, count)
    }

    /// One past the last address, widened so it cannot overflow.
    #[inline]
    pub fn end(&self) -> u32 {
        u32::from(self.address) + u32::from(self.count)
    }

    #[inline]
    pub fn contains(&self, address: u16) -> bool {
        address >= self.address && u32::from(address) < self.end()
    }

    /// Key identifying this range in poll status tables.
    #[inline]
    pub fn key(&self) -> (SlaveId, u16) {
        (self.unit, self.address)
    }
}

/// Coalesces wanted ranges into read requests.
#[derive(Debug, Default)]
pub struct ReadBatcher {
    pending: BTreeMap<(SlaveId, ReadFunction), Vec<RegisterRange>>,
    total_pending: usize,
}

impl ReadBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a range. Empty ranges are ignored.
    pub fn add(&mut self, range: RegisterRange) {
        if range.count == 0 {
            return;
        }
        self.pending
            .entry((range.unit, range.function))
            .or_default()
            .push(range);
        self.total_pending += 1;
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.total_pending
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_pending == 0
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.total_pending = 0;
    }

    /// Drain the queue into read requests ordered by unit, function and address.
    pub fn take_requests(&mut self, limits: &DeviceLimits) -> Vec<RegisterRange> {
        self.total_pending = 0;
        let pending = std::mem::take(&mut self.pending);
        let mut requests = Vec::new();
        for ((unit, function), ranges) in pending {
            for (start, end) in merge_spans(ranges, limits.max_gap) {
                let count = end - u32::from(start);
                requests.extend(
                    limits
                        .chunks(start, count)
                        .into_iter()
                        .map(|(address, count)| RegisterRange::new(unit, function, address, count)),
                );
            }
        }
        requests
    }

    /// Plan requests for a set of ranges without keeping a queue.
    pub fn plan(
        ranges: impl IntoIterator<Item = RegisterRange>,
        limits: &DeviceLimits,
    ) -> Vec<RegisterRange> {
        let mut batcher = Self::new();
        for range in ranges {
            batcher.add(range);
        }
        batcher.take_requests(limits)
    }
}

fn merge_spans(mut ranges: Vec<RegisterRange>, max_gap: u16) -> Vec<(u16, u32)> {
    ranges.sort_by_key(|r| r.address);
    let mut spans: Vec<(u16, u32)> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match spans.last_mut() {
            Some((_, end)) if u32::from(range.address) <= *end + u32::from(max_gap) => {
                *end = (*end).max(range.end());
            }
            _ => spans.push((range.address, range.end())),
        }
    }
    spans
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_batcher() {
        let batcher = ReadBatcher::new();
        assert_eq!(batcher.pending_count(), 0);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_empty_range_ignored() {
        let mut batcher = ReadBatcher::new();
        batcher.add(RegisterRange::holding(1, 100, 0));
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_pending_count_resets_after_take() {
        let mut batcher = ReadBatcher::new();
        batcher.add(RegisterRange::holding(1, 100, 2));
        batcher.add(RegisterRange::holding(1, 200, 2));
        assert_eq!(batcher.pending_count(), 2);

        let requests = batcher.take_requests(&DeviceLimits::new());
        assert_eq!(requests.len(), 2);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_overlapping_and_touching_ranges_merge() {
        let requests = ReadBatcher::plan(
            [
                RegisterRange::holding(1, 10, 5),
                RegisterRange::holding(1, 12, 10),
                RegisterRange::holding(1, 22, 3),
            ],
            &DeviceLimits::new(),
        );
        assert_eq!(requests, vec![RegisterRange::holding(1, 10, 15)]);
    }

    #[test]
    fn test_gap_only_bridged_within_limit() {
        let ranges = [RegisterRange::holding(1, 0, 2), RegisterRange::holding(1, 5, 2)];
        assert_eq!(ReadBatcher::plan(ranges, &DeviceLimits::new()).len(), 2);
        assert_eq!(
            ReadBatcher::plan(ranges, &DeviceLimits::new().with_max_gap(3)),
            vec![RegisterRange::holding(1, 0, 7)]
        );
    }

    #[test]
    fn test_groups_by_unit_and_function() {
        let requests = ReadBatcher::plan(
            [
                RegisterRange::holding(2, 0, 1),
                RegisterRange::new(1, ReadFunction::Input, 0, 1),
                RegisterRange::holding(1, 1, 1),
                RegisterRange::holding(1, 0, 1),
            ],
            &DeviceLimits::new(),
        );
        assert_eq!(
            requests,
            vec![
                RegisterRange::holding(1, 0, 2),
                RegisterRange::new(1, ReadFunction::Input, 0, 1),
                RegisterRange::holding(2, 0, 1),
            ]
        );
    }

    #[test]
    fn test_merged_span_split_at_read_limit() {
        let requests = ReadBatcher::plan(
            [RegisterRange::holding(1, 40000, 100), RegisterRange::holding(1, 40100, 50)],
            &DeviceLimits::new().with_max_read_registers(64),
        );
        assert_eq!(
            requests,
            vec![
                RegisterRange::holding(1, 40000, 64),
                RegisterRange::holding(1, 40064, 64),
                RegisterRange::holding(1, 40128, 22),
            ]
        );
    }

    #[test]
    fn test_range_contains_and_end() {
        let range = RegisterRange::holding(1, 0xFFFE, 2);
        assert_eq!(range.end(), 0x1_0000);
        assert!(range.contains(0xFFFF));
        assert!(!range.contains(0xFFFD));
    }

    #[test]
    fn test_deserialize_defaults() {
        let range: RegisterRange =
            serde_json::from_str(r#"{"address": 40000, "count": 4}"#).unwrap();
        assert_eq!(range, RegisterRange::holding(1, 40000, 4));
    }
}
