//! # Device Read Limits
//!
//! Per-device limits applied when turning register ranges into physical read
//! requests.
//!
//! - **Read Holding/Input Registers (FC03/04)**: max 125 registers per request
//!   by protocol; many inverters and meters accept fewer.
//! - Small unmapped gaps between wanted ranges can be read through to save a
//!   round trip, but some devices reject reads touching unmapped registers, so
//!   bridging is off by default.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_READ_REGISTERS;

/// Default maximum registers per read operation.
pub const DEFAULT_MAX_READ_REGISTERS: u16 = MAX_READ_REGISTERS as u16;

/// Default inter-request delay in milliseconds.
pub const DEFAULT_INTER_REQUEST_DELAY_MS: u64 = 0;

/// Device-specific read limits.
///
/// # Example
///
/// ```rust
/// use voltage_sample::DeviceLimits;
///
/// // Device that only supports 64 registers per read (SunSpec chunking)
/// let limits = DeviceLimits::new()
///     .with_max_read_registers(64)
///     .with_inter_request_delay_ms(10);
///
/// assert_eq!(limits.chunks(40000, 150), vec![(40000, 64), (40064, 64), (40128, 22)]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLimits {
    /// Maximum registers per read request.
    pub max_read_registers: u16,
    /// Largest unmapped gap (in registers) a coalesced read may span.
    pub max_gap: u16,
    /// Minimum delay between requests (milliseconds).
    pub inter_request_delay_ms: u64,
}

impl DeviceLimits {
    /// Create new device limits with protocol maximum values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits for older or slower devices: 50 registers per read, 10ms delay.
    pub fn conservative() -> Self {
        Self {
            max_read_registers: 50,
            max_gap: 0,
            inter_request_delay_ms: 10,
        }
    }

    /// Set maximum read registers. Zero is treated as one.
    pub fn with_max_read_registers(mut self, count: u16) -> Self {
        self.max_read_registers = count.max(1);
        self
    }

    pub fn with_max_gap(mut self, gap: u16) -> Self {
        self.max_gap = gap;
        self
    }

    /// Set inter-request delay in milliseconds.
    pub fn with_inter_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inter_request_delay_ms = delay_ms;
        self
    }

    #[inline]
    fn per_read(&self) -> u32 {
        u32::from(self.max_read_registers.max(1))
    }

    /// Number of read requests needed for a given register count.
    pub fn read_request_count(&self, total_registers: u32) -> u32 {
        total_registers.div_ceil(self.per_read())
    }

    /// Check if a read request is within limits.
    pub fn is_read_within_limits(&self, register_count: u16) -> bool {
        u32::from(register_count) <= self.per_read()
    }

    /// Split `count` registers starting at `address` into `(address, count)`
    /// requests no larger than the read limit. Stops at the end of the
    /// 16-bit address space.
    pub fn chunks(&self, address: u16, count: u32) -> Vec<(u16, u16)> {
        let end = (u32::from(address) + count).min(u32::from(u16::MAX) + 1);
        let mut out = Vec::with_capacity(self.read_request_count(count) as usize);
        let mut cursor = u32::from(address);
        while cursor < end {
            let len = (end - cursor).min(self.per_read());
            out.push((cursor as u16, len as u16));
            cursor += len;
        }
        out
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_read_registers: DEFAULT_MAX_READ_REGISTERS,
            max_gap: 0,
            inter_request_delay_ms: DEFAULT_INTER_REQUEST_DELAY_MS,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = DeviceLimits::default();
        assert_eq!(limits.max_read_registers, 125);
        assert_eq!(limits.max_gap, 0);
        assert_eq!(limits.inter_request_delay_ms, DEFAULT_INTER_REQUEST_DELAY_MS);
    }

    #[test]
    fn test_builder_pattern() {
        let limits = DeviceLimits::new()
            .with_max_read_registers(60)
            .with_max_gap(4)
            .with_inter_request_delay_ms(5);

        assert_eq!(limits.max_read_registers, 60);
        assert_eq!(limits.max_gap, 4);
        assert_eq!(limits.inter_request_delay_ms, 5);
        assert_eq!(DeviceLimits::new().with_max_read_registers(0).max_read_registers, 1);
    }

    #[test]
    fn test_read_request_count() {
        let limits = DeviceLimits::new().with_max_read_registers(50);

        assert_eq!(limits.read_request_count(0), 0);
        assert_eq!(limits.read_request_count(50), 1);
        assert_eq!(limits.read_request_count(51), 2);
        assert_eq!(limits.read_request_count(101), 3);
        assert!(limits.is_read_within_limits(50));
        assert!(!limits.is_read_within_limits(51));
    }

    #[test]
    fn test_chunks_cover_range() {
        let limits = DeviceLimits::new().with_max_read_registers(64);
        assert!(limits.chunks(0, 0).is_empty());
        assert_eq!(limits.chunks(10, 64), vec![(10, 64)]);
        assert_eq!(limits.chunks(10, 65), vec![(10, 64), (74, 1)]);
    }

    #[test]
    fn test_chunks_stop_at_address_space_end() {
        let limits = DeviceLimits::new();
        assert_eq!(limits.chunks(0xFFF0, 100), vec![(0xFFF0, 16)]);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let limits: DeviceLimits = serde_json::from_str(r#"{"max_read_registers": 32}"#).unwrap();
        assert_eq!(limits.max_read_registers, 32);
        assert_eq!(limits.max_gap, 0);
    }
}
