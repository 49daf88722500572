//! Protocol constants for Modbus registers, CAN frames and SunSpec discovery.
//!
//! Modbus limits are derived from the official specification:
//! - Maximum PDU size: 253 bytes (inherited from RS485 ADU limit of 256 bytes)
//! - Register limits are calculated to fit within the PDU size constraint

// ============================================================================
// Modbus Register Limits
// ============================================================================

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
/// RS485 ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum number of registers for FC03/FC04 (Read Holding/Input Registers)
///
/// Calculation for response PDU:
/// - Function Code: 1 byte
/// - Byte Count: 1 byte
/// - Register Data: N × 2 bytes
/// - Total: 1 + 1 + (N × 2) ≤ 253
/// - Therefore: N ≤ (253 - 2) / 2 = 125.5 → 125 registers
pub const MAX_READ_REGISTERS: usize = 125;

/// Bits in one Modbus register.
pub const REGISTER_BITS: usize = 16;

// ============================================================================
// CAN Frame Limits
// ============================================================================

/// Largest standard (11-bit) identifier.
pub const MAX_STANDARD_CAN_ID: u16 = 0x7FF;

/// Largest extended (29-bit) identifier.
pub const MAX_EXTENDED_CAN_ID: u32 = 0x1FFF_FFFF;

/// Largest CAN FD payload in bytes.
pub const MAX_CAN_PAYLOAD: usize = 64;

/// Largest classic CAN payload in bytes (DLC 0-8 map 1:1 to lengths).
pub const MAX_CLASSIC_CAN_PAYLOAD: usize = 8;

/// CAN FD payload lengths for DLC codes 9 through 15.
pub const CAN_FD_DLC_LENGTHS: [usize; 7] = [12, 16, 20, 24, 32, 48, 64];

/// Widest field the bit decoder can extract.
pub const MAX_SIGNAL_BITS: u8 = 64;

// ============================================================================
// SunSpec
// ============================================================================

/// "SunS" marker as two big-endian registers.
pub const SUNSPEC_MARKER: [u16; 2] = [0x5375, 0x6E53];

/// The marker as ASCII.
pub const SUNSPEC_MARKER_STR: &str = "SunS";

/// Conventional base addresses, scanned in this order.
pub const SUNSPEC_BASE_ADDRESSES: [u16; 3] = [40000, 50000, 0];

/// Model id terminating the model chain.
pub const SUNSPEC_END_MODEL_ID: u16 = 0xFFFF;

/// Registers in a model header: id followed by length.
pub const SUNSPEC_HEADER_LEN: u16 = 2;

/// "Not implemented" value of a SunSpec int16 / sunssf point.
pub const SUNSPEC_NI_INT16: u16 = 0x8000;

/// "Not implemented" value of a SunSpec uint16 / enum16 point.
pub const SUNSPEC_NI_UINT16: u16 = 0xFFFF;

/// "Not implemented" value of a SunSpec acc32 point.
pub const SUNSPEC_NI_ACC32: u32 = 0;

/// "Not implemented" value of a SunSpec uint32 point.
pub const SUNSPEC_NI_UINT32: u32 = 0xFFFF_FFFF;

// ============================================================================
// Cache
// ============================================================================

/// Default sample cache threshold in milliseconds.
pub const DEFAULT_CACHE_MS: u64 = 5_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_limit_fits_pdu() {
        assert!(2 + MAX_READ_REGISTERS * 2 <= MAX_PDU_SIZE);
    }

    #[test]
    fn test_marker_spells_suns() {
        let bytes: Vec<u8> = SUNSPEC_MARKER.iter().flat_map(|w| w.to_be_bytes()).collect();
        assert_eq!(bytes, SUNSPEC_MARKER_STR.as_bytes());
    }

    #[test]
    fn test_fd_table_ends_at_max_payload() {
        assert_eq!(CAN_FD_DLC_LENGTHS[CAN_FD_DLC_LENGTHS.len() - 1], MAX_CAN_PAYLOAD);
    }
}
