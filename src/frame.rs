//! CAN identifiers and captured frames.

use std::cmp::Ordering;
use std::fmt;

use ::bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    CAN_FD_DLC_LENGTHS, MAX_CAN_PAYLOAD, MAX_CLASSIC_CAN_PAYLOAD, MAX_EXTENDED_CAN_ID,
    MAX_STANDARD_CAN_ID,
};
use crate::error::{SampleError, SampleResult};

/// CAN identifier, 11-bit standard or 29-bit extended.
///
/// Identifiers order by raw value; a standard id sorts before an extended id
/// with the same raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanId {
    Standard(u16),
    Extended(u32),
}

impl CanId {
    /// Checked 11-bit identifier.
    pub fn standard(id: u16) -> SampleResult<Self> {
        let can_id = CanId::Standard(id);
        can_id.validate()?;
        Ok(can_id)
    }

    /// Checked 29-bit identifier.
    pub fn extended(id: u32) -> SampleResult<Self> {
        let can_id = CanId::Extended(id);
        can_id.validate()?;
        Ok(can_id)
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        match *self {
            CanId::Standard(id) => u32::from(id),
            CanId::Extended(id) => id,
        }
    }

    #[inline]
    pub fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }

    /// Reject identifiers wider than their format allows.
    pub fn validate(&self) -> SampleResult<()> {
        match *self {
            CanId::Standard(id) if id > MAX_STANDARD_CAN_ID => Err(SampleError::invalid_frame(
                format!("standard id 0x{:X} exceeds 11 bits", id),
            )),
            CanId::Extended(id) if id > MAX_EXTENDED_CAN_ID => Err(SampleError::invalid_frame(
                format!("extended id 0x{:X} exceeds 29 bits", id),
            )),
            _ => Ok(()),
        }
    }
}

impl Ord for CanId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw()
            .cmp(&other.raw())
            .then(self.is_extended().cmp(&other.is_extended()))
    }
}

impl PartialOrd for CanId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanId::Standard(id) => write!(f, "0x{:03X}", id),
            CanId::Extended(id) => write!(f, "0x{:08X}x", id),
        }
    }
}

/// DLC code for a payload length, rounding up to the next CAN FD length.
pub fn dlc_for_len(len: usize) -> Option<u8> {
    if len <= MAX_CLASSIC_CAN_PAYLOAD {
        return Some(len as u8);
    }
    CAN_FD_DLC_LENGTHS
        .iter()
        .position(|&fd_len| len <= fd_len)
        .map(|idx| (MAX_CLASSIC_CAN_PAYLOAD + 1 + idx) as u8)
}

/// Payload length for a DLC code (0-15).
pub fn len_for_dlc(dlc: u8) -> Option<usize> {
    let dlc = usize::from(dlc);
    if dlc <= MAX_CLASSIC_CAN_PAYLOAD {
        return Some(dlc);
    }
    CAN_FD_DLC_LENGTHS.get(dlc - MAX_CLASSIC_CAN_PAYLOAD - 1).copied()
}

/// The latest frame received for an identifier.
///
/// Only [`FrameRecord::new`] builds one, so the identifier is in range and
/// `dlc` always matches the payload length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    id: CanId,
    dlc: u8,
    payload: Bytes,
    timestamp: DateTime<Utc>,
}

impl FrameRecord {
    /// Build a frame, validating the identifier and payload size.
    pub fn new(
        id: CanId,
        payload: impl Into<Bytes>,
        timestamp: DateTime<Utc>,
    ) -> SampleResult<Self> {
        id.validate()?;
        let payload = payload.into();
        let dlc = dlc_for_len(payload.len()).ok_or_else(|| {
            SampleError::invalid_frame(format!(
                "payload of {} bytes exceeds {} for id {}",
                payload.len(),
                MAX_CAN_PAYLOAD,
                id
            ))
        })?;
        Ok(Self {
            id,
            dlc,
            payload,
            timestamp,
        })
    }

    #[inline]
    pub fn id(&self) -> CanId {
        self.id
    }

    #[inline]
    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Payload as uppercase hex without separators.
    pub fn hex_payload(&self) -> String {
        self.payload.iter().map(|b| format!("{:02X}", b)).collect()
    }
}
