//! # Voltage Sample - Sample Store and Decoder for Industrial Devices
//!
//! In-memory sample stores and a bit-exact decoding engine for devices read
//! over Modbus registers or CAN frames, with SunSpec model discovery on top.
//!
//! ## Features
//!
//! - **Copy-then-swap stores**: readers take lock-free snapshots while a
//!   single writer applies all-or-nothing update transactions
//! - **Bit-exact decoding**: fields of 1..=64 bits at any bit offset, in
//!   big-endian, little-endian or word-swapped order, signed or unsigned
//! - **CAN frames**: latest frame per 11/29-bit identifier, CAN FD payloads
//! - **SunSpec**: marker scan, model chain walk, lazy body loads and typed
//!   accessors with scale factors
//! - **Staleness**: per-store and per-field-group cache windows
//! - **Polling**: batched reads under a device lock, per-range poll status
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use voltage_sample::{
//!     ByteOrder, RegisterImage, RegisterPoller, RegisterRange, RegisterStore, SignalReference,
//!     SampleValue,
//! };
//!
//! // A device answering holding-register reads
//! let device = RegisterImage::new().with_holding(40100, &[0x3215, 0xDC1A]);
//! let store = Arc::new(RegisterStore::new());
//! let poller = RegisterPoller::new(device, Arc::clone(&store));
//!
//! poller.refresh(&[RegisterRange::holding(1, 40100, 2)]).unwrap();
//!
//! // 32-bit field, high word first
//! let signal = SignalReference::register(40100, 32).unwrap();
//! assert_eq!(store.decode(&signal).unwrap(), Some(SampleValue::U64(0x3215_DC1A)));
//!
//! // The same words on a word-swapped device
//! let swapped = signal.with_byte_order(ByteOrder::BigEndianSwap);
//! assert_eq!(store.decode(&swapped).unwrap(), Some(SampleValue::U64(0xDC1A_3215)));
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus, CAN and SunSpec constants
pub mod constants;

/// Typed sample values and data type names
pub mod value;

/// Byte order handling for multi-register data types
pub mod bytes;

/// Encoding and decoding of register values with byte order support
pub mod codec;

/// Bit-field extraction and insertion over byte buffers
pub mod bitfield;

/// Register and frame locators for decodable fields
pub mod signal;

/// CAN identifiers and received frames
pub mod frame;

// ============================================================================
// Stores and staleness
// ============================================================================

/// Time sources for update timestamps
pub mod clock;

/// Cache windows and per-group update tracking
pub mod cache;

/// Concurrent register store
pub mod register_store;

/// Concurrent CAN frame store
pub mod frame_store;

// ============================================================================
// Device access
// ============================================================================

/// Device transport traits and in-memory devices
pub mod transport;

/// Device-specific read limits
pub mod device_limits;

/// Read request batching
pub mod batcher;

/// Register and frame pollers
pub mod poller;

// ============================================================================
// SunSpec
// ============================================================================

/// SunSpec model registry and descriptors
pub mod sunspec;

/// SunSpec model discovery
pub mod discovery;

/// Typed SunSpec model accessors
pub mod accessor;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Error handling ===
pub use error::{SampleError, SampleResult};

// === Core types ===
pub use bitfield::BitOrigin;
pub use crate::bytes::{registers_to_bytes, ByteOrder};
pub use codec::{decode_registers, encode_value};
pub use frame::{CanId, FrameRecord};
pub use signal::{Locator, SignalReference};
pub use value::{DataType, SampleValue};

// === Stores ===
pub use cache::{CacheGroups, CachePolicy, FieldGroup};
pub use clock::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use frame_store::{FrameSnapshot, FrameStore, MutableFrames};
pub use register_store::{MutableRegisters, RegisterSnapshot, RegisterStore};

// === Device access ===
pub use batcher::{ReadBatcher, RegisterRange};
pub use device_limits::DeviceLimits;
pub use poller::{FrameCollector, PollStatus, RangeStatus, RegisterPoller};
pub use transport::{
    FrameReplay, FrameSource, ReadFunction, RegisterImage, RegisterTransport, SlaveId,
};

// === SunSpec ===
pub use accessor::{
    CommonModel, GenericModel, InverterModel, InverterState, MeterModel, ModelAccessor, MpptModel,
};
pub use discovery::ModelDiscovery;
pub use sunspec::{DiscoveredModels, ModelDescriptor, ModelGeometry, ModelKind, ModelRegistry};

// === Limits (commonly needed constants) ===
pub use constants::{DEFAULT_CACHE_MS, MAX_CAN_PAYLOAD, MAX_READ_REGISTERS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Voltage Sample v{} - sample store and decoder", VERSION)
}
