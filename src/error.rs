//! Error types for sample stores, decoding and model discovery.
//!
//! Missing data is never an error: decoders return `Ok(None)` when a field's
//! backing bytes were never populated. The variants here cover device
//! communication failures and configuration mistakes, which callers usually
//! want to tell apart.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type SampleResult<T> = Result<T, SampleError>;

/// Errors raised by stores, pollers and discovery.
#[derive(Debug, Error)]
pub enum SampleError {
    /// Transport failure while talking to the physical device.
    #[error("Communication error: {0}")]
    Communication(#[from] io::Error),

    /// Signal reference that can never be decoded (bad width, wrong locator).
    #[error("Invalid signal: {message}")]
    InvalidSignal { message: String },

    /// CAN frame that violates identifier or payload limits.
    #[error("Invalid frame: {message}")]
    InvalidFrame { message: String },

    /// Address outside any discovered model's range.
    #[error("Address {address} out of bounds: {message}")]
    OutOfBounds { address: u32, message: String },

    /// Device answered with something that is not the expected protocol.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Malformed value or configuration.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

impl SampleError {
    pub(crate) fn invalid_signal(message: impl Into<String>) -> Self {
        Self::InvalidSignal {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    pub(crate) fn out_of_bounds(address: u32, message: impl Into<String>) -> Self {
        Self::OutOfBounds {
            address,
            message: message.into(),
        }
    }

    /// True for device-side failures, false for configuration faults.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication(_) | Self::Protocol { .. })
    }
}
