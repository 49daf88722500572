//! # SunSpec Model Discovery
//!
//! Finds the "SunS" marker at one of the conventional base addresses, then
//! walks the chain of `(id, length)` model headers until the end marker
//! `0xFFFF`. Only headers are read during discovery; model bodies are loaded
//! on demand with [`ModelDiscovery::read_model`].
//!
//! ```rust
//! use voltage_sample::{ModelDiscovery, RegisterImage, RegisterStore};
//!
//! let mut device = RegisterImage::new()
//!     .with_holding(40000, &[0x5375, 0x6E53])
//!     .with_holding(40002, &[1, 66])
//!     .with_holding(40070, &[0xFFFF, 0]);
//! let store = RegisterStore::new();
//!
//! let models = ModelDiscovery::new(1).discover(&mut device, &store);
//! assert_eq!(models.len(), 1);
//! assert_eq!(models.models[0].base_address, 40002);
//! ```

use tracing::{debug, info, warn};

use crate::constants::{
    SUNSPEC_BASE_ADDRESSES, SUNSPEC_END_MODEL_ID, SUNSPEC_HEADER_LEN, SUNSPEC_MARKER,
};
use crate::device_limits::DeviceLimits;
use crate::error::{SampleError, SampleResult};
use crate::register_store::RegisterStore;
use crate::sunspec::{DiscoveredModels, ModelDescriptor, ModelRegistry};
use crate::transport::{read_chunked, ReadFunction, RegisterTransport, SlaveId};

/// Registers per request used for SunSpec body reads unless configured.
pub const DEFAULT_SUNSPEC_READ_REGISTERS: u16 = 100;

const ADDRESS_SPACE: u32 = u16::MAX as u32 + 1;

/// Discovery configuration for one device.
#[derive(Debug, Clone)]
pub struct ModelDiscovery {
    unit: SlaveId,
    base_addresses: Vec<u16>,
    registry: ModelRegistry,
    limits: DeviceLimits,
}

impl ModelDiscovery {
    pub fn new(unit: SlaveId) -> Self {
        Self {
            unit,
            base_addresses: SUNSPEC_BASE_ADDRESSES.to_vec(),
            registry: ModelRegistry::default(),
            limits: DeviceLimits::new().with_max_read_registers(DEFAULT_SUNSPEC_READ_REGISTERS),
        }
    }

    /// Candidate marker addresses, scanned in order.
    pub fn with_base_addresses(mut self, addresses: impl Into<Vec<u16>>) -> Self {
        self.base_addresses = addresses.into();
        self
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn unit(&self) -> SlaveId {
        self.unit
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// Scan the base addresses and walk the first marked chain.
    ///
    /// A device without a marker at any candidate yields no models; read
    /// failures while probing are logged and treated as "no marker here".
    pub fn discover<T: RegisterTransport + ?Sized>(
        &self,
        device: &mut T,
        store: &RegisterStore,
    ) -> DiscoveredModels {
        for &base in &self.base_addresses {
            match self.scan_marker(device, store, base) {
                Ok(true) => return self.walk(device, store, base),
                Ok(false) => debug!("SunSpec marker not found at {}", base),
                Err(e) => warn!("Error looking for SunSpec marker at {}: {}", base, e),
            }
        }
        info!("No SunSpec marker at any of {:?}", self.base_addresses);
        DiscoveredModels::default()
    }

    /// Walk the chain at an explicit marker address.
    ///
    /// Unlike [`discover`](Self::discover), a missing marker is an error:
    /// `Protocol` for a mismatch, `Communication` for a failed read.
    pub fn discover_at<T: RegisterTransport + ?Sized>(
        &self,
        device: &mut T,
        store: &RegisterStore,
        base: u16,
    ) -> SampleResult<DiscoveredModels> {
        if !self.scan_marker(device, store, base)? {
            return Err(SampleError::Protocol {
                message: format!("SunSpec marker 'SunS' not found at base address {}", base),
            });
        }
        Ok(self.walk(device, store, base))
    }

    /// Load one model's body into the store. All chunks are read before
    /// anything is stored, so a failed read leaves the store untouched.
    pub fn read_model<T: RegisterTransport + ?Sized>(
        &self,
        device: &mut T,
        store: &RegisterStore,
        model: &ModelDescriptor,
    ) -> SampleResult<()> {
        let range = model.body_range(self.unit);
        let words = read_chunked(
            device,
            self.unit,
            ReadFunction::Holding,
            range.address,
            u32::from(range.count),
            &self.limits,
        )?;
        debug!(
            "Loaded model {} ({}) body: {} registers at {}",
            model.model_id, model.kind, range.count, range.address
        );
        store.update(|m| {
            m.save_words(range.address, &words);
            Ok(true)
        })?;
        Ok(())
    }

    /// Load every discovered model's body, stopping at the first failure.
    pub fn read_models<T: RegisterTransport + ?Sized>(
        &self,
        device: &mut T,
        store: &RegisterStore,
        models: &DiscoveredModels,
    ) -> SampleResult<()> {
        for model in models {
            self.read_model(device, store, model)?;
        }
        Ok(())
    }

    fn scan_marker<T: RegisterTransport + ?Sized>(
        &self,
        device: &mut T,
        store: &RegisterStore,
        base: u16,
    ) -> SampleResult<bool> {
        let words = device.read_registers(self.unit, ReadFunction::Holding, base, 2)?;
        if words.as_slice() != SUNSPEC_MARKER {
            debug!("Found {:04X?} instead of SunSpec marker at {}", words, base);
            return Ok(false);
        }
        store.update(|m| Ok(m.save_words(base, &words)))?;
        Ok(true)
    }

    fn walk<T: RegisterTransport + ?Sized>(
        &self,
        device: &mut T,
        store: &RegisterStore,
        marker: u16,
    ) -> DiscoveredModels {
        let header_len = u32::from(SUNSPEC_HEADER_LEN);
        let mut found = DiscoveredModels {
            marker_address: Some(marker),
            models: Vec::new(),
        };
        let mut cursor = u32::from(marker) + header_len;

        loop {
            if cursor + header_len > ADDRESS_SPACE {
                warn!("SunSpec model chain runs past the address space at {}", cursor);
                break;
            }
            let address = cursor as u16;
            let header = match device.read_registers(self.unit, ReadFunction::Holding, address, 2) {
                Ok(words) if words.len() == 2 => words,
                Ok(words) => {
                    warn!("Short SunSpec header at {}: {:04X?}", address, words);
                    break;
                }
                Err(e) => {
                    warn!("Error reading SunSpec header at {}: {}", address, e);
                    break;
                }
            };
            if let Err(e) = store.update(|m| Ok(m.save_words(address, &header))) {
                warn!("Unable to store SunSpec header at {}: {}", address, e);
            }

            let (model_id, model_length) = (header[0], header[1]);
            if model_id == SUNSPEC_END_MODEL_ID {
                debug!("SunSpec end marker at {}", address);
                break;
            }

            let model = self.registry.describe(model_id, address, model_length);
            if model.end_address() > ADDRESS_SPACE {
                warn!(
                    "SunSpec model {} at {} with length {} runs past the address space",
                    model_id, address, model_length
                );
                break;
            }
            debug!(
                "Found SunSpec model {} ({}) at {}, length {}",
                model_id, model.kind, address, model_length
            );
            found.models.push(model);
            cursor = model.end_address();
        }

        info!(
            "Discovered {} SunSpec models at base {}",
            found.models.len(),
            marker
        );
        found
    }
}
