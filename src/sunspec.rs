//! # SunSpec Model Registry
//!
//! Geometry of the SunSpec information models this crate understands, and
//! the descriptors produced when a device's model chain is discovered.
//!
//! Each model occupies a two-register header (`id`, `length`) followed by
//! `length` body registers. A body is a fixed block, optionally followed by
//! a whole number of equally sized repeating blocks.
//!
//! | Model ids | Kind | Fixed | Repeating |
//! |-----------|------|-------|-----------|
//! | 1 | Common | 66 | - |
//! | 101-103 | Integer inverter | 50 | - |
//! | 111-113 | Float inverter | 60 | - |
//! | 120 / 121 / 122 / 123 | Nameplate / settings / status / controls | 26 / 30 / 44 / 24 | - |
//! | 160 | Multiple MPPT | 8 | 20 |
//! | 201-204 | Integer meter | 105 | - |
//! | 211-214 | Float meter | 124 | - |
//! | 307 | Base meteorological | 11 | - |
//! | 401 / 403 | String combiner | 14 / 16 | 8 |
//! | 402 / 404 | Advanced string combiner | 20 / 25 | 14 (legacy 13) |

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batcher::RegisterRange;
use crate::constants::SUNSPEC_HEADER_LEN;
use crate::error::{SampleError, SampleResult};
use crate::transport::{ReadFunction, SlaveId};

/// Model family, resolved once at discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Common,
    IntegerInverter,
    FloatInverter,
    InverterNameplate,
    InverterSettings,
    InverterStatus,
    InverterControls,
    MultipleMppt,
    IntegerMeter,
    FloatMeter,
    Meteorological,
    StringCombiner,
    /// Id not in the registry; exposed as raw words.
    Unknown,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Common => "common",
            ModelKind::IntegerInverter => "integer inverter",
            ModelKind::FloatInverter => "float inverter",
            ModelKind::InverterNameplate => "inverter nameplate",
            ModelKind::InverterSettings => "inverter settings",
            ModelKind::InverterStatus => "inverter status",
            ModelKind::InverterControls => "inverter controls",
            ModelKind::MultipleMppt => "multiple MPPT",
            ModelKind::IntegerMeter => "integer meter",
            ModelKind::FloatMeter => "float meter",
            ModelKind::Meteorological => "meteorological",
            ModelKind::StringCombiner => "string combiner",
            ModelKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block layout of a known model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelGeometry {
    pub kind: ModelKind,
    pub fixed_block_length: u16,
    #[serde(default)]
    pub repeating_block_length: u16,
    /// Older revision's repeating length, used when the current one does
    /// not divide the repeating section evenly.
    #[serde(default)]
    pub legacy_repeating_block_length: Option<u16>,
}

impl ModelGeometry {
    pub const fn fixed(kind: ModelKind, fixed_block_length: u16) -> Self {
        Self {
            kind,
            fixed_block_length,
            repeating_block_length: 0,
            legacy_repeating_block_length: None,
        }
    }

    pub const fn repeating(kind: ModelKind, fixed_block_length: u16, repeating: u16) -> Self {
        Self {
            kind,
            fixed_block_length,
            repeating_block_length: repeating,
            legacy_repeating_block_length: None,
        }
    }

    pub const fn with_legacy(mut self, legacy: u16) -> Self {
        self.legacy_repeating_block_length = Some(legacy);
        self
    }
}

/// Lookup table from model id to geometry.
///
/// [`ModelRegistry::default`] holds the standard models; vendors' models
/// can be added with [`register`](Self::register).
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<u16, ModelGeometry>,
}

impl ModelRegistry {
    /// Registry with no models; every id describes as [`ModelKind::Unknown`].
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    pub fn register(&mut self, model_id: u16, geometry: ModelGeometry) -> &mut Self {
        self.models.insert(model_id, geometry);
        self
    }

    pub fn geometry(&self, model_id: u16) -> Option<&ModelGeometry> {
        self.models.get(&model_id)
    }

    /// Build the descriptor for a header read at `base_address`.
    pub fn describe(&self, model_id: u16, base_address: u16, model_length: u16) -> ModelDescriptor {
        let Some(geometry) = self.geometry(model_id) else {
            return ModelDescriptor {
                model_id,
                base_address,
                model_length,
                fixed_block_length: model_length,
                repeating_block_length: 0,
                repeating_block_count: 0,
                kind: ModelKind::Unknown,
            };
        };

        let fixed = geometry.fixed_block_length.min(model_length);
        let remaining = model_length - fixed;
        let mut block = geometry.repeating_block_length;
        if block > 0 && remaining % block != 0 {
            if let Some(legacy) = geometry.legacy_repeating_block_length {
                if legacy > 0 && remaining % legacy == 0 {
                    block = legacy;
                }
            }
        }
        let count = if block > 0 { remaining / block } else { 0 };

        ModelDescriptor {
            model_id,
            base_address,
            model_length,
            fixed_block_length: fixed,
            repeating_block_length: block,
            repeating_block_count: count,
            kind: geometry.kind,
        }
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        use ModelKind::*;

        let mut registry = Self::empty();
        registry.register(1, ModelGeometry::fixed(Common, 66));
        for id in 101..=103 {
            registry.register(id, ModelGeometry::fixed(IntegerInverter, 50));
        }
        for id in 111..=113 {
            registry.register(id, ModelGeometry::fixed(FloatInverter, 60));
        }
        registry
            .register(120, ModelGeometry::fixed(InverterNameplate, 26))
            .register(121, ModelGeometry::fixed(InverterSettings, 30))
            .register(122, ModelGeometry::fixed(InverterStatus, 44))
            .register(123, ModelGeometry::fixed(InverterControls, 24))
            .register(160, ModelGeometry::repeating(MultipleMppt, 8, 20));
        for id in 201..=204 {
            registry.register(id, ModelGeometry::fixed(IntegerMeter, 105));
        }
        for id in 211..=214 {
            registry.register(id, ModelGeometry::fixed(FloatMeter, 124));
        }
        registry
            .register(307, ModelGeometry::fixed(Meteorological, 11))
            .register(401, ModelGeometry::repeating(StringCombiner, 14, 8))
            .register(402, ModelGeometry::repeating(StringCombiner, 20, 14).with_legacy(13))
            .register(403, ModelGeometry::repeating(StringCombiner, 16, 8))
            .register(404, ModelGeometry::repeating(StringCombiner, 25, 14).with_legacy(13));
        registry
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// One model found on a device.
///
/// `base_address` is the address of the model's header; the body (fixed
/// block followed by repeating blocks) starts two registers later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub model_id: u16,
    pub base_address: u16,
    pub model_length: u16,
    pub fixed_block_length: u16,
    pub repeating_block_length: u16,
    pub repeating_block_count: u16,
    pub kind: ModelKind,
}

impl ModelDescriptor {
    /// First body register.
    #[inline]
    pub fn block_address(&self) -> u32 {
        u32::from(self.base_address) + u32::from(SUNSPEC_HEADER_LEN)
    }

    /// One past the last body register.
    #[inline]
    pub fn end_address(&self) -> u32 {
        self.block_address() + u32::from(self.model_length)
    }

    /// Whether `address` lies in this model's header or body.
    #[inline]
    pub fn contains(&self, address: u16) -> bool {
        address >= self.base_address && u32::from(address) < self.end_address()
    }

    /// Absolute address of a body offset.
    pub fn address_of(&self, offset: u16) -> SampleResult<u16> {
        if offset >= self.model_length {
            return Err(self.out_of_bounds(
                self.block_address() + u32::from(offset),
                format!("offset {} beyond length {}", offset, self.model_length),
            ));
        }
        let address = self.block_address() + u32::from(offset);
        u16::try_from(address)
            .map_err(|_| self.out_of_bounds(address, "past the register address space".into()))
    }

    /// Absolute address of `offset` within repeating block `index`.
    pub fn repeating_address(&self, index: u16, offset: u16) -> SampleResult<u16> {
        if index >= self.repeating_block_count || offset >= self.repeating_block_length {
            let address = self.block_address()
                + u32::from(self.fixed_block_length)
                + u32::from(index) * u32::from(self.repeating_block_length)
                + u32::from(offset);
            return Err(self.out_of_bounds(
                address,
                format!(
                    "repeating block {} offset {} outside {} x {}",
                    index, offset, self.repeating_block_count, self.repeating_block_length
                ),
            ));
        }
        self.address_of(self.fixed_block_length + index * self.repeating_block_length + offset)
    }

    /// Register range covering the body, for lazy loading.
    pub fn body_range(&self, unit: SlaveId) -> RegisterRange {
        RegisterRange::new(
            unit,
            ReadFunction::Holding,
            self.block_address() as u16,
            self.model_length,
        )
    }

    fn out_of_bounds(&self, address: u32, detail: String) -> SampleError {
        SampleError::out_of_bounds(
            address,
            format!("model {} at {}: {}", self.model_id, self.base_address, detail),
        )
    }
}

/// Result of a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredModels {
    /// Address of the "SunS" marker, if one was found.
    pub marker_address: Option<u16>,
    pub models: Vec<ModelDescriptor>,
}

impl DiscoveredModels {
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelDescriptor> {
        self.models.iter()
    }

    /// First model with the given id.
    pub fn find(&self, model_id: u16) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.model_id == model_id)
    }

    /// First model of the given kind.
    pub fn find_kind(&self, kind: ModelKind) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.kind == kind)
    }

    /// The model whose header or body holds `address`.
    pub fn model_for_address(&self, address: u16) -> SampleResult<&ModelDescriptor> {
        // base addresses increase, so a binary search would do; chains are short
        self.models
            .iter()
            .find(|m| m.contains(address))
            .ok_or_else(|| {
                SampleError::out_of_bounds(u32::from(address), "not inside any discovered model")
            })
    }
}

impl<'a> IntoIterator for &'a DiscoveredModels {
    type Item = &'a ModelDescriptor;
    type IntoIter = std::slice::Iter<'a, ModelDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_is_opaque() {
        let desc = ModelRegistry::default().describe(64_000, 40100, 37);
        assert_eq!(desc.kind, ModelKind::Unknown);
        assert_eq!(desc.fixed_block_length, 37);
        assert_eq!(desc.repeating_block_count, 0);
    }

    #[test]
    fn test_common_model_fixed_clamped_to_length() {
        let desc = ModelRegistry::default().describe(1, 40002, 65);
        assert_eq!(desc.kind, ModelKind::Common);
        assert_eq!(desc.fixed_block_length, 65);
    }

    #[test]
    fn test_mppt_repeating_count() {
        let desc = ModelRegistry::default().describe(160, 40120, 48);
        assert_eq!(desc.fixed_block_length, 8);
        assert_eq!(desc.repeating_block_length, 20);
        assert_eq!(desc.repeating_block_count, 2);
    }

    #[test]
    fn test_string_combiner_legacy_repeating_length() {
        let registry = ModelRegistry::default();
        let current = registry.describe(402, 0, 20 + 14 * 4);
        assert_eq!((current.repeating_block_length, current.repeating_block_count), (14, 4));
        let legacy = registry.describe(402, 0, 20 + 13 * 3);
        assert_eq!((legacy.repeating_block_length, legacy.repeating_block_count), (13, 3));
        let model2 = registry.describe(404, 0, 25 + 14);
        assert_eq!(model2.fixed_block_length, 25);
        assert_eq!(model2.repeating_block_count, 1);
    }

    #[test]
    fn test_address_bounds() {
        let desc = ModelRegistry::default().describe(160, 40120, 48);
        assert_eq!(desc.block_address(), 40122);
        assert_eq!(desc.address_of(0).unwrap(), 40122);
        assert_eq!(desc.address_of(47).unwrap(), 40169);
        assert!(matches!(desc.address_of(48), Err(SampleError::OutOfBounds { address: 40170, .. })));
        assert_eq!(desc.repeating_address(1, 11).unwrap(), 40122 + 8 + 20 + 11);
        assert!(desc.repeating_address(2, 0).is_err());
        assert!(desc.repeating_address(0, 20).is_err());
    }

    #[test]
    fn test_model_for_address() {
        let registry = ModelRegistry::default();
        let models = DiscoveredModels {
            marker_address: Some(40000),
            models: vec![registry.describe(1, 40002, 66), registry.describe(103, 40070, 50)],
        };
        assert_eq!(models.model_for_address(40002).unwrap().model_id, 1);
        assert_eq!(models.model_for_address(40069).unwrap().model_id, 1);
        assert_eq!(models.model_for_address(40121).unwrap().model_id, 103);
        assert!(models.model_for_address(40122).is_err());
        assert!(models.model_for_address(40000).is_err());
        assert_eq!(models.find_kind(ModelKind::IntegerInverter).unwrap().model_id, 103);
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ModelRegistry::empty();
        registry.register(64_110, ModelGeometry::repeating(ModelKind::Unknown, 4, 2));
        let desc = registry.describe(64_110, 0, 10);
        assert_eq!(desc.repeating_block_count, 3);
    }
}
