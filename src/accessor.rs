//! # SunSpec Model Accessors
//!
//! Typed, read-only views over a discovered model's registers in a
//! [`RegisterSnapshot`]. Values are returned already scaled by their
//! SunSpec scale factor (`value * 10^sf`).
//!
//! Return conventions:
//! - `Ok(None)`: the register was never read, holds the "not implemented"
//!   sentinel, or its scale factor is unavailable.
//! - `Err(OutOfBounds)`: the point lies outside the model as the device
//!   reported it (a short model, or a repeating block that does not exist).

use crate::bytes::ByteOrder;
use crate::codec::decode_ascii;
use crate::constants::{SUNSPEC_NI_ACC32, SUNSPEC_NI_INT16, SUNSPEC_NI_UINT16, SUNSPEC_NI_UINT32};
use crate::error::{SampleError, SampleResult};
use crate::register_store::RegisterSnapshot;
use crate::sunspec::{ModelDescriptor, ModelKind};
use crate::value::{DataType, SampleValue};

/// Typed view of one model, chosen by [`ModelKind`].
#[derive(Debug, Clone, Copy)]
pub enum ModelAccessor<'a> {
    Common(CommonModel<'a>),
    Inverter(InverterModel<'a>),
    Meter(MeterModel<'a>),
    Mppt(MpptModel<'a>),
    /// Every other model, known or not.
    Generic(GenericModel<'a>),
}

impl<'a> ModelAccessor<'a> {
    pub fn descriptor(&self) -> &'a ModelDescriptor {
        self.generic().descriptor()
    }

    /// Raw-word view, available for every model kind.
    pub fn generic(&self) -> GenericModel<'a> {
        let view = match self {
            ModelAccessor::Common(m) => m.view,
            ModelAccessor::Inverter(m) => m.view,
            ModelAccessor::Meter(m) => m.view,
            ModelAccessor::Mppt(m) => m.view,
            ModelAccessor::Generic(m) => m.view,
        };
        GenericModel { view }
    }
}

impl ModelDescriptor {
    /// Typed view of this model over `snapshot`.
    ///
    /// ```rust
    /// use voltage_sample::{ModelAccessor, ModelRegistry, RegisterStore};
    ///
    /// let store = RegisterStore::new();
    /// let common = ModelRegistry::default().describe(1, 40002, 66);
    /// let snapshot = store.snapshot();
    /// assert!(matches!(common.accessor(&snapshot), ModelAccessor::Common(_)));
    /// ```
    pub fn accessor<'a>(&'a self, snapshot: &'a RegisterSnapshot) -> ModelAccessor<'a> {
        let view = ModelView {
            model: self,
            snapshot,
        };
        match self.kind {
            ModelKind::Common => ModelAccessor::Common(CommonModel { view }),
            ModelKind::IntegerInverter => ModelAccessor::Inverter(InverterModel { view }),
            ModelKind::IntegerMeter => ModelAccessor::Meter(MeterModel { view }),
            ModelKind::MultipleMppt => ModelAccessor::Mppt(MpptModel { view }),
            _ => ModelAccessor::Generic(GenericModel { view }),
        }
    }
}

// ============================================================================
// Point readers
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct ModelView<'a> {
    model: &'a ModelDescriptor,
    snapshot: &'a RegisterSnapshot,
}

impl ModelView<'_> {
    /// Address of `offset`, checking that `count` words from there stay
    /// inside the model body.
    fn span(&self, offset: u16, count: u16) -> SampleResult<u16> {
        let address = self.model.address_of(offset)?;
        if count > 1 {
            let last = offset.checked_add(count - 1).ok_or_else(|| {
                SampleError::out_of_bounds(
                    u32::from(address) + u32::from(count) - 1,
                    format!("{} words at offset {} overflow the model", count, offset),
                )
            })?;
            self.model.address_of(last)?;
        }
        Ok(address)
    }

    fn words(&self, offset: u16, count: u16) -> SampleResult<Option<Vec<u16>>> {
        let address = self.span(offset, count)?;
        Ok(self.snapshot.words(address, usize::from(count)))
    }

    fn word(&self, offset: u16) -> SampleResult<Option<u16>> {
        let address = self.model.address_of(offset)?;
        Ok(self.snapshot.word(address))
    }

    fn uint16(&self, offset: u16) -> SampleResult<Option<u16>> {
        Ok(self.word(offset)?.filter(|w| *w != SUNSPEC_NI_UINT16))
    }

    fn int16(&self, offset: u16) -> SampleResult<Option<i16>> {
        Ok(self
            .word(offset)?
            .filter(|w| *w != SUNSPEC_NI_INT16)
            .map(|w| w as i16))
    }

    fn raw_u32(&self, offset: u16) -> SampleResult<Option<u32>> {
        Ok(self
            .words(offset, 2)?
            .map(|w| (u32::from(w[0]) << 16) | u32::from(w[1])))
    }

    fn acc32(&self, offset: u16) -> SampleResult<Option<u32>> {
        Ok(self.raw_u32(offset)?.filter(|v| *v != SUNSPEC_NI_ACC32))
    }

    fn uint32(&self, offset: u16) -> SampleResult<Option<u32>> {
        Ok(self.raw_u32(offset)?.filter(|v| *v != SUNSPEC_NI_UINT32))
    }

    fn string(&self, offset: u16, count: u16) -> SampleResult<Option<String>> {
        Ok(self.words(offset, count)?.map(|w| decode_ascii(&w)))
    }

    fn scale(value: Option<f64>, sf: Option<i16>) -> Option<f64> {
        match (value, sf) {
            (Some(v), Some(sf)) => Some(v * 10f64.powi(i32::from(sf))),
            _ => None,
        }
    }

    fn scaled_u16(&self, offset: u16, sf: u16) -> SampleResult<Option<f64>> {
        let value = self.uint16(offset)?.map(f64::from);
        Ok(Self::scale(value, self.int16(sf)?))
    }

    fn scaled_i16(&self, offset: u16, sf: u16) -> SampleResult<Option<f64>> {
        let value = self.int16(offset)?.map(f64::from);
        Ok(Self::scale(value, self.int16(sf)?))
    }

    fn scaled_acc32(&self, offset: u16, sf: u16) -> SampleResult<Option<f64>> {
        let value = self.acc32(offset)?.map(f64::from);
        Ok(Self::scale(value, self.int16(sf)?))
    }

    /// Mean of the scaled values present.
    fn average(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
        let (sum, n) = values
            .into_iter()
            .flatten()
            .fold((0.0, 0u32), |(sum, n), v| (sum + v, n + 1));
        (n > 0).then(|| sum / f64::from(n))
    }

    /// Power factors reported as whole percent are brought back to -1..=1.
    fn power_factor(pf: Option<f64>) -> Option<f64> {
        pf.map(|pf| if pf.abs() > 1.0 { pf / 100.0 } else { pf })
    }
}

// ============================================================================
// Common (1)
// ============================================================================

/// Model 1: device identification.
#[derive(Debug, Clone, Copy)]
pub struct CommonModel<'a> {
    view: ModelView<'a>,
}

impl CommonModel<'_> {
    pub fn manufacturer(&self) -> SampleResult<Option<String>> {
        self.view.string(0, 16)
    }

    pub fn model(&self) -> SampleResult<Option<String>> {
        self.view.string(16, 16)
    }

    pub fn options(&self) -> SampleResult<Option<String>> {
        self.view.string(32, 8)
    }

    pub fn version(&self) -> SampleResult<Option<String>> {
        self.view.string(40, 8)
    }

    pub fn serial_number(&self) -> SampleResult<Option<String>> {
        self.view.string(48, 16)
    }

    /// Modbus device address the device reports for itself.
    pub fn device_address(&self) -> SampleResult<Option<u16>> {
        self.view.uint16(64)
    }
}

// ============================================================================
// Integer inverter (101-103)
// ============================================================================

/// Inverter operating state (`St`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverterState {
    Off,
    Sleeping,
    Starting,
    Mppt,
    Throttled,
    ShuttingDown,
    Fault,
    Standby,
    Other(u16),
}

impl From<u16> for InverterState {
    fn from(code: u16) -> Self {
        match code {
            1 => InverterState::Off,
            2 => InverterState::Sleeping,
            3 => InverterState::Starting,
            4 => InverterState::Mppt,
            5 => InverterState::Throttled,
            6 => InverterState::ShuttingDown,
            7 => InverterState::Fault,
            8 => InverterState::Standby,
            other => InverterState::Other(other),
        }
    }
}

/// Models 101 (single phase), 102 (split phase), 103 (three phase).
#[derive(Debug, Clone, Copy)]
pub struct InverterModel<'a> {
    view: ModelView<'a>,
}

impl InverterModel<'_> {
    /// Phases with a phase-to-neutral voltage for this model id.
    pub fn phase_count(&self) -> u16 {
        match self.view.model.model_id {
            101 => 1,
            102 => 2,
            _ => 3,
        }
    }

    /// AC current, amps.
    pub fn current(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_u16(0, 4)
    }

    /// Phase current for phase 0..=2, amps.
    pub fn phase_current(&self, phase: u16) -> SampleResult<Option<f64>> {
        self.view.scaled_u16(1 + phase.min(2), 4)
    }

    /// Average phase-to-neutral voltage over the model's phases, volts.
    pub fn voltage(&self) -> SampleResult<Option<f64>> {
        let mut values = Vec::with_capacity(3);
        for phase in 0..self.phase_count() {
            values.push(self.view.scaled_u16(8 + phase, 11)?);
        }
        Ok(ModelView::average(values))
    }

    /// Average phase-to-phase voltage, volts.
    pub fn line_voltage(&self) -> SampleResult<Option<f64>> {
        let mut values = Vec::with_capacity(3);
        for phase in 0..self.phase_count() {
            values.push(self.view.scaled_u16(5 + phase, 11)?);
        }
        Ok(ModelView::average(values))
    }

    /// AC power, watts.
    pub fn active_power(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(12, 13)
    }

    /// Line frequency, hertz.
    pub fn frequency(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_u16(14, 15)
    }

    pub fn apparent_power(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(16, 17)
    }

    pub fn reactive_power(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(18, 19)
    }

    /// Power factor in -1..=1.
    pub fn power_factor(&self) -> SampleResult<Option<f64>> {
        Ok(ModelView::power_factor(self.view.scaled_i16(20, 21)?))
    }

    /// Lifetime AC energy, watt-hours.
    pub fn lifetime_energy(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_acc32(22, 24)
    }

    pub fn dc_current(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_u16(25, 26)
    }

    pub fn dc_voltage(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_u16(27, 28)
    }

    pub fn dc_power(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(29, 30)
    }

    /// Cabinet temperature, degrees Celsius.
    pub fn cabinet_temperature(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(31, 35)
    }

    pub fn state(&self) -> SampleResult<Option<InverterState>> {
        Ok(self.view.uint16(36)?.map(InverterState::from))
    }

    pub fn vendor_state(&self) -> SampleResult<Option<u16>> {
        self.view.uint16(37)
    }

    /// Event bitfield (`Evt1`).
    pub fn events(&self) -> SampleResult<Option<u32>> {
        self.view.uint32(38)
    }
}

// ============================================================================
// Integer meter (201-204)
// ============================================================================

/// Models 201-204: single phase, split phase, wye and delta meters.
#[derive(Debug, Clone, Copy)]
pub struct MeterModel<'a> {
    view: ModelView<'a>,
}

impl MeterModel<'_> {
    /// Total current, amps.
    pub fn current(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(0, 4)
    }

    pub fn phase_current(&self, phase: u16) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(1 + phase.min(2), 4)
    }

    /// Line-to-neutral average voltage, volts.
    pub fn voltage(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(5, 13)
    }

    pub fn phase_voltage(&self, phase: u16) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(6 + phase.min(2), 13)
    }

    /// Line-to-line average voltage, volts.
    pub fn line_voltage(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(9, 13)
    }

    pub fn frequency(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(14, 15)
    }

    /// Total real power, watts. Negative while exporting.
    pub fn active_power(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(16, 20)
    }

    pub fn phase_power(&self, phase: u16) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(17 + phase.min(2), 20)
    }

    pub fn apparent_power(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(21, 25)
    }

    pub fn reactive_power(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_i16(26, 30)
    }

    pub fn power_factor(&self) -> SampleResult<Option<f64>> {
        Ok(ModelView::power_factor(self.view.scaled_i16(31, 35)?))
    }

    /// Total real energy exported, watt-hours.
    pub fn energy_exported(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_acc32(36, 52)
    }

    /// Total real energy imported, watt-hours.
    pub fn energy_imported(&self) -> SampleResult<Option<f64>> {
        self.view.scaled_acc32(44, 52)
    }
}

// ============================================================================
// Multiple MPPT (160)
// ============================================================================

/// Model 160: per-module DC readings in repeating blocks.
#[derive(Debug, Clone, Copy)]
pub struct MpptModel<'a> {
    view: ModelView<'a>,
}

impl MpptModel<'_> {
    /// Number of module blocks present in the model.
    pub fn module_count(&self) -> u16 {
        self.view.model.repeating_block_count
    }

    /// Module count as the device reports it (`N`).
    pub fn reported_module_count(&self) -> SampleResult<Option<u16>> {
        self.view.uint16(6)
    }

    pub fn events(&self) -> SampleResult<Option<u32>> {
        self.view.uint32(4)
    }

    pub fn module_id(&self, index: u16) -> SampleResult<Option<u16>> {
        self.view.uint16(self.offset(index, 0)?)
    }

    pub fn module_label(&self, index: u16) -> SampleResult<Option<String>> {
        self.view.string(self.offset(index, 1)?, 8)
    }

    /// DC current of module `index`, amps.
    pub fn dc_current(&self, index: u16) -> SampleResult<Option<f64>> {
        self.view.scaled_u16(self.offset(index, 9)?, 0)
    }

    pub fn dc_voltage(&self, index: u16) -> SampleResult<Option<f64>> {
        self.view.scaled_u16(self.offset(index, 10)?, 1)
    }

    pub fn dc_power(&self, index: u16) -> SampleResult<Option<f64>> {
        self.view.scaled_u16(self.offset(index, 11)?, 2)
    }

    /// Lifetime DC energy of module `index`, watt-hours.
    pub fn dc_energy(&self, index: u16) -> SampleResult<Option<f64>> {
        self.view.scaled_acc32(self.offset(index, 12)?, 3)
    }

    /// Sum of the module powers present.
    pub fn total_dc_power(&self) -> SampleResult<Option<f64>> {
        let mut total = None;
        for index in 0..self.module_count() {
            if let Some(w) = self.dc_power(index)? {
                total = Some(total.unwrap_or(0.0) + w);
            }
        }
        Ok(total)
    }

    fn offset(&self, index: u16, offset: u16) -> SampleResult<u16> {
        let address = self.view.model.repeating_address(index, offset)?;
        Ok((u32::from(address) - self.view.model.block_address()) as u16)
    }
}

// ============================================================================
// Generic
// ============================================================================

/// Raw access by body offset.
#[derive(Debug, Clone, Copy)]
pub struct GenericModel<'a> {
    view: ModelView<'a>,
}

impl<'a> GenericModel<'a> {
    pub fn descriptor(&self) -> &'a ModelDescriptor {
        self.view.model
    }

    pub fn word(&self, offset: u16) -> SampleResult<Option<u16>> {
        self.view.word(offset)
    }

    /// The whole body, or `None` until every word has been read.
    pub fn words(&self) -> Option<Vec<u16>> {
        let model = self.view.model;
        u16::try_from(model.block_address())
            .ok()
            .and_then(|address| self.view.snapshot.words(address, usize::from(model.model_length)))
    }

    /// Typed value at a body offset (big-endian word order, as SunSpec uses).
    pub fn value(&self, offset: u16, data_type: DataType) -> SampleResult<Option<SampleValue>> {
        let count = data_type.register_count() as u16;
        let address = self.view.span(offset, count)?;
        Ok(self.view.snapshot.value(address, data_type, ByteOrder::BigEndian))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_ascii;
    use crate::register_store::RegisterStore;
    use crate::sunspec::ModelRegistry;

    fn approx(value: Option<f64>, expected: f64) {
        let v = value.expect("value present");
        assert!((v - expected).abs() < 1e-9, "{} != {}", v, expected);
    }

    fn store_with(address: u16, words: &[u16]) -> RegisterStore {
        let store = RegisterStore::new();
        store.update(|m| Ok(m.save_words(address, words))).unwrap();
        store
    }

    fn inverter_body() -> Vec<u16> {
        let mut body = vec![0u16; 50];
        body[0] = 123; // A
        body[1] = 41;
        body[4] = (-1i16) as u16; // A_SF
        body[8] = 2300;
        body[9] = 2310;
        body[10] = 2320;
        body[11] = (-1i16) as u16; // V_SF
        body[12] = (-1500i16) as u16; // W
        body[13] = 0;
        body[14] = 5000; // Hz
        body[15] = (-2i16) as u16;
        body[20] = 95; // PF as percent
        body[21] = 0;
        body[22] = 0x0001; // WH
        body[23] = 0x0005;
        body[24] = 3;
        body[31] = SUNSPEC_NI_INT16; // TmpCab
        body[35] = 0;
        body[36] = 4; // St
        body[38] = 0xFFFF; // Evt1 not implemented
        body[39] = 0xFFFF;
        body
    }

    #[test]
    fn test_three_phase_inverter_points() {
        let model = ModelRegistry::default().describe(103, 40070, 50);
        let store = store_with(40072, &inverter_body());
        let snap = store.snapshot();
        let ModelAccessor::Inverter(inv) = model.accessor(&snap) else {
            panic!("expected inverter accessor");
        };

        approx(inv.current().unwrap(), 12.3);
        approx(inv.phase_current(0).unwrap(), 4.1);
        approx(inv.voltage().unwrap(), 231.0);
        approx(inv.active_power().unwrap(), -1500.0);
        approx(inv.frequency().unwrap(), 50.0);
        approx(inv.power_factor().unwrap(), 0.95);
        approx(inv.lifetime_energy().unwrap(), 65_541_000.0);
        assert_eq!(inv.cabinet_temperature().unwrap(), None);
        assert_eq!(inv.state().unwrap(), Some(InverterState::Mppt));
        assert_eq!(inv.events().unwrap(), None);
    }

    #[test]
    fn test_single_phase_voltage_uses_phase_a_only() {
        let model = ModelRegistry::default().describe(101, 40070, 50);
        let store = store_with(40072, &inverter_body());
        let snap = store.snapshot();
        let ModelAccessor::Inverter(inv) = model.accessor(&snap) else {
            panic!("expected inverter accessor");
        };
        approx(inv.voltage().unwrap(), 230.0);
    }

    #[test]
    fn test_missing_scale_factor_is_none() {
        let mut body = inverter_body();
        body[4] = SUNSPEC_NI_INT16;
        let model = ModelRegistry::default().describe(103, 40070, 50);
        let store = store_with(40072, &body);
        let snap = store.snapshot();
        let ModelAccessor::Inverter(inv) = model.accessor(&snap) else {
            panic!("expected inverter accessor");
        };
        assert_eq!(inv.current().unwrap(), None);
    }

    #[test]
    fn test_unread_model_is_none_not_error() {
        let model = ModelRegistry::default().describe(103, 40070, 50);
        let snap = RegisterStore::new().snapshot();
        let ModelAccessor::Inverter(inv) = model.accessor(&snap) else {
            panic!("expected inverter accessor");
        };
        assert_eq!(inv.frequency().unwrap(), None);
        assert_eq!(inv.voltage().unwrap(), None);
    }

    #[test]
    fn test_short_model_is_out_of_bounds() {
        let model = ModelRegistry::default().describe(103, 40070, 20);
        let snap = store_with(40072, &inverter_body()).snapshot();
        let ModelAccessor::Inverter(inv) = model.accessor(&snap) else {
            panic!("expected inverter accessor");
        };
        approx(inv.frequency().unwrap(), 50.0);
        assert!(matches!(inv.lifetime_energy(), Err(SampleError::OutOfBounds { .. })));
    }

    #[test]
    fn test_common_model_strings() {
        let mut body = Vec::with_capacity(66);
        body.extend(encode_ascii("Voltage", 16));
        body.extend(encode_ascii("VS-10K", 16));
        body.extend(encode_ascii("", 8));
        body.extend(encode_ascii("1.2.3", 8));
        body.extend(encode_ascii("SN0042", 16));
        body.push(7);
        body.push(0x8000);
        let model = ModelRegistry::default().describe(1, 40002, 66);
        let snap = store_with(40004, &body).snapshot();
        let ModelAccessor::Common(common) = model.accessor(&snap) else {
            panic!("expected common accessor");
        };
        assert_eq!(common.manufacturer().unwrap().as_deref(), Some("Voltage"));
        assert_eq!(common.model().unwrap().as_deref(), Some("VS-10K"));
        assert_eq!(common.version().unwrap().as_deref(), Some("1.2.3"));
        assert_eq!(common.serial_number().unwrap().as_deref(), Some("SN0042"));
        assert_eq!(common.device_address().unwrap(), Some(7));
    }

    #[test]
    fn test_meter_energy_and_power() {
        let mut body = vec![0u16; 105];
        body[5] = 2400;
        body[13] = (-1i16) as u16;
        body[14] = 6000;
        body[15] = (-2i16) as u16;
        body[16] = (-250i16) as u16;
        body[20] = 1;
        body[36] = 0;
        body[37] = 900;
        body[44] = 0;
        body[45] = 0; // acc32 zero: not implemented
        body[52] = 0;
        let model = ModelRegistry::default().describe(203, 40200, 105);
        let snap = store_with(40202, &body).snapshot();
        let ModelAccessor::Meter(meter) = model.accessor(&snap) else {
            panic!("expected meter accessor");
        };
        approx(meter.voltage().unwrap(), 240.0);
        approx(meter.frequency().unwrap(), 60.0);
        approx(meter.active_power().unwrap(), -2500.0);
        approx(meter.energy_exported().unwrap(), 900.0);
        assert_eq!(meter.energy_imported().unwrap(), None);
    }

    #[test]
    fn test_mppt_modules() {
        let mut body = vec![0u16; 48];
        body[0] = (-2i16) as u16; // DCA_SF
        body[1] = (-1i16) as u16; // DCV_SF
        body[2] = 0; // DCW_SF
        body[3] = 0;
        body[6] = 2;
        for (i, (a, v, w)) in [(850u16, 3801u16, 323u16), (910, 3790, 345)].into_iter().enumerate() {
            let base = 8 + i * 20;
            body[base] = i as u16 + 1;
            body[base + 9] = a;
            body[base + 10] = v;
            body[base + 11] = w;
        }
        let model = ModelRegistry::default().describe(160, 40120, 48);
        let snap = store_with(40122, &body).snapshot();
        let ModelAccessor::Mppt(mppt) = model.accessor(&snap) else {
            panic!("expected MPPT accessor");
        };
        assert_eq!(mppt.module_count(), 2);
        assert_eq!(mppt.reported_module_count().unwrap(), Some(2));
        assert_eq!(mppt.module_id(1).unwrap(), Some(2));
        approx(mppt.dc_current(0).unwrap(), 8.5);
        approx(mppt.dc_voltage(1).unwrap(), 379.0);
        approx(mppt.total_dc_power().unwrap(), 668.0);
        assert!(mppt.dc_current(2).is_err());
    }

    #[test]
    fn test_float_inverter_is_generic() {
        let mut body = vec![0u16; 60];
        body[0] = 0x4148; // 12.5f32
        body[1] = 0x0000;
        let model = ModelRegistry::default().describe(113, 40070, 60);
        let snap = store_with(40072, &body).snapshot();
        let accessor = model.accessor(&snap);
        let ModelAccessor::Generic(generic) = accessor else {
            panic!("expected generic accessor");
        };
        assert_eq!(generic.value(0, DataType::F32).unwrap(), Some(SampleValue::F32(12.5)));
        assert_eq!(generic.words().map(|w| w.len()), Some(60));
        assert_eq!(accessor.descriptor().model_id, 113);
        assert!(generic.value(59, DataType::F32).is_err());
    }

    #[test]
    fn test_span_at_end_of_address_space_is_out_of_bounds() {
        let model = ModelRegistry::default().describe(113, 0, 0xFFFF);
        let snap = RegisterStore::new().snapshot();
        let ModelAccessor::Generic(generic) = model.accessor(&snap) else {
            panic!("expected generic accessor");
        };
        assert_eq!(generic.value(0xFFFD, DataType::U16).unwrap(), None);
        assert!(matches!(
            generic.value(0xFFFD, DataType::F64),
            Err(SampleError::OutOfBounds { .. })
        ));
        assert!(matches!(
            generic.value(0xFFFD, DataType::U32),
            Err(SampleError::OutOfBounds { .. })
        ));
    }
}
