//! # Register Store
//!
//! Address-indexed store of raw 16-bit register words with a last-update
//! timestamp, shared between one polling writer and any number of readers.
//!
//! ## Update discipline
//!
//! [`RegisterStore::update`] serializes writers, hands the transaction a
//! mutable *copy* of the current data, and publishes the copy only if the
//! transaction returns `Ok`. Readers therefore see either all of an update or
//! none of it, and a failed poll leaves the last good data in place. The
//! timestamp advances only when the transaction reports a change.
//!
//! ## Example
//!
//! ```rust
//! use voltage_sample::{RegisterStore, SignalReference, SampleValue};
//!
//! let store = RegisterStore::new();
//! store
//!     .update(|m| {
//!         m.save_words(40072, &[0x0102, 0x0304]);
//!         Ok(true)
//!     })
//!     .unwrap();
//!
//! let signal = SignalReference::register(40072, 32).unwrap();
//! assert_eq!(store.decode(&signal).unwrap(), Some(SampleValue::U64(0x01020304)));
//! assert!(store.last_update().is_some());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::bytes::ByteOrder;
use crate::cache::CachePolicy;
use crate::clock::{SystemTimeSource, TimeSource};
use crate::codec::{decode_ascii, decode_registers};
use crate::error::{SampleError, SampleResult};
use crate::signal::{Locator, SignalReference};
use crate::value::{DataType, SampleValue};

#[derive(Debug, Clone, Default)]
struct RegisterData {
    words: HashMap<u16, u16>,
    updated: Option<DateTime<Utc>>,
}

// ============================================================================
// Mutable View
// ============================================================================

/// Write access to the working copy inside an update transaction.
pub struct MutableRegisters<'a> {
    words: &'a mut HashMap<u16, u16>,
}

impl MutableRegisters<'_> {
    /// Store one word. Returns `true` if the stored value changed.
    pub fn save_word(&mut self, address: u16, word: u16) -> bool {
        self.words.insert(address, word) != Some(word)
    }

    /// Store consecutive words starting at `address`. Words that would land
    /// past 0xFFFF are dropped. Returns `true` if any stored value changed.
    pub fn save_words(&mut self, address: u16, words: &[u16]) -> bool {
        let mut changed = false;
        for (addr, word) in (address..=u16::MAX).zip(words) {
            changed |= self.save_word(addr, *word);
        }
        changed
    }

    /// Store arbitrary `(address, word)` pairs.
    pub fn save_map(&mut self, entries: impl IntoIterator<Item = (u16, u16)>) -> bool {
        let mut changed = false;
        for (addr, word) in entries {
            changed |= self.save_word(addr, word);
        }
        changed
    }

    /// Pack bytes two per register, high byte first. An odd final byte
    /// occupies the high half of its register.
    pub fn save_bytes(&mut self, address: u16, bytes: &[u8]) -> bool {
        let words: Vec<u16> = bytes
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
            .collect();
        self.save_words(address, &words)
    }

    /// Current value in the working copy.
    pub fn word(&self, address: u16) -> Option<u16> {
        self.words.get(&address).copied()
    }

    pub fn remove(&mut self, address: u16) -> Option<u16> {
        self.words.remove(&address)
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable point-in-time copy of a [`RegisterStore`].
///
/// Cloning is cheap and reading never locks.
#[derive(Debug, Clone, Default)]
pub struct RegisterSnapshot {
    data: Arc<RegisterData>,
}

impl RegisterSnapshot {
    pub fn len(&self) -> usize {
        self.data.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.words.is_empty()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.data.updated
    }

    #[inline]
    pub fn word(&self, address: u16) -> Option<u16> {
        self.data.words.get(&address).copied()
    }

    /// `count` consecutive words, or `None` if any is missing or the run
    /// passes the end of the address space.
    pub fn words(&self, address: u16, count: usize) -> Option<Vec<u16>> {
        (0..count)
            .map(|i| {
                let addr = u16::try_from(usize::from(address) + i).ok()?;
                self.word(addr)
            })
            .collect()
    }

    /// Words as bytes, high byte first.
    pub fn bytes(&self, address: u16, count: usize) -> Option<Vec<u8>> {
        let words = self.words(address, count)?;
        Some(words.iter().flat_map(|w| w.to_be_bytes()).collect())
    }

    /// Typed value starting at `address`; `None` when any backing word is missing.
    pub fn value(&self, address: u16, data_type: DataType, order: ByteOrder) -> Option<SampleValue> {
        let words = self.words(address, data_type.register_count())?;
        decode_registers(&words, data_type, 0, order).ok()
    }

    /// Single bit (0 = LSB) of a register.
    pub fn bit(&self, address: u16, bit: u8) -> Option<bool> {
        if bit > 15 {
            return None;
        }
        self.word(address).map(|w| (w >> bit) & 1 == 1)
    }

    /// ASCII text packed two characters per register, trimmed, NULs removed.
    pub fn ascii_string(&self, address: u16, count: usize) -> Option<String> {
        self.words(address, count).map(|words| decode_ascii(&words))
    }

    /// Copy `length` words starting at `address`; missing words read as 0.
    pub fn slice(&self, address: u16, length: usize) -> Vec<u16> {
        (0..length)
            .map(|i| {
                u16::try_from(usize::from(address) + i)
                    .ok()
                    .and_then(|addr| self.word(addr))
                    .unwrap_or(0)
            })
            .collect()
    }

    /// All words, ordered by address.
    pub fn unsigned_map(&self) -> BTreeMap<u16, u16> {
        self.data.words.iter().map(|(k, v)| (*k, *v)).collect()
    }

    /// Decode a register-located signal.
    ///
    /// Returns `Ok(None)` when a needed word was never populated and
    /// `InvalidSignal` for frame locators or malformed references.
    pub fn decode(&self, signal: &SignalReference) -> SampleResult<Option<SampleValue>> {
        signal.validate()?;
        let Locator::Register(address) = signal.locator else {
            return Err(SampleError::invalid_signal(format!(
                "{:?} cannot be read from a register store",
                signal.locator
            )));
        };
        Ok(self
            .bytes(address, signal.register_span())
            .and_then(|buf| signal.decode(&buf)))
    }

    pub fn is_expired(&self, cache_ms: u64, now: DateTime<Utc>) -> bool {
        CachePolicy::new(cache_ms).is_expired(self.data.updated, now)
    }

    /// Address-sorted hex dump, two registers per row.
    ///
    /// ```text
    /// RegisterStore{
    ///         0: 0x1234, 0x5678
    ///         4:       , 0x0001
    /// }
    /// ```
    pub fn debug_string(&self) -> String {
        let mut out = String::from("RegisterStore{");
        let mut current_row: Option<u16> = None;
        for (addr, word) in self.unsigned_map() {
            let row = addr & !1;
            let odd = addr & 1 == 1;
            if current_row != Some(row) {
                current_row = Some(row);
                let _ = write!(out, "\n\t{:5}: ", row);
                if odd {
                    out.push_str("      , ");
                }
            } else if odd {
                out.push_str(", ");
            }
            let _ = write!(out, "0x{:04X}", word);
        }
        if current_row.is_some() {
            out.push('\n');
        }
        out.push('}');
        out
    }
}

// ============================================================================
// Store
// ============================================================================

/// Concurrent register store for one device connection.
pub struct RegisterStore {
    data: RwLock<Arc<RegisterData>>,
    writer: Mutex<()>,
    clock: Arc<dyn TimeSource>,
}

impl RegisterStore {
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            data: RwLock::new(Arc::new(RegisterData::default())),
            writer: Mutex::new(()),
            clock,
        }
    }

    /// Run an update transaction against a copy of the current data.
    ///
    /// The copy is published when the transaction returns `Ok`; the
    /// timestamp is refreshed only for `Ok(true)`. On `Err` nothing is
    /// published and the error is returned.
    pub fn update<F>(&self, transaction: F) -> SampleResult<bool>
    where
        F: FnOnce(&mut MutableRegisters<'_>) -> SampleResult<bool>,
    {
        let _writer = self.writer.lock();
        let mut working = RegisterData::clone(&self.data.read());

        let changed = match transaction(&mut MutableRegisters {
            words: &mut working.words,
        }) {
            Ok(changed) => changed,
            Err(e) => {
                debug!("Register update discarded: {}", e);
                return Err(e);
            }
        };

        if changed {
            working.updated = Some(self.clock.now());
        }
        trace!("Register update published: {} words, changed={}", working.words.len(), changed);
        *self.data.write() = Arc::new(working);
        Ok(changed)
    }

    /// Cheap immutable copy; later updates never affect it.
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            data: Arc::clone(&self.data.read()),
        }
    }

    pub fn decode(&self, signal: &SignalReference) -> SampleResult<Option<SampleValue>> {
        self.snapshot().decode(signal)
    }

    pub fn debug_string(&self) -> String {
        self.snapshot().debug_string()
    }

    /// Clear the timestamp so the data is treated as stale; words are kept.
    pub fn expire(&self) {
        let _writer = self.writer.lock();
        let mut guard = self.data.write();
        if guard.updated.is_some() {
            Arc::make_mut(&mut guard).updated = None;
        }
    }

    pub fn is_expired(&self, cache_ms: u64) -> bool {
        self.snapshot().is_expired(cache_ms, self.clock.now())
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.data.read().updated
    }

    pub fn len(&self) -> usize {
        self.data.read().words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().words.is_empty()
    }

    pub(crate) fn clock(&self) -> &Arc<dyn TimeSource> {
        &self.clock
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegisterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_struct("RegisterStore")
            .field("words", &data.words.len())
            .field("updated", &data.updated)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTimeSource;

    fn store_at(millis: i64) -> (RegisterStore, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::from_millis(millis));
        (RegisterStore::with_time_source(clock.clone()), clock)
    }

    #[test]
    fn test_new_store_is_empty_and_expired() {
        let store = RegisterStore::new();
        assert!(store.is_empty());
        assert!(store.last_update().is_none());
        assert!(store.is_expired(u64::MAX));
        assert_eq!(store.debug_string(), "RegisterStore{}");
    }

    #[test]
    fn test_timestamp_only_on_change() {
        let (store, clock) = store_at(1_000);
        assert_eq!(store.update(|m| Ok(m.save_word(1, 5))).unwrap(), true);
        assert_eq!(store.last_update().unwrap().timestamp_millis(), 1_000);

        clock.advance_millis(500);
        assert_eq!(store.update(|m| Ok(m.save_word(1, 5))).unwrap(), false);
        assert_eq!(store.last_update().unwrap().timestamp_millis(), 1_000);
    }

    #[test]
    fn test_unchanged_update_still_publishes() {
        let store = RegisterStore::new();
        store
            .update(|m| {
                m.save_word(7, 1);
                Ok(false)
            })
            .unwrap();
        assert_eq!(store.snapshot().word(7), Some(1));
        assert!(store.last_update().is_none());
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let store = RegisterStore::new();
        store.update(|m| Ok(m.save_words(0, &[1, 2]))).unwrap();
        let before = store.last_update();

        let result = store.update(|m| {
            m.save_words(0, &[9, 9, 9]);
            Err(SampleError::Protocol {
                message: "device went away".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot().words(0, 2), Some(vec![1, 2]));
        assert_eq!(store.snapshot().word(2), None);
        assert_eq!(store.last_update(), before);
    }

    #[test]
    fn test_snapshot_isolated_from_later_updates() {
        let store = RegisterStore::new();
        store.update(|m| Ok(m.save_word(0, 1))).unwrap();
        let snap = store.snapshot();
        store.update(|m| Ok(m.save_word(0, 2))).unwrap();
        assert_eq!(snap.word(0), Some(1));
        assert_eq!(store.snapshot().word(0), Some(2));
    }

    #[test]
    fn test_save_bytes_packs_big_endian_pairs() {
        let store = RegisterStore::new();
        store.update(|m| Ok(m.save_bytes(10, &[0x12, 0x34, 0x56]))).unwrap();
        assert_eq!(store.snapshot().words(10, 2), Some(vec![0x1234, 0x5600]));
    }

    #[test]
    fn test_decode_missing_word_is_none() {
        let store = RegisterStore::new();
        store.update(|m| Ok(m.save_word(100, 0xABCD))).unwrap();
        let wide = SignalReference::register(100, 32).unwrap();
        assert_eq!(store.decode(&wide).unwrap(), None);
        let narrow = SignalReference::register(100, 16).unwrap();
        assert_eq!(store.decode(&narrow).unwrap(), Some(SampleValue::U64(0xABCD)));
    }

    #[test]
    fn test_decode_bit_offsets_walk_forward() {
        let store = RegisterStore::new();
        store.update(|m| Ok(m.save_words(100, &[0xABCD, 0x1234]))).unwrap();
        let decode = |offset: u16, len: u8| {
            let sig = SignalReference::register(100, len).unwrap().with_bit_offset(offset);
            store.decode(&sig).unwrap()
        };
        assert_eq!(decode(0, 16), Some(SampleValue::U64(0xABCD)));
        assert_eq!(decode(16, 16), Some(SampleValue::U64(0x1234)));
        assert_eq!(decode(4, 12), Some(SampleValue::U64(0xBCD)));
        assert_eq!(decode(4, 8), Some(SampleValue::U64(0xBC)));
        assert_eq!(decode(12, 8), Some(SampleValue::U64(0xD1)));
        assert_eq!(decode(8, 20), Some(SampleValue::U64(0xC_D123)));
        assert_eq!(decode(20, 16), None);
    }

    #[test]
    fn test_decode_rejects_frame_locator() {
        let store = RegisterStore::new();
        let sig = SignalReference::frame(crate::frame::CanId::Standard(1), 0, 8).unwrap();
        assert!(matches!(store.decode(&sig), Err(SampleError::InvalidSignal { .. })));
    }

    #[test]
    fn test_decode_word_swapped_signed() {
        let store = RegisterStore::new();
        // -2 as i32, low word first
        store.update(|m| Ok(m.save_words(0, &[0xFFFE, 0xFFFF]))).unwrap();
        let sig = SignalReference::register(0, 32)
            .unwrap()
            .with_byte_order(ByteOrder::BigEndianSwap)
            .signed();
        assert_eq!(store.decode(&sig).unwrap(), Some(SampleValue::I64(-2)));
    }

    #[test]
    fn test_typed_accessors() {
        let store = RegisterStore::new();
        store
            .update(|m| {
                m.save_words(0, &[0x41C8, 0x0000, 0x5375, 0x6E53, 0x0000]);
                Ok(true)
            })
            .unwrap();
        let snap = store.snapshot();
        assert_eq!(
            snap.value(0, DataType::F32, ByteOrder::BigEndian),
            Some(SampleValue::F32(25.0))
        );
        assert_eq!(snap.value(4, DataType::U32, ByteOrder::BigEndian), None);
        assert_eq!(snap.ascii_string(2, 3).as_deref(), Some("SunS"));
        assert_eq!(snap.bit(2, 0), Some(true));
        assert_eq!(snap.slice(3, 4), vec![0x6E53, 0x0000, 0, 0]);
    }

    #[test]
    fn test_words_stop_at_address_space_end() {
        let store = RegisterStore::new();
        store.update(|m| Ok(m.save_words(0xFFFF, &[1, 2]))).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot().words(0xFFFF, 2), None);
    }

    #[test]
    fn test_expire_keeps_data() {
        let (store, _clock) = store_at(0);
        store.update(|m| Ok(m.save_word(0, 1))).unwrap();
        assert!(!store.is_expired(1_000));
        store.expire();
        assert!(store.is_expired(1_000));
        assert_eq!(store.snapshot().word(0), Some(1));
    }

    #[test]
    fn test_is_expired_uses_clock() {
        let (store, clock) = store_at(0);
        store.update(|m| Ok(m.save_word(0, 1))).unwrap();
        clock.advance_millis(1_000);
        assert!(!store.is_expired(1_000));
        clock.advance_millis(1);
        assert!(store.is_expired(1_000));
    }

    #[test]
    fn test_debug_string_layout() {
        let store = RegisterStore::new();
        store
            .update(|m| {
                m.save_map([(0, 0x1234), (1, 0x5678), (5, 0x0001), (40000, 0xFFFF)]);
                Ok(true)
            })
            .unwrap();
        assert_eq!(
            store.debug_string(),
            "RegisterStore{\n\t    0: 0x1234, 0x5678\n\t    4:       , 0x0001\n\t40000: 0xFFFF\n}"
        );
    }

    mod props {
        use super::*;
        use crate::bitfield::{encode_bits, BitOrigin};
        use crate::bytes::registers_to_bytes;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_register_decode_matches_msb_window(
                words in proptest::collection::vec(any::<u16>(), 4),
                offset in 0u16..64,
                len in 1u8..=64,
            ) {
                prop_assume!(usize::from(offset) + usize::from(len) <= 64);
                let store = RegisterStore::new();
                store.update(|m| Ok(m.save_words(500, &words))).unwrap();

                let whole = words.iter().fold(0u64, |acc, w| (acc << 16) | u64::from(*w));
                let shifted = whole >> (64 - u32::from(offset) - u32::from(len));
                let expected = if len == 64 { shifted } else { shifted & ((1u64 << len) - 1) };

                let sig = SignalReference::register(500, len).unwrap().with_bit_offset(offset);
                prop_assert_eq!(store.decode(&sig).unwrap(), Some(SampleValue::U64(expected)));
            }

            #[test]
            fn test_register_encode_then_decode(
                words in proptest::collection::vec(any::<u16>(), 4),
                offset in 0u16..64,
                len in 1u8..=64,
                value in any::<u64>(),
            ) {
                prop_assume!(usize::from(offset) + usize::from(len) <= 64);
                let mut buf = registers_to_bytes(&words, ByteOrder::BigEndian);
                prop_assert!(encode_bits(
                    &mut buf,
                    offset,
                    len,
                    ByteOrder::BigEndian,
                    BitOrigin::MostSignificant,
                    value,
                ));
                let store = RegisterStore::new();
                store.update(|m| Ok(m.save_bytes(500, &buf))).unwrap();

                let masked = if len == 64 { value } else { value & ((1u64 << len) - 1) };
                let sig = SignalReference::register(500, len).unwrap().with_bit_offset(offset);
                prop_assert_eq!(store.decode(&sig).unwrap(), Some(SampleValue::U64(masked)));
            }
        }
    }
}
