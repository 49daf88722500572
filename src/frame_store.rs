//! # Frame Store
//!
//! Latest CAN frame per identifier, with the same copy-then-swap update
//! discipline as [`crate::RegisterStore`]. A later frame with the same id
//! replaces the earlier one; no history is kept.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::cache::CachePolicy;
use crate::clock::{SystemTimeSource, TimeSource};
use crate::error::{SampleError, SampleResult};
use crate::frame::{CanId, FrameRecord};
use crate::signal::{Locator, SignalReference};
use crate::value::SampleValue;

#[derive(Debug, Clone, Default)]
struct FrameData {
    frames: HashMap<CanId, FrameRecord>,
    updated: Option<DateTime<Utc>>,
}

/// Write access to the working copy inside an update transaction.
pub struct MutableFrames<'a> {
    frames: &'a mut HashMap<CanId, FrameRecord>,
}

impl MutableFrames<'_> {
    /// Replace the frame stored for the record's id.
    pub fn save(&mut self, frame: FrameRecord) {
        self.frames.insert(frame.id(), frame);
    }

    pub fn get(&self, id: CanId) -> Option<&FrameRecord> {
        self.frames.get(&id)
    }

    pub fn remove(&mut self, id: CanId) -> Option<FrameRecord> {
        self.frames.remove(&id)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Immutable point-in-time copy of a [`FrameStore`].
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    data: Arc<FrameData>,
}

impl FrameSnapshot {
    pub fn len(&self) -> usize {
        self.data.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.frames.is_empty()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.data.updated
    }

    pub fn frame(&self, id: CanId) -> Option<&FrameRecord> {
        self.data.frames.get(&id)
    }

    /// Frames in ascending id order.
    pub fn frames(&self) -> Vec<&FrameRecord> {
        let mut frames: Vec<&FrameRecord> = self.data.frames.values().collect();
        frames.sort_by_key(|f| f.id());
        frames
    }

    /// Decode a frame-located signal from the latest payload for its id.
    ///
    /// `Ok(None)` when no frame has been seen or the payload is too short.
    pub fn decode(&self, signal: &SignalReference) -> SampleResult<Option<SampleValue>> {
        signal.validate()?;
        let Locator::Frame(id) = signal.locator else {
            return Err(SampleError::invalid_signal(format!(
                "{:?} cannot be read from a frame store",
                signal.locator
            )));
        };
        Ok(self.frame(id).and_then(|frame| signal.decode(frame.payload())))
    }

    pub fn is_expired(&self, cache_ms: u64, now: DateTime<Utc>) -> bool {
        CachePolicy::new(cache_ms).is_expired(self.data.updated, now)
    }

    /// One `0xIIIIIIII: PAYLOAD` line per frame, ascending id order.
    /// Extended ids carry an `x` suffix, as in `0x00000007x: 02`.
    pub fn debug_string(&self) -> String {
        self.frames()
            .iter()
            .map(|f| {
                let id = f.id();
                let suffix = if matches!(id, CanId::Extended(_)) { "x" } else { "" };
                format!("0x{:08X}{}: {}", id.raw(), suffix, f.hex_payload())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Concurrent CAN frame store.
pub struct FrameStore {
    data: RwLock<Arc<FrameData>>,
    writer: Mutex<()>,
    clock: Arc<dyn TimeSource>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            data: RwLock::new(Arc::new(FrameData::default())),
            writer: Mutex::new(()),
            clock,
        }
    }

    /// Run an update transaction against a copy of the current frames.
    /// Same contract as [`crate::RegisterStore::update`].
    pub fn update<F>(&self, transaction: F) -> SampleResult<bool>
    where
        F: FnOnce(&mut MutableFrames<'_>) -> SampleResult<bool>,
    {
        let _writer = self.writer.lock();
        let mut working = FrameData::clone(&self.data.read());

        let changed = transaction(&mut MutableFrames {
            frames: &mut working.frames,
        })
        .inspect_err(|e| debug!("Frame update discarded: {}", e))?;

        if changed {
            working.updated = Some(self.clock.now());
        }
        *self.data.write() = Arc::new(working);
        Ok(changed)
    }

    /// Store a batch of received frames in one transaction.
    /// Returns the number stored.
    pub fn record(&self, frames: impl IntoIterator<Item = FrameRecord>) -> usize {
        let mut count = 0;
        // the transaction never fails
        let _ = self.update(|m| {
            for frame in frames {
                trace!("Frame {} dlc={} {}", frame.id(), frame.dlc(), frame.hex_payload());
                m.save(frame);
                count += 1;
            }
            Ok(count > 0)
        });
        count
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            data: Arc::clone(&self.data.read()),
        }
    }

    pub fn decode(&self, signal: &SignalReference) -> SampleResult<Option<SampleValue>> {
        self.snapshot().decode(signal)
    }

    pub fn debug_string(&self) -> String {
        self.snapshot().debug_string()
    }

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
        self.data.read().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().frames.is_empty()
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_struct("FrameStore")
            .field("frames", &data.frames.len())
            .field("updated", &data.updated)
            .finish()
    }
}
