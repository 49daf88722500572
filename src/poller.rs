//! # Pollers
//!
//! [`RegisterPoller`] owns a device transport and a shared [`RegisterStore`].
//! A refresh plans batched reads, performs them while holding the device
//! lock, and publishes everything in a single store update. If any read
//! fails nothing is published and readers keep the last good data.
//!
//! [`FrameCollector`] does the same for a CAN [`FrameSource`] and a
//! [`FrameStore`].
//!
//! ```rust
//! use std::sync::Arc;
//! use voltage_sample::{RegisterImage, RegisterPoller, RegisterRange, RegisterStore};
//!
//! let device = RegisterImage::new().with_holding(100, &[1, 2, 3]);
//! let store = Arc::new(RegisterStore::new());
//! let poller = RegisterPoller::new(device, Arc::clone(&store));
//!
//! poller.refresh(&[RegisterRange::holding(1, 100, 3)]).unwrap();
//! assert_eq!(store.snapshot().words(100, 3), Some(vec![1, 2, 3]));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::batcher::{ReadBatcher, RegisterRange};
use crate::cache::{CacheGroups, FieldGroup};
use crate::device_limits::DeviceLimits;
use crate::discovery::ModelDiscovery;
use crate::error::SampleResult;
use crate::frame_store::FrameStore;
use crate::register_store::RegisterStore;
use crate::sunspec::{DiscoveredModels, ModelDescriptor};
use crate::transport::{FrameSource, RegisterTransport, SlaveId};

// ============================================================================
// Poll status
// ============================================================================

/// Outcome history of one polled range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeStatus {
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl RangeStatus {
    /// True once a range has been attempted and its latest attempt failed.
    pub fn is_failing(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Poll status keyed by `(unit, start address)` of the requested range.
#[derive(Debug, Clone, Default)]
pub struct PollStatus {
    ranges: HashMap<(SlaveId, u16), RangeStatus>,
}

impl PollStatus {
    pub fn get(&self, unit: SlaveId, address: u16) -> Option<&RangeStatus> {
        self.ranges.get(&(unit, address))
    }

    pub fn range(&self, range: &RegisterRange) -> Option<&RangeStatus> {
        self.ranges.get(&range.key())
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Keys whose latest attempt failed.
    pub fn failing(&self) -> Vec<(SlaveId, u16)> {
        let mut keys: Vec<_> = self
            .ranges
            .iter()
            .filter(|(_, s)| s.is_failing())
            .map(|(k, _)| *k)
            .collect();
        keys.sort_unstable();
        keys
    }

    fn record_success(&mut self, key: (SlaveId, u16), now: DateTime<Utc>) {
        let status = self.ranges.entry(key).or_default();
        status.last_attempt = Some(now);
        status.last_success = Some(now);
        status.consecutive_failures = 0;
        status.last_error = None;
    }

    fn record_failure(&mut self, key: (SlaveId, u16), now: DateTime<Utc>, error: &str) {
        let status = self.ranges.entry(key).or_default();
        status.last_attempt = Some(now);
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
        status.last_error = Some(error.to_string());
    }
}

// ============================================================================
// Register poller
// ============================================================================

/// Polls one device into a shared register store.
pub struct RegisterPoller<T: RegisterTransport> {
    device: Mutex<T>,
    store: Arc<RegisterStore>,
    limits: DeviceLimits,
    groups: Mutex<CacheGroups>,
    status: Mutex<PollStatus>,
}

impl<T: RegisterTransport> RegisterPoller<T> {
    pub fn new(device: T, store: Arc<RegisterStore>) -> Self {
        Self {
            device: Mutex::new(device),
            store,
            limits: DeviceLimits::default(),
            groups: Mutex::new(CacheGroups::new()),
            status: Mutex::new(PollStatus::default()),
        }
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Register a named field group for [`refresh_expired`](Self::refresh_expired).
    pub fn add_group(&self, group: FieldGroup) {
        self.groups.lock().insert(group);
    }

    pub fn store(&self) -> &Arc<RegisterStore> {
        &self.store
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// Copy of the current poll status.
    pub fn status(&self) -> PollStatus {
        self.status.lock().clone()
    }

    /// Run `f` with exclusive access to the device.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.device.lock())
    }

    /// Read `ranges` and publish them in one store update.
    ///
    /// Returns whether any stored word changed. The store's timestamp is
    /// refreshed on every successful poll, changed or not.
    pub fn refresh(&self, ranges: &[RegisterRange]) -> SampleResult<bool> {
        let requests = ReadBatcher::plan(ranges.iter().copied(), &self.limits);
        if requests.is_empty() {
            return Ok(false);
        }
        debug!(
            "Refreshing {} ranges with {} requests",
            ranges.len(),
            requests.len()
        );

        let result = {
            let mut device = self.device.lock();
            self.read_all(&mut *device, &requests)
        };
        let now = self.store.clock().now();

        let reads = match result {
            Ok(reads) => reads,
            Err(e) => {
                warn!("Poll failed, keeping last good data: {}", e);
                let message = e.to_string();
                let mut status = self.status.lock();
                for range in ranges {
                    status.record_failure(range.key(), now, &message);
                }
                return Err(e.into());
            }
        };

        let mut changed = false;
        self.store.update(|m| {
            for (range, words) in &reads {
                changed |= m.save_words(range.address, words);
            }
            Ok(true)
        })?;

        let mut status = self.status.lock();
        for range in ranges {
            status.record_success(range.key(), now);
        }
        Ok(changed)
    }

    /// Refresh every field group whose cache window has passed.
    /// Returns the names of the groups refreshed.
    ///
    /// Stops at the first failing group; groups refreshed before it keep
    /// their new data and timestamps.
    pub fn refresh_expired(&self) -> SampleResult<Vec<String>> {
        let now = self.store.clock().now();
        let due: Vec<(String, Vec<RegisterRange>)> = self
            .groups
            .lock()
            .expired(now)
            .into_iter()
            .map(|g| (g.name.clone(), g.ranges.clone()))
            .collect();

        let mut refreshed = Vec::with_capacity(due.len());
        for (name, ranges) in due {
            trace!("Cache group '{}' expired", name);
            self.refresh(&ranges)?;
            self.groups.lock().mark_updated(&name, self.store.clock().now());
            refreshed.push(name);
        }
        Ok(refreshed)
    }

    /// Discover SunSpec models on the device, recording headers in the store.
    pub fn discover(&self, discovery: &ModelDiscovery) -> DiscoveredModels {
        let mut device = self.device.lock();
        discovery.discover(&mut *device, &self.store)
    }

    /// Load one model's body.
    pub fn load_model(&self, discovery: &ModelDiscovery, model: &ModelDescriptor) -> SampleResult<()> {
        let mut device = self.device.lock();
        discovery.read_model(&mut *device, &self.store, model)
    }

    fn read_all(
        &self,
        device: &mut T,
        requests: &[RegisterRange],
    ) -> std::io::Result<Vec<(RegisterRange, Vec<u16>)>> {
        let mut reads = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            if i > 0 && self.limits.inter_request_delay_ms > 0 {
                thread::sleep(Duration::from_millis(self.limits.inter_request_delay_ms));
            }
            let words =
                device.read_registers(request.unit, request.function, request.address, request.count)?;
            if words.len() != usize::from(request.count) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "asked for {} registers at {}, got {}",
                        request.count,
                        request.address,
                        words.len()
                    ),
                ));
            }
            trace!(
                "Read unit={} fc={:02X} addr={} count={}",
                request.unit,
                request.function.code(),
                request.address,
                request.count
            );
            reads.push((*request, words));
        }
        Ok(reads)
    }
}

impl<T: RegisterTransport> fmt::Debug for RegisterPoller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterPoller")
            .field("store", &self.store)
            .field("limits", &self.limits)
            .field("groups", &self.groups.lock().len())
            .finish()
    }
}

// ============================================================================
// Frame collector
// ============================================================================

/// Drains a CAN frame source into a shared frame store.
pub struct FrameCollector<S: FrameSource> {
    source: Mutex<S>,
    store: Arc<FrameStore>,
}

impl<S: FrameSource> FrameCollector<S> {
    pub fn new(source: S, store: Arc<FrameStore>) -> Self {
        Self {
            source: Mutex::new(source),
            store,
        }
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    /// Receive up to `max_frames` pending frames and record them in one
    /// update. Returns the number recorded.
    ///
    /// On a receive error the frames already received are still recorded
    /// before the error is returned.
    pub fn poll(&self, max_frames: usize) -> SampleResult<usize> {
        let mut received = Vec::new();
        let mut failure = None;
        {
            let mut source = self.source.lock();
            while received.len() < max_frames {
                match source.receive() {
                    Ok(Some(frame)) => received.push(frame),
                    Ok(None) => break,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        let count = self.store.record(received);
        if let Some(e) = failure {
            warn!("Frame receive failed after {} frames: {}", count, e);
            return Err(e.into());
        }
        trace!("Collected {} frames", count);
        Ok(count)
    }
}

impl<S: FrameSource> fmt::Debug for FrameCollector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCollector")
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualTimeSource, TimeSource};
    use crate::frame::{CanId, FrameRecord};
    use crate::transport::{FrameReplay, RegisterImage};
    use std::io;

    fn poller_at(
        device: RegisterImage,
        clock: &Arc<ManualTimeSource>,
    ) -> RegisterPoller<RegisterImage> {
        let store = Arc::new(RegisterStore::with_time_source(clock.clone()));
        RegisterPoller::new(device, store)
    }

    #[test]
    fn test_refresh_batches_and_publishes() {
        let clock = Arc::new(ManualTimeSource::from_millis(1_000));
        let device = RegisterImage::new().with_holding(0, &(0..20).collect::<Vec<u16>>());
        let poller = poller_at(device, &clock).with_limits(DeviceLimits::new().with_max_gap(4));

        let ranges = [RegisterRange::holding(1, 0, 5), RegisterRange::holding(1, 8, 4)];
        assert!(poller.refresh(&ranges).unwrap());
        assert_eq!(poller.with_device(|d| d.read_count()), 1);

        let snap = poller.store().snapshot();
        assert_eq!(snap.words(0, 12), Some((0..12).collect()));
        assert_eq!(snap.last_update(), Some(clock.now()));
        assert!(poller.status().range(&ranges[1]).unwrap().last_success.is_some());
    }

    #[test]
    fn test_unchanged_refresh_still_advances_timestamp() {
        let clock = Arc::new(ManualTimeSource::from_millis(1_000));
        let poller = poller_at(RegisterImage::new().with_holding(0, &[5]), &clock);
        let range = [RegisterRange::holding(1, 0, 1)];
        assert!(poller.refresh(&range).unwrap());
        clock.advance_millis(10_000);
        assert!(!poller.refresh(&range).unwrap());
        assert_eq!(poller.store().last_update(), Some(clock.now()));
    }

    #[test]
    fn test_failed_refresh_keeps_last_good_data() {
        let clock = Arc::new(ManualTimeSource::from_millis(0));
        let device = RegisterImage::new().with_holding(0, &[1, 2]).with_holding(200, &[3]);
        let poller = poller_at(device, &clock);
        let ranges = [RegisterRange::holding(1, 0, 2), RegisterRange::holding(1, 200, 1)];
        poller.refresh(&ranges).unwrap();
        let before = poller.store().last_update();

        clock.advance_millis(100);
        poller.with_device(|d| {
            d.insert(crate::transport::ReadFunction::Holding, 0, &[9, 9]);
            d.fail_at(200);
        });
        let err = poller.refresh(&ranges).unwrap_err();
        assert!(err.is_communication());

        // first request succeeded on the wire but nothing was published
        let snap = poller.store().snapshot();
        assert_eq!(snap.words(0, 2), Some(vec![1, 2]));
        assert_eq!(snap.last_update(), before);

        let status = poller.status();
        let failed = status.get(1, 200).unwrap();
        assert_eq!(failed.consecutive_failures, 1);
        assert!(failed.last_error.is_some());
        assert_eq!(status.failing(), vec![(1, 0), (1, 200)]);

        poller.with_device(|d| d.clear_failures());
        poller.refresh(&ranges).unwrap();
        assert!(poller.status().failing().is_empty());
    }

    #[test]
    fn test_refresh_expired_groups() {
        let clock = Arc::new(ManualTimeSource::from_millis(0));
        let device = RegisterImage::new().with_holding(0, &[1; 10]);
        let poller = poller_at(device, &clock);
        poller.add_group(FieldGroup::new("fast", 1_000, vec![RegisterRange::holding(1, 0, 2)]));
        poller.add_group(FieldGroup::new("slow", 60_000, vec![RegisterRange::holding(1, 5, 2)]));

        assert_eq!(poller.refresh_expired().unwrap(), vec!["fast", "slow"]);
        clock.advance_millis(1_000);
        assert!(poller.refresh_expired().unwrap().is_empty());
        clock.advance_millis(1);
        assert_eq!(poller.refresh_expired().unwrap(), vec!["fast"]);
    }

    #[test]
    fn test_discover_and_load_through_poller() {
        let clock = Arc::new(ManualTimeSource::from_millis(0));
        let device = RegisterImage::new()
            .with_holding(40000, &crate::constants::SUNSPEC_MARKER)
            .with_holding(40002, &[160, 28])
            .with_holding(40004, &[0; 28])
            .with_holding(40032, &[0xFFFF, 0]);
        let poller = poller_at(device, &clock);
        let discovery = ModelDiscovery::new(1);
        let models = poller.discover(&discovery);
        assert_eq!(models.len(), 1);
        poller.load_model(&discovery, &models.models[0]).unwrap();
        assert_eq!(poller.store().snapshot().words(40004, 28).map(|w| w.len()), Some(28));
    }

    struct FlakySource {
        frames: Vec<FrameRecord>,
    }

    impl FrameSource for FlakySource {
        fn receive(&mut self) -> io::Result<Option<FrameRecord>> {
            match self.frames.pop() {
                Some(frame) => Ok(Some(frame)),
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "bus off")),
            }
        }
    }

    #[test]
    fn test_frame_collector_limits_batch() {
        let frames = (0..5u16).map(|i| FrameRecord::new(CanId::Standard(i), vec![i as u8], Utc::now()));
        let replay = FrameReplay::new(frames.map(|f| f.unwrap()));
        let collector = FrameCollector::new(replay, Arc::new(FrameStore::new()));
        assert_eq!(collector.poll(3).unwrap(), 3);
        assert_eq!(collector.poll(10).unwrap(), 2);
        assert_eq!(collector.poll(10).unwrap(), 0);
        assert_eq!(collector.store().len(), 5);
    }

    #[test]
    fn test_frame_collector_records_before_error() {
        let frame = FrameRecord::new(CanId::Extended(0x100), vec![1, 2], Utc::now()).unwrap();
        let collector = FrameCollector::new(FlakySource { frames: vec![frame] }, Arc::new(FrameStore::new()));
        assert!(collector.poll(10).unwrap_err().is_communication());
        assert_eq!(collector.store().len(), 1);
    }
}
