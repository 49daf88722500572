//! # Sample Cache Policy
//!
//! Decides whether cached samples are still fresh or a physical poll is due.
//! Data is expired when it was never updated or when strictly more than
//! `cache_ms` milliseconds have passed since its last update; at exactly
//! `cache_ms` it is still served from cache.
//!
//! [`CacheGroups`] applies the same rule per named field group, so fast
//! changing values (power) can be polled more often than slow ones
//! (nameplate, energy totals).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::batcher::RegisterRange;
use crate::constants::DEFAULT_CACHE_MS;

/// Staleness threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub cache_ms: u64,
}

impl CachePolicy {
    pub fn new(cache_ms: u64) -> Self {
        Self { cache_ms }
    }

    /// `true` when `last_update` is absent or older than `cache_ms`.
    ///
    /// A `last_update` in the future (clock stepped backwards) counts as fresh.
    pub fn is_expired(&self, last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_update {
            None => true,
            Some(last) => {
                let age = (now - last).num_milliseconds();
                age > 0 && age as u64 > self.cache_ms
            }
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_MS)
    }
}

/// A named set of register ranges refreshed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGroup {
    pub name: String,
    #[serde(default = "default_cache_ms")]
    pub cache_ms: u64,
    pub ranges: Vec<RegisterRange>,
}

fn default_cache_ms() -> u64 {
    DEFAULT_CACHE_MS
}

impl FieldGroup {
    pub fn new(name: impl Into<String>, cache_ms: u64, ranges: Vec<RegisterRange>) -> Self {
        Self {
            name: name.into(),
            cache_ms,
            ranges,
        }
    }

    #[inline]
    pub fn policy(&self) -> CachePolicy {
        CachePolicy::new(self.cache_ms)
    }
}

#[derive(Debug, Clone)]
struct GroupState {
    group: FieldGroup,
    last_update: Option<DateTime<Utc>>,
}

/// Per-group update timestamps.
#[derive(Debug, Clone, Default)]
pub struct CacheGroups {
    groups: HashMap<String, GroupState>,
    // insertion order, so refresh order is stable
    order: Vec<String>,
}

impl CacheGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a group. Replacing resets its timestamp.
    pub fn insert(&mut self, group: FieldGroup) {
        let name = group.name.clone();
        if !self.groups.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.groups.insert(
            name,
            GroupState {
                group,
                last_update: None,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&FieldGroup> {
        self.groups.get(name).map(|s| &s.group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn last_update(&self, name: &str) -> Option<DateTime<Utc>> {
        self.groups.get(name).and_then(|s| s.last_update)
    }

    /// Unknown groups are always expired.
    pub fn is_expired(&self, name: &str, now: DateTime<Utc>) -> bool {
        self.groups
            .get(name)
            .map_or(true, |s| s.group.policy().is_expired(s.last_update, now))
    }

    /// Groups due for a refresh, in insertion order.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<&FieldGroup> {
        self.order
            .iter()
            .filter_map(|name| self.groups.get(name))
            .filter(|s| s.group.policy().is_expired(s.last_update, now))
            .map(|s| &s.group)
            .collect()
    }

    pub fn mark_updated(&mut self, name: &str, now: DateTime<Utc>) {
        if let Some(state) = self.groups.get_mut(name) {
            trace!("Cache group '{}' refreshed", name);
            state.last_update = Some(now);
        }
    }

    /// Force every group to be refreshed on next check.
    pub fn expire_all(&mut self) {
        for state in self.groups.values_mut() {
            state.last_update = None;
        }
    }
}
