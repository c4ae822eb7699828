//! Listener storage: channel → priority bucket → registration order.

use crate::listener::Callback;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

/// A listener together with the priority bucket it was found in.
#[derive(Clone, Debug)]
pub struct ListenerEntry {
    /// Priority bucket (lower runs first)
    pub priority: i32,
    /// The listener itself
    pub callback: Callback,
}

/// Ordered copy of a channel's listeners, taken before a dispatch starts.
///
/// Most channels hold a handful of listeners, so the snapshot stays inline.
pub type ListenerSnapshot = SmallVec<[ListenerEntry; 8]>;

/// Priority buckets of a single channel. `BTreeMap` keeps them ascending.
type Buckets = BTreeMap<i32, Vec<Callback>>;

/// Registry of listeners keyed by channel name and priority.
///
/// Attaching the same callback twice stores it twice; de-duplication is the
/// caller's business. Empty buckets and empty channels are pruned as soon as
/// they appear, so `has_channel` is true exactly when at least one listener
/// is stored.
#[derive(Clone, Debug, Default)]
pub struct ListenerRegistry {
    channels: HashMap<String, Buckets>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback to the end of `channel`'s `priority` bucket.
    pub fn insert(&mut self, channel: impl Into<String>, priority: i32, callback: Callback) {
        self.channels
            .entry(channel.into())
            .or_default()
            .entry(priority)
            .or_default()
            .push(callback);
    }

    /// Remove every entry under `channel` that is the same listener as
    /// `callback`, across all buckets.
    ///
    /// Returns how many entries were removed.
    pub fn remove(&mut self, channel: &str, callback: &Callback) -> usize {
        let Some(buckets) = self.channels.get_mut(channel) else {
            return 0;
        };

        let mut removed = 0;
        buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|stored| !stored.same_as(callback));
            removed += before - bucket.len();
            !bucket.is_empty()
        });

        if buckets.is_empty() {
            self.channels.remove(channel);
        }

        removed
    }

    /// Remove every entry under `channel` whose callback is no longer
    /// invocable.
    ///
    /// Returns how many entries were removed.
    pub fn retain_invocable(&mut self, channel: &str) -> usize {
        let Some(buckets) = self.channels.get_mut(channel) else {
            return 0;
        };

        let mut removed = 0;
        buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(Callback::is_invocable);
            removed += before - bucket.len();
            !bucket.is_empty()
        });

        if buckets.is_empty() {
            self.channels.remove(channel);
        }

        removed
    }

    /// Drop a whole channel. Returns how many listeners it held.
    pub fn clear(&mut self, channel: &str) -> usize {
        self.channels
            .remove(channel)
            .map_or(0, |buckets| buckets.values().map(Vec::len).sum())
    }

    /// Whether any listener is registered for `channel`.
    #[must_use]
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Number of listener entries registered for `channel`.
    #[must_use]
    pub fn len(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map_or(0, |buckets| buckets.values().map(Vec::len).sum())
    }

    /// Whether the registry holds no listeners at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Total number of listener entries across all channels.
    #[must_use]
    pub fn total(&self) -> usize {
        self.channels
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Names of all channels with listeners, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Priorities in use for `channel`, ascending.
    #[must_use]
    pub fn priorities(&self, channel: &str) -> Vec<i32> {
        self.channels
            .get(channel)
            .map(|buckets| buckets.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The channel's listeners in dispatch order: ascending priority, then
    /// registration order.
    #[must_use]
    pub fn snapshot(&self, channel: &str) -> ListenerSnapshot {
        let Some(buckets) = self.channels.get(channel) else {
            return ListenerSnapshot::new();
        };

        buckets
            .iter()
            .flat_map(|(&priority, bucket)| {
                bucket.iter().map(move |callback| ListenerEntry {
                    priority,
                    callback: callback.clone(),
                })
            })
            .collect()
    }
}
