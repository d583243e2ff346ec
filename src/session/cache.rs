//! Fixed-capacity cache of subscribed topics and their last message.

use heapless::{String, Vec};

use crate::config::{DEFAULT_MAX_TOPICS, MAX_MESSAGE_LEN, MAX_TOPIC_LEN};

/// A subscribed topic and the last message seen on it.
///
/// An empty message means nothing has arrived yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTopic {
    topic: String<MAX_TOPIC_LEN>,
    last_message: String<MAX_MESSAGE_LEN>,
}

impl CachedTopic {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }
}

/// Where a topic would go, as decided before any transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Already cached; subscribing again is a no-op.
    Cached,
    /// Not cached and there is room for it.
    Vacant,
    /// Not cached and the cache is full.
    Full,
}

/// Topics in subscription order, at most `MAX_TOPICS` of them.
///
/// Entries are never removed. The cache owns copies of its strings, so the
/// topics passed in only need to live for the duration of a call.
///
/// # Example
///
/// ```ignore
/// let mut cache = TopicCache::<4>::new();
/// if cache.slot("device/cmd") == Slot::Vacant {
///     transport.subscribe("device/cmd").await?;
///     cache.insert("device/cmd");
/// }
/// cache.record("device/cmd", "on");
/// assert_eq!(cache.get("device/cmd"), "on");
/// ```
#[derive(Debug, Default)]
pub struct TopicCache<const MAX_TOPICS: usize = DEFAULT_MAX_TOPICS> {
    entries: Vec<CachedTopic, MAX_TOPICS>,
}

impl<const MAX_TOPICS: usize> TopicCache<MAX_TOPICS> {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Looks up where `topic` stands without changing anything.
    ///
    /// The capacity check happens here, before the transport is involved, so
    /// a full cache never leaves a broker-side subscription without a local
    /// entry.
    pub fn slot(&self, topic: &str) -> Slot {
        if self.find(topic).is_some() {
            Slot::Cached
        } else if self.entries.is_full() {
            Slot::Full
        } else {
            Slot::Vacant
        }
    }

    /// Appends `topic` with an empty message.
    ///
    /// Returns `false` if the topic is too long or the cache is full.
    /// A topic that is already cached is left as is.
    pub fn insert(&mut self, topic: &str) -> bool {
        if self.find(topic).is_some() {
            return true;
        }

        let mut owned = String::new();
        if owned.push_str(topic).is_err() {
            return false;
        }

        self.entries
            .push(CachedTopic {
                topic: owned,
                last_message: String::new(),
            })
            .is_ok()
    }

    /// Last message for `topic`, or `""` if unknown or nothing arrived yet.
    pub fn get(&self, topic: &str) -> &str {
        self.find(topic).map_or("", CachedTopic::last_message)
    }

    /// Replaces the last message of a cached topic.
    ///
    /// Messages for topics that are not cached are dropped. Returns whether
    /// the message was stored.
    pub fn record(&mut self, topic: &str, message: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.topic == topic) else {
            return false;
        };
        entry.last_message.clear();
        // Callers truncate first; anything longer is cut, not rejected.
        for ch in message.chars() {
            if entry.last_message.push(ch).is_err() {
                break;
            }
        }
        true
    }

    /// Get an iterator over the cached topics in subscription order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(CachedTopic::topic)
    }

    /// Get an iterator over the cached entries in subscription order.
    pub fn iter(&self) -> impl Iterator<Item = &CachedTopic> {
        self.entries.iter()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.find(topic).is_some()
    }

    /// Get the number of cached topics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        MAX_TOPICS
    }

    fn find(&self, topic: &str) -> Option<&CachedTopic> {
        self.entries.iter().find(|e| e.topic == topic)
    }
}
