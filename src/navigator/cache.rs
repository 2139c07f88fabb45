use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::origin::FeedItem;

/// Prefetched items keyed by external id, plus the media URLs already requested.
///
/// Every entry is served at most once: [`FeedItemCache::take`] is the only read and it
/// evicts, so revisiting an id always goes back to the origin for fresh label state.
/// One cache belongs to one navigator session and is dropped with it, or replaced
/// wholesale through [`FeedItemCache::successor`] when the origin's view changes.
#[derive(Debug, Default)]
pub struct FeedItemCache {
    items: Mutex<HashMap<String, FeedItem>>,
    /// Bumped by [`FeedItemCache::invalidate`]; fetches started under an older value are discarded.
    generations: Mutex<HashMap<String, u64>>,
    requested_media: Mutex<HashSet<String>>,
}

impl FeedItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty cache that remembers which media were already requested.
    pub fn successor(&self) -> Self {
        let requested = self.requested_media.lock().expect("media set mutex poisoned").clone();
        Self { requested_media: Mutex::new(requested), ..Self::default() }
    }

    /// Read before fetching `id`; pass the value back to [`FeedItemCache::put`].
    pub fn generation(&self, id: &str) -> u64 {
        self.generations.lock().expect("generation mutex poisoned").get(id).copied().unwrap_or(0)
    }

    /// Stores a fetched item unless `id` was invalidated since `generation` was read.
    ///
    /// First writer wins; a slower duplicate fetch never replaces an entry.
    pub fn put(&self, id: &str, item: FeedItem, generation: u64) -> bool {
        let generations = self.generations.lock().expect("generation mutex poisoned");
        if generations.get(id).copied().unwrap_or(0) != generation {
            return false;
        }
        let mut items = self.items.lock().expect("cache mutex poisoned");
        match items.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(item);
                true
            }
        }
    }

    /// Drops any entry for `id` and rejects fetches of it that are still in flight.
    pub fn invalidate(&self, id: &str) {
        let mut generations = self.generations.lock().expect("generation mutex poisoned");
        *generations.entry(id.to_string()).or_insert(0) += 1;
        self.items.lock().expect("cache mutex poisoned").remove(id);
    }

    pub fn take(&self, id: &str) -> Option<FeedItem> {
        self.items.lock().expect("cache mutex poisoned").remove(id)
    }

    pub fn has_requested_media(&self, url: &str) -> bool {
        self.requested_media.lock().expect("media set mutex poisoned").contains(url)
    }

    /// Returns `true` when the URL was not requested before.
    pub fn mark_requested_media(&self, url: &str) -> bool {
        self.requested_media.lock().expect("media set mutex poisoned").insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("cache mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::mock::sample_item;

    #[test]
    fn take_serves_an_entry_once() {
        let cache = FeedItemCache::new();
        let item = sample_item("A", 1);
        cache.put("A", item.clone(), 0);
        assert_eq!(cache.take("A"), Some(item));
        assert_eq!(cache.take("A"), None);
    }

    #[test]
    fn first_put_wins() {
        let cache = FeedItemCache::new();
        let fresh = sample_item("A", 1);
        let mut stale = sample_item("A", 1);
        stale.caption = Some("stale".into());
        assert!(cache.put("A", fresh.clone(), 0));
        assert!(!cache.put("A", stale, 0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take("A"), Some(fresh));
    }

    #[test]
    fn requested_media_never_shrinks() {
        let cache = FeedItemCache::new();
        assert!(!cache.has_requested_media("u1"));
        assert!(cache.mark_requested_media("u1"));
        assert!(!cache.mark_requested_media("u1"));
        cache.put("A", sample_item("A", 1), 0);
        cache.take("A");
        assert!(cache.has_requested_media("u1"));
    }

    #[test]
    fn invalidated_id_rejects_fetches_started_before() {
        let cache = FeedItemCache::new();
        let before = cache.generation("B");
        cache.put("B", sample_item("B", 2), before);

        cache.invalidate("B");
        assert_eq!(cache.len(), 0);
        assert!(!cache.put("B", sample_item("B", 2), before));
        assert!(cache.take("B").is_none());

        let mut labeled = sample_item("B", 2);
        labeled.caption = Some("after commit".into());
        assert!(cache.put("B", labeled.clone(), cache.generation("B")));
        assert_eq!(cache.take("B"), Some(labeled));
    }

    #[test]
    fn successor_starts_empty_but_keeps_requested_media() {
        let cache = FeedItemCache::new();
        cache.put("A", sample_item("A", 1), 0);
        cache.mark_requested_media("u1");

        let next = cache.successor();
        assert_eq!(next.len(), 0);
        assert!(next.take("A").is_none());
        assert!(next.has_requested_media("u1"));
        assert_eq!(cache.len(), 1);
    }
}
