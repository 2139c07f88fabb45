use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::origin::{FeedItem, OriginApi};
use crate::telemetry;
use crate::telemetry::ops::navigate::Phase as NavPhase;

use super::cache::FeedItemCache;

/// Depth-bounded warming of the cache along the "next" direction.
///
/// Every step is best effort: a failed link ends the walk silently, and nothing here
/// ever touches the cursor's active item.
#[derive(Clone)]
pub struct ChainPrefetcher {
    origin: Arc<dyn OriginApi>,
    cache: Arc<FeedItemCache>,
}

impl ChainPrefetcher {
    pub fn new(origin: Arc<dyn OriginApi>, cache: Arc<FeedItemCache>) -> Self {
        Self { origin, cache }
    }

    /// Warms `next_id` itself, then runs [`ChainPrefetcher::prefetch_chain`] behind it.
    ///
    /// Only the chain is bounded by `depth`; the fetch of `next_id` comes on top, so a
    /// full walk costs `depth + 1` item fetches.
    pub fn spawn_ahead(&self, next_id: String, depth: u32) -> JoinHandle<u32> {
        let this = self.clone();
        let span = telemetry::navigate().span_kv(&NavPhase::Prefetch, [("next", next_id.clone()), ("depth", depth.to_string())]);
        tokio::spawn(
            async move {
                if !this.prefetch_item(&next_id).await {
                    return 0;
                }
                1 + this.prefetch_chain(&next_id, depth).await
            }
            .instrument(span),
        )
    }

    pub fn spawn_item(&self, id: String) -> JoinHandle<bool> {
        let this = self.clone();
        tokio::spawn(async move { this.prefetch_item(&id).await })
    }

    /// Walks at most `depth` next-edges from `start_id`, returning how many items were cached.
    pub async fn prefetch_chain(&self, start_id: &str, depth: u32) -> u32 {
        let log = telemetry::navigate();
        let mut current = start_id.to_string();
        let mut remaining = depth;
        let mut fetched = 0u32;
        while remaining > 0 {
            // keep interactive moves responsive between links
            tokio::task::yield_now().await;
            let next = match self.origin.navigation(&current).await {
                Ok(edge) => edge.next_id,
                Err(err) => {
                    log.debug_kv("prefetch chain cut", [("at", current.clone()), ("reason", err.to_string())]);
                    None
                }
            };
            let Some(next) = next else { break };
            if !self.prefetch_item(&next).await {
                break;
            }
            fetched += 1;
            current = next;
            remaining -= 1;
        }
        fetched
    }

    /// Caches one item. A copy whose id was committed while the fetch ran is dropped.
    pub async fn prefetch_item(&self, id: &str) -> bool {
        let generation = self.cache.generation(id);
        match self.origin.item(id).await {
            Ok(item) => {
                self.warm_media(&item);
                if !self.cache.put(id, item, generation) {
                    telemetry::navigate().debug_kv("prefetched copy discarded", [("id", id.to_string())]);
                }
                true
            }
            Err(err) => {
                telemetry::navigate().debug_kv("prefetch item failed", [("id", id.to_string()), ("reason", err.to_string())]);
                false
            }
        }
    }

    /// Fires one background request per media asset not requested before in this session.
    pub fn warm_media(&self, item: &FeedItem) {
        for index in 0..item.media.len() {
            let url = self.origin.media_url(item, index);
            if self.cache.has_requested_media(&url) {
                continue;
            }
            self.cache.mark_requested_media(&url);
            let origin = self.origin.clone();
            tokio::spawn(async move {
                if let Err(err) = origin.prefetch_media(&url).await {
                    telemetry::navigate().debug_kv("media prefetch failed", [("url", url), ("reason", err.to_string())]);
                }
            });
        }
    }
}
