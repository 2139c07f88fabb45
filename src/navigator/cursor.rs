use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use crate::origin::{Classification, Destination, FeedItem, NavigationEdge, OriginApi, OriginError, TripSuggestion};
use crate::telemetry;
use crate::telemetry::ops::navigate::Phase as NavPhase;

use super::cache::FeedItemCache;
use super::prefetch::ChainPrefetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveSource {
    Cache,
    Network,
}

/// Operator-editable state derived from an item when it becomes active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub media_index: usize,
    pub trip_id: Option<i64>,
    pub destination_id: Option<i64>,
    pub is_aerial: bool,
    pub is_cover: bool,
}

impl ViewState {
    pub fn derive(item: &FeedItem) -> Self {
        let media_index = match (item.is_cover, item.cover_media_id) {
            (true, Some(media_id)) => item.media_index(media_id).unwrap_or(0),
            _ => 0,
        };
        let stored = item.trip_id.is_some() || item.destination_id.is_some();
        let trip_id = if stored {
            item.trip_id
        } else {
            item.trip_suggestions.first().map(|t| t.trip_id)
        };
        ViewState {
            media_index,
            trip_id,
            destination_id: item.destination_id,
            is_aerial: item.is_aerial,
            is_cover: item.is_cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveItem {
    pub item: FeedItem,
    pub view: ViewState,
    pub edge: NavigationEdge,
    pub source: MoveSource,
}

impl ActiveItem {
    pub fn id(&self) -> &str {
        &self.item.external_id
    }

    pub fn selected_trip(&self) -> Option<&TripSuggestion> {
        let trip_id = self.view.trip_id?;
        self.item.trip_suggestions.iter().find(|t| t.trip_id == trip_id)
    }

    pub fn destination_options(&self) -> &[Destination] {
        self.selected_trip().map(|t| t.destinations.as_slice()).unwrap_or(&[])
    }

    pub fn cycle_media(&mut self, forward: bool) {
        let len = self.item.media.len();
        if len == 0 {
            return;
        }
        self.view.media_index = if forward {
            (self.view.media_index + 1) % len
        } else {
            (self.view.media_index + len - 1) % len
        };
    }

    /// Selects candidate trip `index` (0-based); a new trip clears the destination.
    pub fn select_trip(&mut self, index: usize) -> bool {
        let Some(trip_id) = self.item.trip_suggestions.get(index).map(|t| t.trip_id) else {
            return false;
        };
        if self.view.trip_id != Some(trip_id) {
            self.view.destination_id = None;
        }
        self.view.trip_id = Some(trip_id);
        true
    }

    pub fn select_destination(&mut self, index: usize) -> bool {
        let Some(dest_id) = self.destination_options().get(index).map(|d| d.id) else {
            return false;
        };
        self.view.destination_id = Some(dest_id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.view.trip_id = None;
        self.view.destination_id = None;
    }

    pub fn toggle_aerial(&mut self) {
        self.view.is_aerial = !self.view.is_aerial;
    }

    pub fn toggle_cover(&mut self) {
        self.view.is_cover = !self.view.is_cover;
    }

    pub fn classification(&self) -> Classification {
        let cover_media_id = if self.view.is_cover {
            self.item.media.get(self.view.media_index).map(|m| m.id)
        } else {
            None
        };
        Classification {
            trip_id: self.view.trip_id,
            destination_id: self.view.destination_id,
            is_aerial: self.view.is_aerial,
            is_cover: self.view.is_cover,
            cover_media_id,
        }
    }
}

/// Holds the active item and its declared neighbours; every move goes through here.
pub struct NavigationCursor {
    origin: Arc<dyn OriginApi>,
    cache: Arc<FeedItemCache>,
    prefetcher: ChainPrefetcher,
    prefetch_depth: u32,
    state: CursorState,
    active: Option<ActiveItem>,
}

impl NavigationCursor {
    pub fn new(origin: Arc<dyn OriginApi>, cache: Arc<FeedItemCache>, prefetch_depth: u32) -> Self {
        let prefetcher = ChainPrefetcher::new(origin.clone(), cache.clone());
        Self { origin, cache, prefetcher, prefetch_depth, state: CursorState::Idle, active: None }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn active(&self) -> Option<&ActiveItem> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveItem> {
        self.active.as_mut()
    }

    pub fn next_id(&self) -> Option<&str> {
        self.active.as_ref().and_then(|a| a.edge.next_id.as_deref())
    }

    pub fn prev_id(&self) -> Option<&str> {
        self.active.as_ref().and_then(|a| a.edge.prev_id.as_deref())
    }

    /// Swaps in an empty cache. Prefetches still running keep writing into the old one,
    /// which is dropped once they finish.
    pub fn reset_cache(&mut self) {
        let fresh = Arc::new(self.cache.successor());
        self.prefetcher = ChainPrefetcher::new(self.origin.clone(), fresh.clone());
        self.cache = fresh;
    }

    /// Evicts `id` after its label changed, including copies still being fetched.
    pub fn forget(&self, id: &str) {
        self.cache.invalidate(id);
    }

    /// Makes `id` the active item, consuming a cached copy when one exists.
    ///
    /// On a failed fetch the previous active item stays in place.
    pub async fn move_to(&mut self, id: &str) -> Result<MoveSource, OriginError> {
        let log = telemetry::navigate();

        let (item, source) = match self.cache.take(id) {
            Some(item) => (item, MoveSource::Cache),
            None => {
                self.state = CursorState::Loading;
                let span = log.span_kv(&NavPhase::FetchItem, [("id", id.to_string())]);
                match self.origin.item(id).instrument(span).await {
                    Ok(item) => (item, MoveSource::Network),
                    Err(err) => {
                        self.state = if self.active.is_some() { CursorState::Ready } else { CursorState::Idle };
                        log.warn_kv("item fetch failed", [("id", id.to_string()), ("reason", err.to_string())]);
                        return Err(err);
                    }
                }
            }
        };

        let view = ViewState::derive(&item);
        self.active = Some(ActiveItem { item, view, edge: NavigationEdge::default(), source });
        self.state = CursorState::Ready;
        self.on_ready(id).await;
        log.debug_kv(
            "active item",
            [("id", id.to_string()), ("source", format!("{source:?}")), ("cached", self.cache.len().to_string())],
        );
        Ok(source)
    }

    /// Re-reads the active item's edges; the feed may have shifted since it was loaded.
    pub async fn refresh_edges(&mut self) -> Option<String> {
        let id = self.active.as_ref()?.id().to_string();
        match self.origin.navigation(&id).await {
            Ok(edge) => {
                let next = edge.next_id.clone();
                if let Some(active) = self.active.as_mut().filter(|a| a.id() == id) {
                    active.edge = edge;
                }
                next
            }
            Err(err) => {
                telemetry::navigate().warn_kv("edge refresh failed", [("id", id), ("reason", err.to_string())]);
                None
            }
        }
    }

    pub async fn move_next(&mut self) -> Result<bool, OriginError> {
        if self.state == CursorState::Loading {
            return Ok(false);
        }
        let Some(next) = self.next_id().map(str::to_string) else { return Ok(false) };
        self.move_to(&next).await.map(|_| true)
    }

    pub async fn move_previous(&mut self) -> Result<bool, OriginError> {
        if self.state == CursorState::Loading {
            return Ok(false);
        }
        let Some(prev) = self.prev_id().map(str::to_string) else { return Ok(false) };
        self.move_to(&prev).await.map(|_| true)
    }

    async fn on_ready(&mut self, id: &str) {
        let span = telemetry::navigate().span_kv(&NavPhase::Edges, [("id", id.to_string())]);
        let edge = match self.origin.navigation(id).instrument(span).await {
            Ok(edge) => edge,
            Err(err) => {
                telemetry::navigate().warn_kv("edge fetch failed", [("id", id.to_string()), ("reason", err.to_string())]);
                NavigationEdge::default()
            }
        };
        if let Some(next) = edge.next_id.clone() {
            self.prefetcher.spawn_ahead(next, self.prefetch_depth);
        }
        if let Some(prev) = edge.prev_id.clone() {
            self.prefetcher.spawn_item(prev);
        }
        if let Some(active) = self.active.as_mut() {
            self.prefetcher.warm_media(&active.item);
            active.edge = edge;
        }
    }
}
