use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;

use super::types::{
    BackfillMessage, FeedItem, FeedStats, FetchReport, LabelDecision, LabelState, Media,
    NavigationEdge,
};
use super::{BackfillStream, OriginApi, OriginError};

/// Scripted response for the next `ingest` call.
#[derive(Debug, Clone)]
pub enum IngestScript {
    /// Appends these items to the tail of the feed and reports them as fetched.
    Fetched(Vec<FeedItem>),
    RateLimited,
    Fails(StatusCode, String),
}

#[derive(Debug, Clone)]
pub enum BackfillScript {
    Message(BackfillMessage),
    TransportError(String),
}

#[derive(Default)]
struct MockState {
    order: Vec<String>,
    items: HashMap<String, FeedItem>,
    failing_items: HashSet<String>,
    ingest_script: VecDeque<IngestScript>,
    backfill_script: Vec<BackfillScript>,
    reject_commit: Option<(StatusCode, String)>,
    item_fetches: Vec<String>,
    navigation_calls: Vec<String>,
    media_prefetches: Vec<String>,
    ingest_calls: Vec<u32>,
    sync_calls: usize,
    commits: Vec<(String, LabelDecision)>,
    backfill_opened: usize,
}

/// In-memory origin with a fixed feed order, used by the navigator tests.
#[derive(Default)]
pub struct MockOrigin {
    state: Mutex<MockState>,
    backfill_closed: Arc<AtomicUsize>,
}

pub fn sample_item(id: &str, internal_id: i64) -> FeedItem {
    FeedItem {
        external_id: id.to_string(),
        internal_id,
        media: vec![Media { id: internal_id * 10, media_type: Some("image".into()), width: None, height: None }],
        caption: Some(format!("caption {id}")),
        location: None,
        taken_at: None,
        label_state: LabelState::Unlabeled,
        destination_id: None,
        trip_id: None,
        is_aerial: false,
        is_cover: false,
        cover_media_id: None,
        trip_suggestions: Vec::new(),
    }
}

impl MockOrigin {
    pub fn with_feed(ids: &[&str]) -> Self {
        let mock = MockOrigin::default();
        for (i, id) in ids.iter().enumerate() {
            mock.push_item(sample_item(id, i as i64 + 1));
        }
        mock
    }

    pub fn push_item(&self, item: FeedItem) {
        let mut st = self.state.lock().unwrap();
        st.order.push(item.external_id.clone());
        st.items.insert(item.external_id.clone(), item);
    }

    pub fn replace_item(&self, item: FeedItem) {
        self.state.lock().unwrap().items.insert(item.external_id.clone(), item);
    }

    pub fn fail_item(&self, id: &str) {
        self.state.lock().unwrap().failing_items.insert(id.to_string());
    }

    pub fn script_ingest(&self, script: IngestScript) {
        self.state.lock().unwrap().ingest_script.push_back(script);
    }

    pub fn script_backfill(&self, script: Vec<BackfillScript>) {
        self.state.lock().unwrap().backfill_script = script;
    }

    pub fn reject_next_commit(&self, status: StatusCode, message: &str) {
        self.state.lock().unwrap().reject_commit = Some((status, message.to_string()));
    }

    pub fn set_label(&self, id: &str, state: LabelState) {
        if let Some(item) = self.state.lock().unwrap().items.get_mut(id) {
            item.label_state = state;
        }
    }

    pub fn item_fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().item_fetches.clone()
    }

    pub fn navigation_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().navigation_calls.clone()
    }

    pub fn media_prefetches(&self) -> Vec<String> {
        self.state.lock().unwrap().media_prefetches.clone()
    }

    pub fn ingest_calls(&self) -> Vec<u32> {
        self.state.lock().unwrap().ingest_calls.clone()
    }

    pub fn sync_calls(&self) -> usize {
        self.state.lock().unwrap().sync_calls
    }

    pub fn commits(&self) -> Vec<(String, LabelDecision)> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn backfill_opened(&self) -> usize {
        self.state.lock().unwrap().backfill_opened
    }

    pub fn backfill_closed(&self) -> usize {
        self.backfill_closed.load(Ordering::SeqCst)
    }

    pub fn label_state(&self, id: &str) -> Option<LabelState> {
        self.state.lock().unwrap().items.get(id).map(|i| i.label_state)
    }

    fn not_found(id: &str) -> OriginError {
        OriginError::Api { status: StatusCode::NOT_FOUND, message: format!("item {id} not found") }
    }

    fn first_with(&self, state: LabelState) -> Option<String> {
        let st = self.state.lock().unwrap();
        st.order.iter().find(|id| st.items[*id].label_state == state).cloned()
    }
}

struct CloseCounter(Arc<AtomicUsize>);

impl Drop for CloseCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OriginApi for MockOrigin {
    async fn stats(&self) -> Result<FeedStats, OriginError> {
        let st = self.state.lock().unwrap();
        let mut stats = FeedStats { total: st.items.len() as u64, ..FeedStats::default() };
        for item in st.items.values() {
            match item.label_state {
                LabelState::Unlabeled => stats.unlabeled += 1,
                LabelState::Labeled => stats.labeled += 1,
                LabelState::Skipped => stats.skipped += 1,
            }
        }
        Ok(stats)
    }

    async fn item(&self, id: &str) -> Result<FeedItem, OriginError> {
        let mut st = self.state.lock().unwrap();
        st.item_fetches.push(id.to_string());
        if st.failing_items.contains(id) {
            return Err(OriginError::Api { status: StatusCode::INTERNAL_SERVER_ERROR, message: "boom".into() });
        }
        st.items.get(id).cloned().ok_or_else(|| Self::not_found(id))
    }

    async fn navigation(&self, id: &str) -> Result<NavigationEdge, OriginError> {
        let mut st = self.state.lock().unwrap();
        st.navigation_calls.push(id.to_string());
        let pos = st.order.iter().position(|x| x == id).ok_or_else(|| Self::not_found(id))?;
        Ok(NavigationEdge {
            prev_id: pos.checked_sub(1).map(|p| st.order[p].clone()),
            next_id: st.order.get(pos + 1).cloned(),
        })
    }

    async fn most_recent_id(&self) -> Result<Option<String>, OriginError> {
        Ok(self.state.lock().unwrap().order.last().cloned())
    }

    async fn first_unprocessed_id(&self) -> Result<Option<String>, OriginError> {
        Ok(self.first_with(LabelState::Unlabeled))
    }

    async fn first_skipped_id(&self) -> Result<Option<String>, OriginError> {
        Ok(self.first_with(LabelState::Skipped))
    }

    async fn ingest(&self, count: u32) -> Result<FetchReport, OriginError> {
        let script = {
            let mut st = self.state.lock().unwrap();
            st.ingest_calls.push(count);
            st.ingest_script.pop_front().unwrap_or(IngestScript::Fetched(Vec::new()))
        };
        match script {
            IngestScript::Fetched(items) => {
                let fetched = items.len() as u64;
                for item in items {
                    self.push_item(item);
                }
                Ok(FetchReport { fetched })
            }
            IngestScript::RateLimited => Err(OriginError::Api {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: "Too Many Requests".into(),
            }),
            IngestScript::Fails(status, message) => Err(OriginError::Api { status, message }),
        }
    }

    async fn sync_newest(&self) -> Result<FetchReport, OriginError> {
        self.state.lock().unwrap().sync_calls += 1;
        Ok(FetchReport { fetched: 0 })
    }

    async fn commit_label(&self, id: &str, decision: &LabelDecision) -> Result<(), OriginError> {
        let mut st = self.state.lock().unwrap();
        if let Some((status, message)) = st.reject_commit.take() {
            return Err(OriginError::Api { status, message });
        }
        let item = st.items.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        match decision {
            LabelDecision::Skip => item.label_state = LabelState::Skipped,
            LabelDecision::Accept(c) => {
                item.label_state = LabelState::Labeled;
                item.trip_id = c.trip_id;
                item.destination_id = c.destination_id;
                item.is_aerial = c.is_aerial;
                item.is_cover = c.is_cover;
                item.cover_media_id = c.cover_media_id;
            }
        }
        st.commits.push((id.to_string(), decision.clone()));
        Ok(())
    }

    async fn open_backfill(&self) -> Result<BackfillStream, OriginError> {
        let script = {
            let mut st = self.state.lock().unwrap();
            st.backfill_opened += 1;
            st.backfill_script.clone()
        };
        let guard = CloseCounter(self.backfill_closed.clone());
        let items = script.into_iter().map(|entry| match entry {
            BackfillScript::Message(msg) => Ok(msg),
            BackfillScript::TransportError(reason) => Err(OriginError::Stream(reason)),
        });
        // the guard lives in the stream state, so dropping the stream counts as one close
        let stream = futures::stream::unfold((items, guard), |(mut items, guard)| async move {
            items.next().map(|item| (item, (items, guard)))
        });
        Ok(stream.boxed())
    }

    fn media_url(&self, item: &FeedItem, index: usize) -> String {
        format!("mock://media/{}/{}", item.internal_id, index)
    }

    async fn prefetch_media(&self, url: &str) -> Result<(), OriginError> {
        self.state.lock().unwrap().media_prefetches.push(url.to_string());
        Ok(())
    }
}
