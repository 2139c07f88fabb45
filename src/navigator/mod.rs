//! The interactive labeling session and the pieces it is built from.
//!
//! A [`Navigator`] owns its [`cache::FeedItemCache`]. Dropping the navigator drops the
//! cache, so a new session never serves items fetched by an old one. A vault signal
//! replaces the cache mid-session for the same reason.

pub mod backfill;
pub mod cache;
pub mod commit;
pub mod cursor;
pub mod events;
pub mod ingest;
pub mod keymap;
pub mod prefetch;
pub mod render;
pub mod status;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::LabelerConfig;
use crate::origin::{FeedStats, LabelDecision, OriginApi};
use crate::telemetry;
use crate::telemetry::ops::navigate::Phase as NavPhase;

use backfill::{BackfillEvent, BackfillProgress, BackfillRun};
use cache::FeedItemCache;
use commit::{CommitOutcome, LabelCommitter};
use cursor::NavigationCursor;
use events::{AppSignal, EventBus, NavigatorEvent, Notice};
use ingest::IngestionOrchestrator;
use keymap::Action;
use status::StatusLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Navigator {
    origin: Arc<dyn OriginApi>,
    cursor: NavigationCursor,
    ingestion: IngestionOrchestrator,
    committer: LabelCommitter,
    events: EventBus<NavigatorEvent>,
    inbox: broadcast::Receiver<NavigatorEvent>,
    status: StatusLine,
    stats: Option<FeedStats>,
    backfill: Option<BackfillRun>,
    backfill_progress: Option<BackfillProgress>,
    notice_ttl: Duration,
}

impl Navigator {
    pub fn new(origin: Arc<dyn OriginApi>, cfg: &LabelerConfig) -> Self {
        let cache = Arc::new(FeedItemCache::new());
        let events = EventBus::default();
        let inbox = events.subscribe();
        let ingestion = IngestionOrchestrator::new(origin.clone(), events.clone(), cfg.low_water_mark, cfg.top_up_count);
        let committer = LabelCommitter::new(origin.clone(), ingestion.clone(), events.clone());
        Self {
            cursor: NavigationCursor::new(origin.clone(), cache, cfg.prefetch_depth),
            origin,
            ingestion,
            committer,
            events,
            inbox,
            status: StatusLine::new(),
            stats: None,
            backfill: None,
            backfill_progress: None,
            notice_ttl: cfg.notice_ttl,
        }
    }

    pub fn cursor(&self) -> &NavigationCursor {
        &self.cursor
    }

    pub fn stats(&self) -> Option<&FeedStats> {
        self.stats.as_ref()
    }

    pub fn backfill_running(&self) -> bool {
        self.backfill.is_some()
    }

    /// Shows `start`, else the first unprocessed item, else the most recent one.
    ///
    /// Returns `false` when the feed has nothing to show.
    pub async fn open(&mut self, start: Option<&str>) -> Result<bool> {
        let span = telemetry::navigate().span_kv(&NavPhase::Open, [("start", start.unwrap_or("-").to_string())]);
        self.open_at(start).instrument(span).await
    }

    async fn open_at(&mut self, start: Option<&str>) -> Result<bool> {
        self.refresh_stats().await;
        let target = match start {
            Some(id) => Some(id.to_string()),
            None => match self.origin.first_unprocessed_id().await.context("Failed to look up first unprocessed item")? {
                Some(id) => Some(id),
                None => self.origin.most_recent_id().await.context("Failed to look up most recent item")?,
            },
        };
        let Some(id) = target else {
            self.notify(Notice::info("Feed is empty, press i to ingest"));
            return Ok(false);
        };
        self.cursor.move_to(&id).await.with_context(|| format!("Failed to open item {id}"))?;
        Ok(true)
    }

    pub async fn handle(&mut self, action: Action) -> Flow {
        match action {
            Action::Quit => return Flow::Quit,
            Action::Accept => {
                if let Some(classification) = self.cursor.active().map(|a| a.classification()) {
                    self.commit(LabelDecision::Accept(classification)).await;
                } else {
                    self.notify(Notice::warn("Nothing to label"));
                }
            }
            Action::Skip => self.commit(LabelDecision::Skip).await,
            Action::ToggleAerial => self.with_active(|a| a.toggle_aerial()),
            Action::ToggleCover => self.with_active(|a| a.toggle_cover()),
            Action::ClearSelection => self.with_active(|a| a.clear_selection()),
            Action::SelectTrip(index) => {
                if !self.edit(|a| a.select_trip(index)) {
                    self.notify(Notice::warn(format!("No trip {}", index + 1)).expiring(self.notice_ttl));
                }
            }
            Action::SelectDestination(index) => {
                if !self.edit(|a| a.select_destination(index)) {
                    self.notify(Notice::warn("No such destination for the selected trip").expiring(self.notice_ttl));
                }
            }
            Action::MediaPrevious => self.with_active(|a| a.cycle_media(false)),
            Action::MediaNext => self.with_active(|a| a.cycle_media(true)),
            Action::Previous => {
                if let Err(err) = self.cursor.move_previous().await {
                    self.notify(Notice::error(format!("Could not load item: {}", err.message())));
                }
            }
            Action::Next => {
                if let Err(err) = self.cursor.move_next().await {
                    self.notify(Notice::error(format!("Could not load item: {}", err.message())));
                }
            }
            Action::FirstUnprocessed => {
                if let Err(err) = self.committer.jump_to_first_unprocessed(&mut self.cursor).await {
                    self.notify(Notice::error(format!("Jump failed: {}", err.message())));
                }
            }
            Action::FirstSkipped => {
                if let Err(err) = self.committer.jump_to_first_skipped(&mut self.cursor).await {
                    self.notify(Notice::error(format!("Jump failed: {}", err.message())));
                }
            }
            Action::Ingest => {
                let fetched = self.ingestion.ingest_more(self.ingestion.top_up_count()).await;
                self.after_fetch(fetched).await;
            }
            Action::Sync => {
                let fetched = self.ingestion.sync_newest().await;
                self.after_fetch(fetched).await;
            }
            Action::StartBackfill => self.start_backfill().await,
            Action::DismissBackfill => match &self.backfill {
                Some(run) => run.close(),
                None => self.notify(Notice::info("No backfill running").expiring(self.notice_ttl)),
            },
        }
        Flow::Continue
    }

    /// Waits for the running backfill's next event; pends forever when none runs.
    pub async fn next_backfill_event(&mut self) -> Option<BackfillEvent> {
        match self.backfill.as_mut() {
            Some(run) => run.next().await,
            None => std::future::pending().await,
        }
    }

    pub async fn apply_backfill(&mut self, event: Option<BackfillEvent>) {
        let Some(event) = event else {
            self.backfill = None;
            self.backfill_progress = None;
            return;
        };
        self.events.publish(NavigatorEvent::Backfill(event.clone()));
        match &event {
            BackfillEvent::Progress(progress) => self.backfill_progress = Some(*progress),
            BackfillEvent::Finished { summary, .. } => {
                self.notify(Notice::info(summary.clone()).expiring(self.notice_ttl));
                self.refresh_stats().await;
            }
            BackfillEvent::Failed(reason) => self.notify(Notice::error(format!("Backfill failed: {reason}"))),
            BackfillEvent::ConnectionLost(_) => {
                self.notify(Notice::warn("Backfill connection lost").expiring(self.notice_ttl))
            }
            BackfillEvent::Dismissed => self.notify(Notice::info("Backfill dismissed").expiring(self.notice_ttl)),
        }
        if event.is_terminal() {
            self.backfill = None;
            self.backfill_progress = None;
        }
    }

    /// Vault state changes can alter what the origin returns, so reload what is on screen.
    pub async fn on_signal(&mut self, signal: AppSignal) {
        telemetry::navigate().debug_kv("app signal", [("signal", format!("{signal:?}"))]);
        self.refresh_stats().await;
        self.cursor.reset_cache();
        let Some(id) = self.cursor.active().map(|a| a.id().to_string()) else { return };
        if let Err(err) = self.cursor.move_to(&id).await {
            self.notify(Notice::error(format!("Could not reload item: {}", err.message())));
        }
    }

    pub fn render(&mut self) -> String {
        self.absorb_events();
        let mut parts = Vec::new();
        match self.cursor.active() {
            Some(active) => parts.push(render::item_card(active)),
            None => parts.push("(no item)".to_string()),
        }
        parts.push(render::stats_line(
            self.stats.as_ref(),
            self.ingestion.quota().is_limited(),
            self.backfill_progress.as_ref(),
        ));
        let status = self.status.render();
        if !status.is_empty() {
            parts.push(status);
        }
        parts.join("\n")
    }

    async fn commit(&mut self, decision: LabelDecision) {
        let Some(id) = self.cursor.active().map(|a| a.id().to_string()) else {
            self.notify(Notice::warn("Nothing to label"));
            return;
        };
        match self.committer.commit(&mut self.cursor, &id, &decision).await {
            Ok(report) => {
                if report.stats.is_some() {
                    self.stats = report.stats;
                }
                if let CommitOutcome::JumpedToFirstUnprocessed(to) = &report.outcome {
                    self.notify(Notice::info(format!("Jumped to first unprocessed {to}")).expiring(self.notice_ttl));
                }
            }
            Err(err) => self.notify(Notice::error(format!("Label failed: {}", err.message()))),
        }
    }

    async fn after_fetch(&mut self, fetched: u64) {
        if fetched == 0 {
            if !self.ingestion.quota().is_limited() {
                self.notify(Notice::info("No new items").expiring(self.notice_ttl));
            }
            return;
        }
        self.notify(Notice::info(format!("Ingested {fetched} new items")).expiring(self.notice_ttl));
        self.refresh_stats().await;
        if self.cursor.active().is_some() {
            self.cursor.refresh_edges().await;
        } else if let Err(err) = self.committer.jump_to_first_unprocessed(&mut self.cursor).await {
            self.notify(Notice::error(format!("Jump failed: {}", err.message())));
        }
    }

    async fn start_backfill(&mut self) {
        if self.backfill.is_some() {
            self.notify(Notice::warn("Backfill already running").expiring(self.notice_ttl));
            return;
        }
        match BackfillRun::start(self.origin.clone()).await {
            Ok(run) => {
                self.backfill = Some(run);
                self.backfill_progress = Some(BackfillProgress::default());
                self.notify(Notice::info("Backfill started").expiring(self.notice_ttl));
            }
            Err(err) => self.notify(Notice::error(format!("Backfill failed to start: {}", err.message()))),
        }
    }

    async fn refresh_stats(&mut self) {
        match self.origin.stats().await {
            Ok(stats) => self.stats = Some(stats),
            Err(err) => telemetry::navigate().warn_kv("stats refresh failed", [("reason", err.to_string())]),
        }
    }

    fn with_active(&mut self, f: impl FnOnce(&mut cursor::ActiveItem)) {
        if let Some(active) = self.cursor.active_mut() {
            f(active);
        }
    }

    fn edit(&mut self, f: impl FnOnce(&mut cursor::ActiveItem) -> bool) -> bool {
        self.cursor.active_mut().map(f).unwrap_or(false)
    }

    fn notify(&mut self, notice: Notice) {
        self.events.publish(NavigatorEvent::Notice(notice));
    }

    fn absorb_events(&mut self) {
        for event in events::drain(&mut self.inbox) {
            if let NavigatorEvent::Notice(notice) = event {
                self.status.push(notice);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::origin::mock::{sample_item, BackfillScript, IngestScript, MockOrigin};
    use crate::origin::{BackfillMessage, BackfillStream, FeedItem, FetchReport, LabelState, NavigationEdge, OriginError};
    use async_trait::async_trait;
    use reqwest::StatusCode;

    /// Lets spawned background work run to completion on the test runtime.
    pub async fn settle() {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    /// Answers item requests with the state at request time, `delay` later.
    struct SlowItems {
        inner: Arc<MockOrigin>,
        delay: Duration,
    }

    #[async_trait]
    impl OriginApi for SlowItems {
        async fn stats(&self) -> Result<FeedStats, OriginError> {
            self.inner.stats().await
        }

        async fn item(&self, id: &str) -> Result<FeedItem, OriginError> {
            let snapshot = self.inner.item(id).await;
            tokio::time::sleep(self.delay).await;
            snapshot
        }

        async fn navigation(&self, id: &str) -> Result<NavigationEdge, OriginError> {
            self.inner.navigation(id).await
        }

        async fn most_recent_id(&self) -> Result<Option<String>, OriginError> {
            self.inner.most_recent_id().await
        }

        async fn first_unprocessed_id(&self) -> Result<Option<String>, OriginError> {
            self.inner.first_unprocessed_id().await
        }

        async fn first_skipped_id(&self) -> Result<Option<String>, OriginError> {
            self.inner.first_skipped_id().await
        }

        async fn ingest(&self, count: u32) -> Result<FetchReport, OriginError> {
            self.inner.ingest(count).await
        }

        async fn sync_newest(&self) -> Result<FetchReport, OriginError> {
            self.inner.sync_newest().await
        }

        async fn commit_label(&self, id: &str, decision: &LabelDecision) -> Result<(), OriginError> {
            self.inner.commit_label(id, decision).await
        }

        async fn open_backfill(&self) -> Result<BackfillStream, OriginError> {
            self.inner.open_backfill().await
        }

        fn media_url(&self, item: &FeedItem, index: usize) -> String {
            self.inner.media_url(item, index)
        }

        async fn prefetch_media(&self, url: &str) -> Result<(), OriginError> {
            self.inner.prefetch_media(url).await
        }
    }

    fn navigator(mock: &Arc<MockOrigin>) -> Navigator {
        Navigator::new(mock.clone(), &LabelerConfig::default())
    }

    fn active_id(nav: &Navigator) -> Option<String> {
        nav.cursor().active().map(|a| a.id().to_string())
    }

    #[tokio::test]
    async fn opens_on_first_unprocessed_then_most_recent() {
        let mock = Arc::new(MockOrigin::with_feed(&["A", "B", "C"]));
        mock.set_label("A", LabelState::Labeled);
        let mut nav = navigator(&mock);
        assert!(nav.open(None).await.unwrap());
        assert_eq!(active_id(&nav).as_deref(), Some("B"));
        assert_eq!(nav.stats().map(|s| s.unlabeled), Some(2));

        mock.set_label("B", LabelState::Labeled);
        mock.set_label("C", LabelState::Skipped);
        let mut nav = navigator(&mock);
        assert!(nav.open(None).await.unwrap());
        assert_eq!(active_id(&nav).as_deref(), Some("C"));

        let mut nav = navigator(&mock);
        assert!(nav.open(Some("A")).await.unwrap());
        assert_eq!(active_id(&nav).as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn empty_feed_opens_after_ingest() {
        let mock = Arc::new(MockOrigin::default());
        let mut nav = navigator(&mock);
        assert!(!nav.open(None).await.unwrap());
        assert!(nav.render().contains("Feed is empty"));

        mock.script_ingest(IngestScript::Fetched(vec![sample_item("A", 1)]));
        nav.handle(Action::Ingest).await;
        assert_eq!(active_id(&nav).as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn accept_commits_view_state_and_advances() {
        let mock = Arc::new(MockOrigin::with_feed(&["A", "B"]));
        let mut nav = navigator(&mock);
        nav.open(None).await.unwrap();
        nav.handle(Action::ToggleAerial).await;
        nav.handle(Action::Accept).await;

        let commits = mock.commits();
        assert_eq!(commits.len(), 1);
        match &commits[0].1 {
            LabelDecision::Accept(c) => assert!(c.is_aerial),
            other => panic!("unexpected decision {other:?}"),
        }
        assert_eq!(active_id(&nav).as_deref(), Some("B"));
        assert_eq!(nav.stats().map(|s| s.labeled), Some(1));
    }

    #[tokio::test]
    async fn rejected_label_surfaces_and_stays() {
        let mock = Arc::new(MockOrigin::with_feed(&["A", "B"]));
        let mut nav = navigator(&mock);
        nav.open(None).await.unwrap();
        mock.reject_next_commit(StatusCode::UNPROCESSABLE_ENTITY, "destination does not belong to trip");

        assert_eq!(nav.handle(Action::Skip).await, Flow::Continue);
        assert_eq!(active_id(&nav).as_deref(), Some("A"));
        assert!(nav.render().contains("Label failed: destination does not belong to trip"));
    }

    #[tokio::test]
    async fn second_backfill_is_rejected_until_the_first_ends() {
        let mock = Arc::new(MockOrigin::with_feed(&["A"]));
        mock.script_backfill(vec![
            BackfillScript::Message(BackfillMessage { fetched: 1, checked: 10, page: 1, ..BackfillMessage::default() }),
            BackfillScript::Message(BackfillMessage { fetched: 1, done: true, ..BackfillMessage::default() }),
        ]);
        let mut nav = navigator(&mock);
        nav.open(None).await.unwrap();

        nav.handle(Action::StartBackfill).await;
        nav.handle(Action::StartBackfill).await;
        assert_eq!(mock.backfill_opened(), 1);
        assert!(nav.render().contains("Backfill already running"));

        while nav.backfill_running() {
            let event = nav.next_backfill_event().await;
            nav.apply_backfill(event).await;
        }
        assert!(nav.render().contains("Found 1 missing"));
        assert_eq!(mock.backfill_closed(), 1);

        nav.handle(Action::StartBackfill).await;
        assert_eq!(mock.backfill_opened(), 2);
    }

    #[tokio::test]
    async fn vault_signal_reloads_the_active_item() {
        let mock = Arc::new(MockOrigin::with_feed(&["A", "B"]));
        let mut nav = navigator(&mock);
        nav.open(None).await.unwrap();
        settle().await;
        let fetches = mock.item_fetches().iter().filter(|id| *id == "A").count();

        let mut changed = sample_item("A", 1);
        changed.caption = Some("unlocked caption".into());
        mock.replace_item(changed);
        let mut neighbour = sample_item("B", 2);
        neighbour.caption = Some("unlocked neighbour".into());
        mock.replace_item(neighbour);
        nav.on_signal(AppSignal::VaultUnlocked).await;

        assert_eq!(mock.item_fetches().iter().filter(|id| *id == "A").count(), fetches + 1);
        assert!(nav.render().contains("unlocked caption"));

        // B was cached before the signal; that copy must not be served
        nav.handle(Action::Next).await;
        let active = nav.cursor().active().unwrap();
        assert_eq!(active.id(), "B");
        assert_eq!(active.item.caption.as_deref(), Some("unlocked neighbour"));
    }

    #[tokio::test(start_paused = true)]
    async fn late_prefetch_never_shadows_a_committed_label() {
        let mock = Arc::new(MockOrigin::with_feed(&["A", "B", "C"]));
        let slow = Arc::new(SlowItems { inner: mock.clone(), delay: Duration::from_millis(500) });
        let mut nav = Navigator::new(slow, &LabelerConfig::default());
        nav.open(None).await.unwrap();
        // the prefetch of B starts, then the operator overtakes it over the network
        tokio::task::yield_now().await;
        nav.handle(Action::Next).await;
        assert_eq!(active_id(&nav).as_deref(), Some("B"));
        tokio::time::sleep(Duration::from_secs(1)).await;

        nav.handle(Action::Accept).await;
        assert_eq!(active_id(&nav).as_deref(), Some("C"));
        tokio::time::sleep(Duration::from_secs(1)).await;

        nav.handle(Action::Previous).await;
        let active = nav.cursor().active().unwrap();
        assert_eq!(active.id(), "B");
        assert_eq!(mock.label_state("B"), Some(LabelState::Labeled));
        assert_eq!(active.item.label_state, LabelState::Labeled);
    }

    #[tokio::test]
    async fn sync_without_news_says_so() {
        let mock = Arc::new(MockOrigin::with_feed(&["A"]));
        let mut nav = navigator(&mock);
        nav.open(None).await.unwrap();
        nav.handle(Action::Sync).await;
        assert_eq!(mock.sync_calls(), 1);
        assert!(nav.render().contains("No new items"));
    }

    #[tokio::test]
    async fn quit_ends_the_session() {
        let mock = Arc::new(MockOrigin::with_feed(&["A"]));
        let mut nav = navigator(&mock);
        assert_eq!(nav.handle(Action::Quit).await, Flow::Quit);
    }
}
