use std::sync::Arc;

use tracing::Instrument;

use crate::origin::{FeedStats, LabelDecision, OriginApi, OriginError};
use crate::telemetry;
use crate::telemetry::ops::label::Phase as LabelPhase;
use crate::telemetry::ops::navigate::Phase as NavPhase;

use super::cursor::NavigationCursor;
use super::events::{EventBus, NavigatorEvent, Notice};
use super::ingest::IngestionOrchestrator;

pub const NO_MORE_ITEMS: &str = "No more items available";

/// Where the cursor ended up after a successful commit. Exactly one per commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    MovedToNext(String),
    MovedAfterIngest(String),
    JumpedToFirstUnprocessed(String),
    NoMoreItems,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub outcome: CommitOutcome,
    /// Fresh aggregate counts, absent when the refresh itself failed.
    pub stats: Option<FeedStats>,
}

/// Submits a label decision and then picks the next item to show.
#[derive(Clone)]
pub struct LabelCommitter {
    origin: Arc<dyn OriginApi>,
    ingestion: IngestionOrchestrator,
    events: EventBus<NavigatorEvent>,
}

impl LabelCommitter {
    pub fn new(origin: Arc<dyn OriginApi>, ingestion: IngestionOrchestrator, events: EventBus<NavigatorEvent>) -> Self {
        Self { origin, ingestion, events }
    }

    /// A rejected decision returns the origin's error and leaves the cursor where it is.
    pub async fn commit(
        &self,
        cursor: &mut NavigationCursor,
        id: &str,
        decision: &LabelDecision,
    ) -> Result<CommitReport, OriginError> {
        let log = telemetry::label();
        let submit = log.span_kv(&LabelPhase::Submit, [("id", id.to_string()), ("skip", decision.is_skip().to_string())]);
        self.origin.commit_label(id, decision).instrument(submit).await?;
        cursor.forget(id);
        log.info_kv("label committed", [("id", id.to_string())]);

        let stats = match self.origin.stats().instrument(log.span(&LabelPhase::RefreshStats)).await {
            Ok(stats) => Some(stats),
            Err(err) => {
                log.warn_kv("stats refresh failed", [("reason", err.to_string())]);
                None
            }
        };

        let outcome = self.advance(cursor).instrument(log.span(&LabelPhase::Advance)).await?;
        if let (CommitOutcome::MovedToNext(_), Some(stats)) = (&outcome, stats) {
            self.ingestion.maybe_top_up(stats.unlabeled);
        }
        log.debug_kv("commit outcome", [("outcome", format!("{outcome:?}"))]);
        Ok(CommitReport { outcome, stats })
    }

    async fn advance(&self, cursor: &mut NavigationCursor) -> Result<CommitOutcome, OriginError> {
        if let Some(next) = cursor.next_id().map(str::to_string) {
            cursor.move_to(&next).await?;
            return Ok(CommitOutcome::MovedToNext(next));
        }

        let log = telemetry::label();
        let fallback = log.span(&LabelPhase::Fallback);
        let fetched = self.ingestion.ingest_more(self.ingestion.top_up_count()).instrument(fallback).await;
        if fetched > 0 {
            // new items may have shifted the current item's position
            if let Some(next) = cursor.refresh_edges().await {
                cursor.move_to(&next).await?;
                return Ok(CommitOutcome::MovedAfterIngest(next));
            }
        }
        self.jump_to_first_unprocessed(cursor).await
    }

    /// Moves to the oldest unlabeled item, ingesting once more if the origin has none.
    pub async fn jump_to_first_unprocessed(&self, cursor: &mut NavigationCursor) -> Result<CommitOutcome, OriginError> {
        let span = telemetry::navigate().span_kv(&NavPhase::Jump, [("to", "first_unprocessed".to_string())]);
        let mut target = self.origin.first_unprocessed_id().instrument(span.clone()).await?;
        if target.is_none() {
            self.ingestion.ingest_more(self.ingestion.top_up_count()).await;
            target = self.origin.first_unprocessed_id().instrument(span).await?;
        }
        match target {
            Some(id) => {
                cursor.move_to(&id).await?;
                Ok(CommitOutcome::JumpedToFirstUnprocessed(id))
            }
            None => {
                self.events.publish(NavigatorEvent::Notice(Notice::info(NO_MORE_ITEMS)));
                Ok(CommitOutcome::NoMoreItems)
            }
        }
    }

    /// Returns the id moved to, or `None` when nothing is skipped.
    pub async fn jump_to_first_skipped(&self, cursor: &mut NavigationCursor) -> Result<Option<String>, OriginError> {
        let span = telemetry::navigate().span_kv(&NavPhase::Jump, [("to", "first_skipped".to_string())]);
        let Some(id) = self.origin.first_skipped_id().instrument(span).await? else {
            self.events.publish(NavigatorEvent::Notice(Notice::info("No skipped items")));
            return Ok(None);
        };
        cursor.move_to(&id).await?;
        Ok(Some(id))
    }
}
