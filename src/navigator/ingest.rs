use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::origin::{FetchReport, OriginApi, OriginError};
use crate::telemetry;
use crate::telemetry::ops::ingest::Phase as IngestPhase;

use super::events::{EventBus, NavigatorEvent, Notice};

/// Whether the upstream is currently understood to be rate limiting us.
#[derive(Clone, Debug, Default)]
pub struct QuotaState(Arc<AtomicBool>);

impl QuotaState {
    pub fn is_limited(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `true` when the value actually changed.
    fn set(&self, limited: bool) -> bool {
        self.0.swap(limited, Ordering::SeqCst) != limited
    }
}

/// Upstream wording that signals a quota or a de facto timeout rather than a real failure.
pub fn is_quota_message(message: &str) -> bool {
    static VOCAB: OnceLock<Regex> = OnceLock::new();
    VOCAB
        .get_or_init(|| Regex::new("timeout|limit|quota").expect("static regex"))
        .is_match(message)
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn begin(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Pulls new items from the upstream on demand and tracks quota hits.
///
/// Failures never propagate: a quota hit flips [`QuotaState`], anything else becomes an
/// error notice, and both report zero items.
#[derive(Clone)]
pub struct IngestionOrchestrator {
    origin: Arc<dyn OriginApi>,
    events: EventBus<NavigatorEvent>,
    quota: QuotaState,
    in_flight: Arc<AtomicUsize>,
    low_water_mark: u64,
    top_up_count: u32,
}

enum Kind {
    Ingest(u32),
    Sync,
}

impl IngestionOrchestrator {
    pub fn new(origin: Arc<dyn OriginApi>, events: EventBus<NavigatorEvent>, low_water_mark: u64, top_up_count: u32) -> Self {
        Self {
            origin,
            events,
            quota: QuotaState::default(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            low_water_mark,
            top_up_count,
        }
    }

    pub fn quota(&self) -> &QuotaState {
        &self.quota
    }

    pub fn top_up_count(&self) -> u32 {
        self.top_up_count
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn ingest_more(&self, count: u32) -> u64 {
        let _guard = InFlight::begin(&self.in_flight);
        self.run(Kind::Ingest(count)).await
    }

    pub async fn sync_newest(&self) -> u64 {
        let _guard = InFlight::begin(&self.in_flight);
        self.run(Kind::Sync).await
    }

    /// Starts a background ingestion when the unlabeled backlog runs low and none is running.
    pub fn maybe_top_up(&self, unlabeled: u64) -> Option<JoinHandle<u64>> {
        if unlabeled >= self.low_water_mark || self.is_in_flight() {
            return None;
        }
        let guard = InFlight::begin(&self.in_flight);
        let this = self.clone();
        let count = self.top_up_count;
        let span = telemetry::ingest().span_kv(&IngestPhase::TopUp, [("unlabeled", unlabeled.to_string())]);
        Some(tokio::spawn(
            async move {
                let _guard = guard;
                this.run(Kind::Ingest(count)).await
            }
            .instrument(span),
        ))
    }

    async fn run(&self, kind: Kind) -> u64 {
        let log = telemetry::ingest();
        let (requested, result) = match kind {
            Kind::Ingest(count) => {
                let span = log.span_kv(&IngestPhase::Request, [("count", count.to_string())]);
                (count, self.origin.ingest(count).instrument(span).await)
            }
            Kind::Sync => {
                let span = log.span(&IngestPhase::Sync);
                (0, self.origin.sync_newest().instrument(span).await)
            }
        };

        match result {
            Ok(FetchReport { fetched }) => {
                log.ingested(requested, fetched);
                if self.quota.set(false) {
                    self.events.publish(NavigatorEvent::QuotaChanged { limited: false });
                }
                fetched
            }
            Err(err) => {
                self.handle_failure(&err);
                0
            }
        }
    }

    fn handle_failure(&self, err: &OriginError) {
        let message = err.message();
        if err.is_rate_limited() || is_quota_message(&message) {
            telemetry::ingest().quota_hit(&message);
            if self.quota.set(true) {
                self.events.publish(NavigatorEvent::QuotaChanged { limited: true });
            }
            return;
        }
        telemetry::ingest().warn_kv("ingest failed", [("reason", err.to_string())]);
        self.events.publish(NavigatorEvent::Notice(Notice::error(format!("Ingest failed: {message}"))));
    }
}
