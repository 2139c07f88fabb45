use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use crate::config::LabelerConfig;
use crate::navigator::events::{self, EventBus, NavigatorEvent};
use crate::navigator::ingest::IngestionOrchestrator;
use crate::origin::OriginApi;
use crate::telemetry;

/// `labeler ingest`: pull more items from the upstream feed now.
#[derive(Args, Debug)]
pub struct IngestCmd {
    /// Number of items to request (defaults to LABELER_TOP_UP_COUNT)
    #[arg(long)]
    pub count: Option<u32>,
}

/// `labeler sync`: pull the newest items the upstream has published.
#[derive(Args, Debug)]
pub struct SyncCmd {}

#[derive(Serialize)]
struct IngestResult {
    requested: Option<u32>,
    fetched: u64,
    quota_limited: bool,
}

pub async fn run(origin: Arc<dyn OriginApi>, cfg: &LabelerConfig, args: IngestCmd) -> Result<()> {
    let count = args.count.unwrap_or(cfg.top_up_count);
    let log = telemetry::ingest();
    let _g = log.root_span_kv([("count", count.to_string())]).entered();
    fetch(origin, cfg, Some(count)).await
}

pub async fn run_sync(origin: Arc<dyn OriginApi>, cfg: &LabelerConfig, _args: SyncCmd) -> Result<()> {
    let log = telemetry::ingest();
    let _g = log.root_span_kv([("mode", "sync".to_string())]).entered();
    fetch(origin, cfg, None).await
}

async fn fetch(origin: Arc<dyn OriginApi>, cfg: &LabelerConfig, count: Option<u32>) -> Result<()> {
    let started = Instant::now();
    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let orchestrator = IngestionOrchestrator::new(origin, bus, cfg.low_water_mark, cfg.top_up_count);

    let fetched = match count {
        Some(n) => orchestrator.ingest_more(n).await,
        None => orchestrator.sync_newest().await,
    };

    // a failed ingestion is reported as a notice rather than an error value
    for event in events::drain(&mut rx) {
        if let NavigatorEvent::Notice(notice) = event {
            bail!(notice.text);
        }
    }

    let res = IngestResult { requested: count, fetched, quota_limited: orchestrator.quota().is_limited() };
    telemetry::ingest().result(&res, started)
}
