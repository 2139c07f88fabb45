use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::Instrument;

use crate::origin::OriginApi;
use crate::telemetry;
use crate::telemetry::ops::stats::Phase as StatsPhase;

/// `labeler stats`: aggregate label counts of the whole feed.
#[derive(Args, Debug)]
pub struct StatsCmd {}

pub async fn run(origin: Arc<dyn OriginApi>, _args: StatsCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::stats();
    let _g = log.root_span().entered();

    let stats = origin
        .stats()
        .instrument(log.span(&StatsPhase::Fetch))
        .await
        .context("Failed to fetch feed stats")?;

    let _s = log.span(&StatsPhase::Show).entered();
    log.result(&stats, started)
}
