use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use crate::navigator::backfill::{BackfillEvent, BackfillProgress, BackfillRun};
use crate::origin::OriginApi;
use crate::telemetry;

/// `labeler backfill`: scan the origin feed for missing items. Ctrl-C dismisses the scan.
#[derive(Args, Debug)]
pub struct BackfillCmd {}

#[derive(Serialize)]
struct BackfillResult {
    fetched: u64,
    checked: u64,
    pages: u64,
    summary: String,
    dismissed: bool,
}

pub async fn run(origin: Arc<dyn OriginApi>, _args: BackfillCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::backfill();
    let _g = log.root_span().entered();

    let mut run = BackfillRun::start(origin).await.context("Failed to open backfill stream")?;
    let mut last = BackfillProgress::default();
    let mut ctrl_c = std::pin::pin!(tokio::signal::ctrl_c());
    let mut interrupted = false;

    loop {
        let event = tokio::select! {
            event = run.next() => event,
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                run.close();
                continue;
            }
        };
        let res = match event {
            Some(BackfillEvent::Progress(progress)) => {
                last = progress;
                continue;
            }
            Some(BackfillEvent::Finished { progress, summary }) => BackfillResult {
                fetched: progress.fetched,
                checked: progress.checked,
                pages: progress.page,
                summary,
                dismissed: false,
            },
            Some(BackfillEvent::Dismissed) => BackfillResult {
                fetched: last.fetched,
                checked: last.checked,
                pages: last.page,
                summary: "Backfill dismissed".to_string(),
                dismissed: true,
            },
            Some(BackfillEvent::Failed(reason)) => bail!("Backfill failed: {reason}"),
            Some(BackfillEvent::ConnectionLost(reason)) => bail!("Backfill connection lost: {reason}"),
            None => bail!("Backfill ended without a result"),
        };
        return log.result(&res, started);
    }
}
