use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::config::LabelerConfig;
use crate::navigator::events::{AppSignal, EventBus};
use crate::navigator::keymap::{self, HELP};
use crate::navigator::{Flow, Navigator};
use crate::origin::{FeedStats, OriginApi};
use crate::telemetry;

/// `labeler navigate`: interactive labeling session, one key token per stdin line.
#[derive(Args, Debug)]
pub struct NavigateCmd {
    /// External identifier to open on instead of the first unprocessed item
    #[arg(long)]
    pub start: Option<String>,
}

#[derive(Serialize)]
struct SessionResult {
    last_item: Option<String>,
    stats: Option<FeedStats>,
}

pub async fn run(
    origin: Arc<dyn OriginApi>,
    cfg: &LabelerConfig,
    signals: &EventBus<AppSignal>,
    args: NavigateCmd,
) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::navigate();
    let _g = log.root_span_kv([("start", format!("{:?}", args.start))]).entered();

    let mut nav = Navigator::new(origin, cfg);
    nav.open(args.start.as_deref()).await?;
    println!("{}\n{}", nav.render(), HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut signals = signals.subscribe();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(action) = keymap::parse_key(&line) else {
                    log.warn_kv("unknown key", [("key", line.trim().to_string())]);
                    continue;
                };
                if nav.handle(action).await == Flow::Quit {
                    break;
                }
            }
            event = nav.next_backfill_event() => nav.apply_backfill(event).await,
            signal = signals.recv() => match signal {
                Ok(signal) => nav.on_signal(signal).await,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => continue,
            },
        }
        println!("{}", nav.render());
    }

    let res = SessionResult {
        last_item: nav.cursor().active().map(|a| a.id().to_string()),
        stats: nav.stats().copied(),
    };
    drop(nav);
    log.result(&res, started)
}
