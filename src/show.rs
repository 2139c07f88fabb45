use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::Instrument;

use crate::navigator::cursor::ViewState;
use crate::origin::{FeedItem, NavigationEdge, OriginApi};
use crate::telemetry;
use crate::telemetry::ops::show::Phase as ShowPhase;

/// `labeler show <id>`: one item, its neighbours and the view the navigator would open on.
#[derive(Args, Debug)]
pub struct ShowCmd {
    /// External identifier of the item
    pub id: String,
}

#[derive(Serialize)]
struct ShowResult {
    item: FeedItem,
    edge: NavigationEdge,
    view: ViewState,
    media_urls: Vec<String>,
}

pub async fn run(origin: Arc<dyn OriginApi>, args: ShowCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::show();
    let _g = log.root_span_kv([("id", args.id.clone())]).entered();

    let item = origin
        .item(&args.id)
        .instrument(log.span(&ShowPhase::Item))
        .await
        .with_context(|| format!("Failed to fetch item {}", args.id))?;
    let edge = origin
        .navigation(&args.id)
        .instrument(log.span(&ShowPhase::Edges))
        .await
        .with_context(|| format!("Failed to fetch navigation for {}", args.id))?;

    let media_urls = (0..item.media.len()).map(|i| origin.media_url(&item, i)).collect();
    let res = ShowResult { view: ViewState::derive(&item), item, edge, media_urls };
    log.result(&res, started)
}
