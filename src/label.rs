use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::Instrument;

use crate::origin::{Classification, FeedStats, LabelDecision, OriginApi};
use crate::telemetry;
use crate::telemetry::ops::label::Phase as LabelPhase;

/// `labeler label <id>`: commit one decision without opening a session.
#[derive(Args, Debug)]
pub struct LabelCmd {
    /// External identifier of the item
    pub id: String,
    /// Mark the item as skipped instead of labeling it
    #[arg(long, conflicts_with_all = ["trip", "destination", "aerial", "cover", "cover_media"])]
    pub skip: bool,
    #[arg(long)]
    pub trip: Option<i64>,
    #[arg(long)]
    pub destination: Option<i64>,
    #[arg(long)]
    pub aerial: bool,
    #[arg(long)]
    pub cover: bool,
    /// Media id used as the trip cover; implies --cover
    #[arg(long)]
    pub cover_media: Option<i64>,
}

impl LabelCmd {
    fn decision(&self) -> LabelDecision {
        if self.skip {
            return LabelDecision::Skip;
        }
        LabelDecision::Accept(Classification {
            trip_id: self.trip,
            destination_id: self.destination,
            is_aerial: self.aerial,
            is_cover: self.cover || self.cover_media.is_some(),
            cover_media_id: self.cover_media,
        })
    }
}

#[derive(Serialize)]
struct LabelResult {
    id: String,
    skipped: bool,
    stats: Option<FeedStats>,
}

pub async fn run(origin: Arc<dyn OriginApi>, args: LabelCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::label();
    let _g = log.root_span_kv([("id", args.id.clone()), ("skip", args.skip.to_string())]).entered();

    let decision = args.decision();
    origin
        .commit_label(&args.id, &decision)
        .instrument(log.span(&LabelPhase::Submit))
        .await
        .with_context(|| format!("Label for {} was rejected", args.id))?;

    let stats = match origin.stats().instrument(log.span(&LabelPhase::RefreshStats)).await {
        Ok(stats) => Some(stats),
        Err(err) => {
            log.warn_kv("stats refresh failed", [("reason", err.to_string())]);
            None
        }
    };
    log.result(&LabelResult { id: args.id, skipped: decision.is_skip(), stats }, started)
}
