use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Backfill;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Open, Stream, Close }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Open => "open", Phase::Stream => "stream", Phase::Close => "close" } }
    fn span(&self) -> Span { match self { Phase::Open => info_span!("open"), Phase::Stream => info_span!("stream"), Phase::Close => info_span!("close") } }
}

impl OpMarker for Backfill {
    const NAME: &'static str = "backfill";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("backfill") }
}
