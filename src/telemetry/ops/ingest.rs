use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Ingest;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Request, Sync, TopUp }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Request => "request",
        Phase::Sync => "sync",
        Phase::TopUp => "top_up",
    }}
    fn span(&self) -> Span { match self {
        Phase::Request => info_span!("request"),
        Phase::Sync => info_span!("sync"),
        Phase::TopUp => info_span!("top_up"),
    }}
}

impl OpMarker for Ingest {
    const NAME: &'static str = "ingest";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("ingest") }
}
