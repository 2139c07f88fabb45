use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Navigate;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Open, Move, FetchItem, Edges, Prefetch, Jump }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Open => "open",
        Phase::Move => "move",
        Phase::FetchItem => "fetch_item",
        Phase::Edges => "edges",
        Phase::Prefetch => "prefetch",
        Phase::Jump => "jump",
    }}
    fn span(&self) -> Span { match self {
        Phase::Open => info_span!("open"),
        Phase::Move => info_span!("move"),
        Phase::FetchItem => info_span!("fetch_item"),
        Phase::Edges => info_span!("edges"),
        Phase::Prefetch => info_span!("prefetch"),
        Phase::Jump => info_span!("jump"),
    }}
}

impl OpMarker for Navigate {
    const NAME: &'static str = "navigate";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("navigate") }
}
