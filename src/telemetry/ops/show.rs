use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Show;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Item, Edges }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Item => "item", Phase::Edges => "edges" } }
    fn span(&self) -> Span { match self { Phase::Item => info_span!("item"), Phase::Edges => info_span!("edges") } }
}

impl OpMarker for Show {
    const NAME: &'static str = "show";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("show") }
}
