use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Label;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Submit, RefreshStats, Advance, Fallback }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Submit => "submit",
        Phase::RefreshStats => "refresh_stats",
        Phase::Advance => "advance",
        Phase::Fallback => "fallback",
    }}
    fn span(&self) -> Span { match self {
        Phase::Submit => info_span!("submit"),
        Phase::RefreshStats => info_span!("refresh_stats"),
        Phase::Advance => info_span!("advance"),
        Phase::Fallback => info_span!("fallback"),
    }}
}

impl OpMarker for Label {
    const NAME: &'static str = "label";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("label") }
}
