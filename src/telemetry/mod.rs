pub mod config;
pub mod ctx;
pub mod ops;

use ctx::LogCtx;

pub fn navigate() -> LogCtx<ops::navigate::Navigate> { LogCtx::new(config::logs_are_json()) }
pub fn ingest() -> LogCtx<ops::ingest::Ingest> { LogCtx::new(config::logs_are_json()) }
pub fn backfill() -> LogCtx<ops::backfill::Backfill> { LogCtx::new(config::logs_are_json()) }
pub fn label() -> LogCtx<ops::label::Label> { LogCtx::new(config::logs_are_json()) }
pub fn show() -> LogCtx<ops::show::Show> { LogCtx::new(config::logs_are_json()) }
pub fn stats() -> LogCtx<ops::stats::Stats> { LogCtx::new(config::logs_are_json()) }
