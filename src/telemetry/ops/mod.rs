pub mod backfill;
pub mod ingest;
pub mod label;
pub mod navigate;
pub mod show;
pub mod stats;
