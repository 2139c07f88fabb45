use async_trait::async_trait;
use futures::stream::BoxStream;

mod client;
mod error;
#[cfg(test)]
pub mod mock;
pub mod sse;
pub mod types;

pub use client::{OriginClient, OriginClientConfig};
pub use error::OriginError;
pub use types::{
    BackfillMessage, Classification, Destination, FeedItem, FeedStats, FetchReport, LabelDecision,
    LabelState, Media, NavigationEdge, TripSuggestion,
};

pub type BackfillStream = BoxStream<'static, Result<BackfillMessage, OriginError>>;

/// The REST surface of the service that owns the feed and its labels.
#[async_trait]
pub trait OriginApi: Send + Sync {
    async fn stats(&self) -> Result<FeedStats, OriginError>;
    async fn item(&self, id: &str) -> Result<FeedItem, OriginError>;
    async fn navigation(&self, id: &str) -> Result<NavigationEdge, OriginError>;
    async fn most_recent_id(&self) -> Result<Option<String>, OriginError>;
    async fn first_unprocessed_id(&self) -> Result<Option<String>, OriginError>;
    async fn first_skipped_id(&self) -> Result<Option<String>, OriginError>;
    async fn ingest(&self, count: u32) -> Result<FetchReport, OriginError>;
    async fn sync_newest(&self) -> Result<FetchReport, OriginError>;
    async fn commit_label(&self, id: &str, decision: &LabelDecision) -> Result<(), OriginError>;
    async fn open_backfill(&self) -> Result<BackfillStream, OriginError>;

    /// Location of one media asset, addressed through the item's internal id.
    fn media_url(&self, item: &FeedItem, index: usize) -> String;
    /// Downloads and discards a media asset so the HTTP layer below has it warm.
    async fn prefetch_media(&self, url: &str) -> Result<(), OriginError>;
}
