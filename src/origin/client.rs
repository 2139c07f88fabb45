use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use url::Url;

use super::error::OriginError;
use super::sse::SseDecoder;
use super::types::{
    BackfillMessage, FeedItem, FeedStats, FetchReport, IdLookup, LabelDecision, NavigationEdge,
};
use super::{BackfillStream, OriginApi};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct OriginClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl OriginClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self { base_url, timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS) }
    }
}

/// HTTP implementation of [`OriginApi`].
#[derive(Clone)]
pub struct OriginClient {
    http: HttpClient,
    // the backfill body stays open for minutes; it gets no overall deadline
    stream_http: HttpClient,
    base: Url,
}

impl OriginClient {
    pub fn new(cfg: OriginClientConfig) -> Result<Self, OriginError> {
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(OriginError::from_reqwest)?;
        let stream_http = HttpClient::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(OriginError::from_reqwest)?;
        Ok(Self { http, stream_http, base: cfg.base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, OriginError> {
        let response = self.http.get(url).send().await.map_err(OriginError::from_reqwest)?;
        read_json(response).await
    }

    async fn lookup_id(&self, segments: &[&str]) -> Result<Option<String>, OriginError> {
        let lookup: IdLookup = self.get_json(self.endpoint(segments)).await?;
        Ok(lookup.id.filter(|id| !id.is_empty()))
    }
}

async fn read_bytes(response: Response) -> Result<bytes::Bytes, OriginError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(OriginError::from_reqwest)?;
    if !status.is_success() {
        return Err(OriginError::from_body(status, &bytes));
    }
    Ok(bytes)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, OriginError> {
    let bytes = read_bytes(response).await?;
    serde_json::from_slice(&bytes).map_err(OriginError::Decode)
}

#[async_trait]
impl OriginApi for OriginClient {
    async fn stats(&self) -> Result<FeedStats, OriginError> {
        self.get_json(self.endpoint(&["stats"])).await
    }

    async fn item(&self, id: &str) -> Result<FeedItem, OriginError> {
        self.get_json(self.endpoint(&["items", id])).await
    }

    async fn navigation(&self, id: &str) -> Result<NavigationEdge, OriginError> {
        self.get_json(self.endpoint(&["items", id, "navigation"])).await
    }

    async fn most_recent_id(&self) -> Result<Option<String>, OriginError> {
        self.lookup_id(&["items", "latest"]).await
    }

    async fn first_unprocessed_id(&self) -> Result<Option<String>, OriginError> {
        self.lookup_id(&["items", "first-unprocessed"]).await
    }

    async fn first_skipped_id(&self) -> Result<Option<String>, OriginError> {
        self.lookup_id(&["items", "first-skipped"]).await
    }

    async fn ingest(&self, count: u32) -> Result<FetchReport, OriginError> {
        let response = self
            .http
            .post(self.endpoint(&["ingest"]))
            .query(&[("count", count)])
            .send()
            .await
            .map_err(OriginError::from_reqwest)?;
        read_json(response).await
    }

    async fn sync_newest(&self) -> Result<FetchReport, OriginError> {
        let response = self
            .http
            .post(self.endpoint(&["sync"]))
            .send()
            .await
            .map_err(OriginError::from_reqwest)?;
        read_json(response).await
    }

    async fn commit_label(&self, id: &str, decision: &LabelDecision) -> Result<(), OriginError> {
        let response = self
            .http
            .post(self.endpoint(&["items", id, "label"]))
            .json(&decision.to_body())
            .send()
            .await
            .map_err(OriginError::from_reqwest)?;
        read_bytes(response).await.map(|_| ())
    }

    async fn open_backfill(&self) -> Result<BackfillStream, OriginError> {
        let response = self
            .stream_http
            .get(self.endpoint(&["backfill", "stream"]))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(OriginError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(OriginError::from_body(status, &body));
        }

        let body = response.bytes_stream().boxed();
        let stream = futures::stream::unfold(
            (body, SseDecoder::new(), VecDeque::<String>::new(), false),
            |(mut body, mut decoder, mut pending, mut ended)| async move {
                loop {
                    if let Some(data) = pending.pop_front() {
                        let message = serde_json::from_str::<BackfillMessage>(&data).map_err(OriginError::Decode);
                        return Some((message, (body, decoder, pending, ended)));
                    }
                    if ended {
                        return None;
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                        Some(Err(err)) => {
                            ended = true;
                            return Some((Err(OriginError::from_reqwest(err)), (body, decoder, pending, ended)));
                        }
                        None => {
                            ended = true;
                            pending.extend(decoder.finish());
                        }
                    }
                }
            },
        );
        Ok(stream.boxed())
    }

    fn media_url(&self, item: &FeedItem, index: usize) -> String {
        self.endpoint(&["items", &item.internal_id.to_string(), "media", &index.to_string()]).to_string()
    }

    async fn prefetch_media(&self, url: &str) -> Result<(), OriginError> {
        let response = self.http.get(url).send().await.map_err(OriginError::from_reqwest)?;
        read_bytes(response).await.map(|_| ())
    }
}
