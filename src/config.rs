use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::origin::OriginClientConfig;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/feed/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PREFETCH_DEPTH: u32 = 3;
const DEFAULT_LOW_WATER_MARK: u64 = 5;
const DEFAULT_TOP_UP_COUNT: u32 = 10;
const DEFAULT_NOTICE_SECS: u64 = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct LabelerConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// How many items ahead the chain prefetch walks after each move.
    pub prefetch_depth: u32,
    /// Remaining-unlabeled count under which a background top-up starts.
    pub low_water_mark: u64,
    /// Items requested per ingestion, both for top-ups and commit fallbacks.
    pub top_up_count: u32,
    /// Lifetime of transient status-line notices.
    pub notice_ttl: Duration,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            prefetch_depth: DEFAULT_PREFETCH_DEPTH,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            top_up_count: DEFAULT_TOP_UP_COUNT,
            notice_ttl: Duration::from_secs(DEFAULT_NOTICE_SECS),
        }
    }
}

impl LabelerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(base) = get("LABELER_BASE_URL") {
            cfg.base_url = base;
        }
        if let Some(secs) = get("LABELER_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(depth) = get("LABELER_PREFETCH_DEPTH").and_then(|v| v.parse::<u32>().ok()) {
            cfg.prefetch_depth = depth;
        }
        if let Some(mark) = get("LABELER_LOW_WATER_MARK").and_then(|v| v.parse::<u64>().ok()) {
            cfg.low_water_mark = mark;
        }
        if let Some(count) = get("LABELER_TOP_UP_COUNT").and_then(|v| v.parse::<u32>().ok()) {
            cfg.top_up_count = count.max(1);
        }
        if let Some(secs) = get("LABELER_NOTICE_SECS").and_then(|v| v.parse::<u64>().ok()) {
            cfg.notice_ttl = Duration::from_secs(secs);
        }
        cfg
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(base) = base_url {
            self.base_url = base;
        }
        self
    }

    /// Validates the base URL before any I/O happens.
    pub fn origin(&self) -> Result<OriginClientConfig> {
        let base_url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!("Invalid base URL: {} (expected http or https)", self.base_url);
        }
        let mut cfg = OriginClientConfig::new(base_url);
        cfg.timeout = self.timeout;
        Ok(cfg)
    }
}
