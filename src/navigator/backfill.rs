use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::origin::{BackfillMessage, BackfillStream, OriginApi, OriginError};
use crate::telemetry;
use crate::telemetry::ops::backfill::Phase as BackfillPhase;

const EVENT_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillProgress {
    pub fetched: u64,
    pub checked: u64,
    pub page: u64,
}

impl BackfillProgress {
    fn absorb(&mut self, msg: &BackfillMessage) {
        self.fetched = msg.fetched;
        if msg.checked > 0 {
            self.checked = msg.checked;
        }
        if msg.page > 0 {
            self.page = msg.page;
        }
    }
}

/// Everything a gap-fill run reports; every variant after `Progress` ends the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillEvent {
    Progress(BackfillProgress),
    Finished { progress: BackfillProgress, summary: String },
    Failed(String),
    ConnectionLost(String),
    Dismissed,
}

impl BackfillEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BackfillEvent::Progress(_))
    }
}

pub fn summary_text(fetched: u64) -> String {
    if fetched == 0 {
        "No gaps found".to_string()
    } else {
        format!("Found {fetched} missing")
    }
}

/// One running scan of the origin feed for missing items.
///
/// The reader task owns the underlying stream and drops it before reporting the
/// terminal event, so the connection is closed exactly once whatever ends the run.
pub struct BackfillRun {
    rx: mpsc::Receiver<BackfillEvent>,
    token: CancellationToken,
}

impl BackfillRun {
    pub async fn start(origin: Arc<dyn OriginApi>) -> Result<Self, OriginError> {
        let log = telemetry::backfill();
        let stream = origin.open_backfill().instrument(log.span(&BackfillPhase::Open)).await?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let token = CancellationToken::new();
        tokio::spawn(pump(stream, tx, token.clone()).instrument(log.span(&BackfillPhase::Stream)));
        Ok(Self { rx, token })
    }

    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn next(&mut self) -> Option<BackfillEvent> {
        self.rx.recv().await
    }

    /// Dismisses the run; calling it again is a no-op.
    pub fn close(&self) {
        self.token.cancel();
    }
}

impl Drop for BackfillRun {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn pump(mut stream: BackfillStream, tx: mpsc::Sender<BackfillEvent>, token: CancellationToken) {
    let log = telemetry::backfill();
    let mut progress = BackfillProgress::default();

    let terminal = loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break BackfillEvent::Dismissed,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(msg)) => {
                if let Some(error) = msg.error {
                    break BackfillEvent::Failed(error);
                }
                progress.absorb(&msg);
                if msg.done {
                    break BackfillEvent::Finished { progress, summary: summary_text(progress.fetched) };
                }
                log.progress(progress.fetched, progress.checked, progress.page);
                if tx.send(BackfillEvent::Progress(progress)).await.is_err() {
                    break BackfillEvent::Dismissed;
                }
            }
            Some(Err(err)) => break BackfillEvent::ConnectionLost(err.message()),
            None => break BackfillEvent::ConnectionLost("stream ended before completion".to_string()),
        }
    };

    drop(stream);
    {
        let _span = log.span(&BackfillPhase::Close).entered();
        match &terminal {
            BackfillEvent::Finished { summary, .. } => log.info_kv("backfill finished", [("summary", summary.clone())]),
            BackfillEvent::Dismissed => log.info("backfill dismissed"),
            BackfillEvent::Failed(reason) | BackfillEvent::ConnectionLost(reason) => {
                log.warn_kv("backfill ended early", [("reason", reason.clone())])
            }
            BackfillEvent::Progress(_) => {}
        }
    }
    token.cancel();
    let _ = tx.send(terminal).await;
}
