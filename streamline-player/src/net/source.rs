//! Transcode segment source
//!
//! A segment stream is a cancellable network read loop feeding a bounded channel.
//! The controller only polls the receiving end while the segment buffer wants more
//! data, so a slow decoder stalls the reader instead of growing memory.

use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;

/// Item produced by a segment read loop
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Chunk(Bytes),

    /// Upstream body completed
    End,

    /// Request or body read failed
    Failed(String),
}

/// Receiving end of one segment read loop
///
/// Dropping the stream cancels the read loop.
pub struct SegmentStream {
    rx: mpsc::Receiver<StreamItem>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SegmentStream {
    /// Wrap a channel whose producer observes `cancel`
    pub fn new(rx: mpsc::Receiver<StreamItem>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            cancel,
            task: None,
        }
    }

    /// Attach the task running the producer so it is reaped with the stream
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Next item, or `None` once cancelled or the producer is gone
    pub async fn next(&mut self) -> Option<StreamItem> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    /// Stop the read loop. Idempotent; items still in the channel are discarded.
    pub fn cancel(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!("Cancelling segment read loop");
            self.cancel.cancel();
        }
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SegmentStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SegmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Opens segment streams for transcode URLs
pub trait SegmentSource: Send + Sync {
    /// Start reading `url`; at most `capacity` items are buffered ahead of the reader
    fn open(&self, url: &Url, capacity: usize) -> SegmentStream;
}

const USER_AGENT: &str = concat!("streamline/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Segment source streaming HTTP response bodies with reqwest
#[derive(Debug, Clone)]
pub struct HttpSegmentSource {
    http_client: reqwest::Client,
}

impl HttpSegmentSource {
    pub fn new() -> Result<Self> {
        // No overall timeout: transcode responses stream for the length of the asset
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl SegmentSource for HttpSegmentSource {
    fn open(&self, url: &Url, capacity: usize) -> SegmentStream {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(read_loop(
            self.http_client.clone(),
            url.clone(),
            tx,
            cancel.clone(),
        ));

        SegmentStream::new(rx, cancel).with_task(task)
    }
}

async fn read_loop(
    client: reqwest::Client,
    url: Url,
    tx: mpsc::Sender<StreamItem>,
    cancel: CancellationToken,
) {
    debug!(url = %url, "Opening segment stream");

    let response = tokio::select! {
        _ = cancel.cancelled() => return,
        response = client.get(url.clone()).send() => response,
    };

    let response = match response.and_then(|r| r.error_for_status()) {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %url, error = %e, "Segment request failed");
            send_unless_cancelled(&tx, &cancel, StreamItem::Failed(e.to_string())).await;
            return;
        }
    };

    let mut body = response.bytes_stream();
    let mut bytes_read: u64 = 0;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(url = %url, bytes_read, "Segment stream cancelled");
                return;
            }
            next = body.next() => next,
        };

        let item = match next {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => {
                bytes_read += chunk.len() as u64;
                StreamItem::Chunk(chunk)
            }
            Some(Err(e)) => {
                warn!(url = %url, bytes_read, error = %e, "Segment body read failed");
                StreamItem::Failed(e.to_string())
            }
            None => {
                info!(url = %url, bytes_read, "Segment stream complete");
                StreamItem::End
            }
        };

        let terminal = !matches!(item, StreamItem::Chunk(_));
        if !send_unless_cancelled(&tx, &cancel, item).await || terminal {
            return;
        }
    }
}

/// Returns false when the reader is gone or the stream was cancelled
async fn send_unless_cancelled(
    tx: &mpsc::Sender<StreamItem>,
    cancel: &CancellationToken,
    item: StreamItem,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}
