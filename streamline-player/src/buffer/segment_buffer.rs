//! Segment buffer
//!
//! Feeds arbitrary-sized byte chunks to a capacity-constrained segment sink:
//! - At most one append/remove is outstanding on the sink at any time
//! - Chunks arriving while the sink is busy are queued, never blocked
//! - Capacity exhaustion re-queues the rejected chunk at the head and runs the
//!   eviction tiers; if none frees space the append is retried after a delay
//! - `wants_more()` gates network reads on the queue length (backpressure)

use super::eviction::{eviction_tiers, plan_eviction, plan_removal, RetentionPolicy};
use crate::decoder::{SegmentSink, SinkError, TimeRange};
use bytes::Bytes;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use streamline_common::config::PlaybackSettings;
use tracing::{debug, info, trace, warn};

/// Result of driving the buffer one step
#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome {
    /// A chunk was handed to the sink; wait for `on_idle`
    Appending,

    /// Chunk queued behind an outstanding mutation or a pending retry
    Queued,

    /// Nothing to feed
    Idle,

    /// Capacity exhausted; a removal was issued for this range
    Evicting(TimeRange),

    /// Capacity exhausted and no tier freed space; call `retry` after the delay
    RetryAfter(Duration),

    /// Delayed retries exceeded the configured limit
    Exhausted,

    /// Input finished and the queue drained; sink finalized
    Finished,

    /// Sink rejected the chunk for a reason other than capacity
    Failed(String),
}

/// Counters exposed through the diagnostics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferStats {
    pub chunks_fed: u64,
    pub bytes_fed: u64,
    pub evictions: u64,
    pub quota_retries: u64,
    pub peak_queue_len: usize,
}

/// Queue of chunks awaiting a single capacity-limited sink
pub struct SegmentBuffer {
    sink: Box<dyn SegmentSink>,

    /// Chunks not yet accepted by the sink, head first
    pending: VecDeque<Bytes>,

    /// An append or remove is outstanding on the sink
    busy: bool,

    /// A delayed retry is scheduled; feeding waits for `retry`
    retry_scheduled: bool,

    retention: RetentionPolicy,
    tiers: Vec<RetentionPolicy>,
    high_water: usize,
    retry_delay: Duration,
    retry_limit: Option<u32>,

    /// Delayed retries since the last successful append
    consecutive_retries: u32,

    input_finished: bool,
    finalized: bool,

    stats: BufferStats,
}

impl SegmentBuffer {
    pub fn new(sink: Box<dyn SegmentSink>, settings: &PlaybackSettings) -> Self {
        let retention = RetentionPolicy::from_settings(settings);
        Self {
            sink,
            pending: VecDeque::new(),
            busy: false,
            retry_scheduled: false,
            retention,
            tiers: eviction_tiers(retention),
            high_water: settings.queue_high_water,
            retry_delay: settings.quota_retry_delay(),
            retry_limit: settings.quota_retry_limit,
            consecutive_retries: 0,
            input_finished: false,
            finalized: false,
            stats: BufferStats::default(),
        }
    }

    /// Enqueue a chunk and feed it if the sink is idle
    pub fn append(&mut self, chunk: Bytes) -> FeedOutcome {
        if self.input_finished {
            warn!("Chunk of {} bytes arrived after end of stream, dropping", chunk.len());
            return FeedOutcome::Idle;
        }

        self.pending.push_back(chunk);
        self.stats.peak_queue_len = self.stats.peak_queue_len.max(self.pending.len());

        if self.busy || self.retry_scheduled {
            trace!("Sink busy, queued chunk (queue_len={})", self.pending.len());
            return FeedOutcome::Queued;
        }

        self.feed_next()
    }

    /// The outstanding append/remove completed
    pub fn on_idle(&mut self) -> FeedOutcome {
        self.busy = false;

        if self.retry_scheduled {
            return FeedOutcome::Idle;
        }

        self.feed_next()
    }

    /// Delayed retry after an eviction round freed nothing
    pub fn retry(&mut self) -> FeedOutcome {
        self.retry_scheduled = false;

        if self.busy {
            return FeedOutcome::Queued;
        }

        debug!("Retrying append after quota delay (queue_len={})", self.pending.len());
        self.feed_next()
    }

    /// No more chunks will arrive; finalize once the queue drains
    pub fn finish(&mut self) -> FeedOutcome {
        self.input_finished = true;

        if self.busy || self.retry_scheduled {
            return FeedOutcome::Queued;
        }

        self.feed_next()
    }

    /// Prune material outside `backward`/`forward` around the playback position.
    ///
    /// Independent of capacity errors; keeps steady-state memory bounded. Issues at
    /// most one removal and only while the sink is idle.
    pub fn cleanup(&mut self, backward_secs: f64, forward_secs: f64) -> Option<TimeRange> {
        if self.busy || self.retry_scheduled {
            return None;
        }

        let ranges = self.sink.buffered();
        let current = self.sink.current_time();
        let range = plan_removal(&ranges, current, RetentionPolicy::new(backward_secs, forward_secs))?;

        match self.sink.remove_range(range.start, range.end) {
            Ok(()) => {
                self.busy = true;
                self.stats.evictions += 1;
                debug!(
                    "Cleanup removing {:.2}..{:.2} (current={:.2})",
                    range.start, range.end, current
                );
                Some(range)
            }
            Err(e) => {
                warn!("Cleanup removal {:.2}..{:.2} failed: {}", range.start, range.end, e);
                None
            }
        }
    }

    /// Whether the network reader may hand over another chunk
    pub fn wants_more(&self) -> bool {
        !self.input_finished && self.pending.len() < self.high_water
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_retry_scheduled(&self) -> bool {
        self.retry_scheduled
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    fn feed_next(&mut self) -> FeedOutcome {
        let Some(chunk) = self.pending.pop_front() else {
            if self.input_finished && !self.finalized {
                self.sink.end_of_stream();
                self.finalized = true;
                info!(
                    "Segment stream finished: {} chunks, {} bytes fed",
                    self.stats.chunks_fed, self.stats.bytes_fed
                );
                return FeedOutcome::Finished;
            }
            return FeedOutcome::Idle;
        };

        match self.sink.append_chunk(&chunk) {
            Ok(()) => {
                self.busy = true;
                self.consecutive_retries = 0;
                self.stats.chunks_fed += 1;
                self.stats.bytes_fed += chunk.len() as u64;
                FeedOutcome::Appending
            }
            Err(SinkError::CapacityExceeded) => {
                self.pending.push_front(chunk);
                self.evict()
            }
            Err(SinkError::Busy) => {
                // Sink has a mutation we were not told about; wait for its idle signal
                self.pending.push_front(chunk);
                self.busy = true;
                FeedOutcome::Queued
            }
            Err(e) => {
                self.pending.push_front(chunk);
                warn!("Segment sink rejected append: {}", e);
                FeedOutcome::Failed(e.to_string())
            }
        }
    }

    fn evict(&mut self) -> FeedOutcome {
        let ranges = self.sink.buffered();
        let current = self.sink.current_time();

        if let Some((tier, range)) = plan_eviction(&ranges, current, &self.tiers) {
            let policy = self.tiers[tier];
            match self.sink.remove_range(range.start, range.end) {
                Ok(()) => {
                    self.busy = true;
                    self.stats.evictions += 1;
                    info!(
                        "Capacity exceeded, evicting {:.2}..{:.2} (tier {} backward={}s forward={}s, current={:.2})",
                        range.start, range.end, tier, policy.backward_secs, policy.forward_secs, current
                    );
                    return FeedOutcome::Evicting(range);
                }
                Err(e) => {
                    warn!("Eviction of {:.2}..{:.2} failed: {}", range.start, range.end, e);
                }
            }
        }

        self.consecutive_retries += 1;
        self.stats.quota_retries += 1;

        if let Some(limit) = self.retry_limit {
            if self.consecutive_retries > limit {
                warn!(
                    "Capacity still exhausted after {} delayed retries, giving up",
                    limit
                );
                return FeedOutcome::Exhausted;
            }
        }

        self.retry_scheduled = true;
        debug!(
            "No eviction tier freed space (current={:.2}), retrying in {:?}",
            current, self.retry_delay
        );
        FeedOutcome::RetryAfter(self.retry_delay)
    }
}

impl std::fmt::Debug for SegmentBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentBuffer")
            .field("pending", &self.pending.len())
            .field("busy", &self.busy)
            .field("retry_scheduled", &self.retry_scheduled)
            .field("retention", &self.retention)
            .field("stats", &self.stats)
            .finish()
    }
}
