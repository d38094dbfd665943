//! Diagnostics - serializable view of the controller
//!
//! **Responsibilities:**
//! - Session snapshot with segment buffer statistics
//! - Process-wide counters from the shared state

use super::core::PlaybackController;
use crate::buffer::BufferStats;
use crate::decoder::MediaDecoder;
use crate::playback::session::SessionSnapshot;
use serde::Serialize;
use std::sync::atomic::Ordering;

/// Segment buffer state at snapshot time
#[derive(Debug, Clone, Serialize)]
pub struct BufferSnapshot {
    pub queued_chunks: usize,
    pub busy: bool,
    pub retry_scheduled: bool,
    pub stats: BufferStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub session: SessionSnapshot,

    /// Present only in transcode mode
    pub buffer: Option<BufferSnapshot>,

    pub streaming: bool,
    pub transitions_total: u64,
    pub recoveries_total: u64,
    pub evictions_total: u64,
}

impl<D: MediaDecoder> PlaybackController<D> {
    /// Current session and buffer state, `None` without a session
    pub fn snapshot(&self) -> Option<ControllerSnapshot> {
        let session = self.session.as_ref()?.snapshot();

        let buffer = self.buffer.as_ref().map(|buffer| BufferSnapshot {
            queued_chunks: buffer.pending_len(),
            busy: buffer.is_busy(),
            retry_scheduled: buffer.is_retry_scheduled(),
            stats: buffer.stats().clone(),
        });

        Some(ControllerSnapshot {
            session,
            buffer,
            streaming: self.stream.is_some(),
            transitions_total: self.state.transitions_total.load(Ordering::Relaxed),
            recoveries_total: self.state.recoveries_total.load(Ordering::Relaxed),
            evictions_total: self.state.evictions_total.load(Ordering::Relaxed),
        })
    }
}
