//! Decoder capability interface
//!
//! The controller and segment buffer never talk to a platform media API directly.
//! A binding implements `MediaDecoder` (source loading, native seek, clock) and
//! hands out `SegmentSink`s (append/remove on the decoder's internal buffer), and
//! forwards its callbacks as `DecoderEvent`s.

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Buffered time range in decoder-local seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// What the decoder should play
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderSource {
    /// Decoder fetches the URL natively (direct and proxy modes)
    Url(Url),

    /// Decoder is fed through a segment sink (transcode mode)
    Segments,
}

/// Callbacks from a decoder binding
///
/// Times are decoder-local seconds; the controller converts them to source
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEvent {
    Play,
    Pause,
    TimeUpdate(f64),
    LoadedMetadata(f64),
    VolumeChange(f64),
    Seeking,
    Seeked,
    Waiting,
    Stalled,
    CanPlay,
    Playing,
    /// Decoder cannot play the current source (platform error code if any)
    Error(Option<u16>),
    /// The outstanding append/remove completed on the sink attached for this
    /// transcode revision
    SinkIdle(u64),
}

impl DecoderEvent {
    /// Events that count as forward progress for stall detection
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            DecoderEvent::TimeUpdate(_) | DecoderEvent::Seeked | DecoderEvent::Playing
        )
    }

    /// Events that prove the decoder accepted the current source
    pub fn is_readiness(&self) -> bool {
        matches!(
            self,
            DecoderEvent::LoadedMetadata(_) | DecoderEvent::CanPlay | DecoderEvent::Playing
        )
    }
}

/// Segment sink failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    /// Decoder buffer is full; the rejected data was not consumed
    #[error("decoder buffer capacity exceeded")]
    CapacityExceeded,

    /// A mutation is already outstanding
    #[error("segment sink is busy")]
    Busy,

    /// Sink no longer attached to a decoder
    #[error("segment sink is detached")]
    Detached,

    #[error("segment sink error: {0}")]
    Other(String),
}

/// Media player side of a decoder binding
pub trait MediaDecoder: Send {
    /// Replace the current source, discarding decoder state
    fn load(&mut self, source: DecoderSource);

    /// Create a sink for the segment source loaded by `load(DecoderSource::Segments)`
    ///
    /// Completions on the returned sink are reported as `SinkIdle(revision)`.
    fn attach_sink(&mut self, revision: u64) -> Box<dyn SegmentSink>;

    /// Native seek in decoder-local seconds
    fn seek(&mut self, local_secs: f64);

    /// Whether playback is paused by the user
    fn is_paused(&self) -> bool;

    /// Release the current source entirely
    fn detach(&mut self);
}

/// Capacity-limited buffer inside the decoder
///
/// `append_chunk` and `remove_range` start an asynchronous mutation; the binding
/// signals completion with `DecoderEvent::SinkIdle` carrying the sink's revision. Capacity exhaustion is
/// reported synchronously by `append_chunk`.
pub trait SegmentSink: Send {
    fn append_chunk(&mut self, chunk: &Bytes) -> Result<(), SinkError>;

    fn remove_range(&mut self, start: f64, end: f64) -> Result<(), SinkError>;

    /// Currently buffered ranges, decoder-local seconds, ascending
    fn buffered(&self) -> Vec<TimeRange>;

    /// Decoder-local playback position
    fn current_time(&self) -> f64;

    /// No more data will be appended
    fn end_of_stream(&mut self);
}
