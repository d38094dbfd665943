//! # Streamline Player Library (streamline-player)
//!
//! Adaptive playback controller for remote video.
//!
//! **Purpose:** Keep playback of a remote asset going by escalating through
//! progressively heavier delivery strategies (direct, byte-range proxy, live
//! transcode) while staying seekable across every switch.
//!
//! **Architecture:** A single-owner controller reacts to decoder callbacks, timers
//! and segment data. In transcode mode it streams the transcoder's output through
//! a capacity-limited segment buffer into the decoder.

pub mod buffer;
pub mod config;
pub mod decoder;
pub mod error;
pub mod net;
pub mod playback;
pub mod state;

pub use config::PlayerConfig;
pub use decoder::{DecoderEvent, DecoderSource, MediaDecoder, SegmentSink, SinkError, TimeRange};
pub use error::{Error, Result};
pub use playback::{Command, PlaybackController};
pub use state::SharedState;
