//! Playback session
//!
//! One session per asset. Owned exclusively by the controller; the state machine
//! and seek coordinator are the only writers. Replaced wholesale on asset change
//! or manual restart.

use crate::error::{Error, Result};
use crate::playback::timeline::Timeline;
use chrono::{DateTime, Utc};
use serde::Serialize;
use streamline_common::events::PlaybackMode;
use streamline_common::time;
use url::Url;

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub source_url: Url,
    pub mode: PlaybackMode,

    /// Absolute start of the current transcode segment
    pub transcode_anchor: f64,

    /// Bumped to invalidate in-flight segment fetches and force a decoder reload
    pub transcode_revision: u64,

    pub absolute_current_time: f64,
    pub absolute_duration: Option<f64>,

    /// In-place transcode recoveries since the last `playing`
    pub recovery_attempts: u32,

    /// Debounced transcode seek not yet committed
    pub pending_seek_target: Option<f64>,

    /// Position to seek to once the next source reports metadata.
    /// In-segment residual for transcode seeks; resume position otherwise.
    pub pending_segment_offset: Option<f64>,

    pub audio_track: Option<u32>,

    /// Mode whose decode error was last handled; repeats are ignored
    pub last_error_mode: Option<PlaybackMode>,

    /// Current transcode segment has not reported metadata; decoder time
    /// updates still belong to the previous source
    pub segment_loading: bool,

    pub seeking: bool,
    pub paused: bool,
    pub volume: Option<f64>,

    /// Decoder reported readiness or progress since the current mode was entered
    pub mode_ready: bool,

    /// Transient, overwritten by every transition and recovery
    pub status: Option<String>,

    /// Persistent reason once the session reached `Failed`
    pub failure: Option<String>,

    pub started_at: DateTime<Utc>,
    pub mode_entered_at: DateTime<Utc>,
}

impl PlaybackSession {
    pub fn new(source_url: Url) -> Self {
        let now = time::now();
        Self {
            source_url,
            mode: PlaybackMode::Direct,
            transcode_anchor: 0.0,
            transcode_revision: 0,
            absolute_current_time: 0.0,
            absolute_duration: None,
            recovery_attempts: 0,
            pending_seek_target: None,
            pending_segment_offset: None,
            audio_track: None,
            last_error_mode: None,
            segment_loading: false,
            seeking: false,
            paused: false,
            volume: None,
            mode_ready: false,
            status: None,
            failure: None,
            started_at: now,
            mode_entered_at: now,
        }
    }

    /// Move to `to`, returning the previous mode
    ///
    /// Modes only move forward; an attempt to go back is an error and leaves the
    /// session untouched.
    pub fn enter_mode(&mut self, to: PlaybackMode) -> Result<PlaybackMode> {
        let from = self.mode;
        if to < from {
            return Err(Error::InvalidState(format!(
                "mode cannot regress from {} to {}",
                from, to
            )));
        }

        self.mode = to;
        self.last_error_mode = None;
        self.mode_ready = false;
        self.pending_seek_target = None;
        self.mode_entered_at = time::now();
        Ok(from)
    }

    pub fn timeline(&self) -> Timeline {
        Timeline::new(self.mode, self.transcode_anchor, self.absolute_duration)
    }

    pub fn is_failed(&self) -> bool {
        self.mode.is_terminal()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            source_url: self.source_url.to_string(),
            mode: self.mode,
            transcode_anchor: self.transcode_anchor,
            transcode_revision: self.transcode_revision,
            absolute_current_time: self.absolute_current_time,
            absolute_duration: self.absolute_duration,
            recovery_attempts: self.recovery_attempts,
            pending_seek_target: self.pending_seek_target,
            audio_track: self.audio_track,
            seeking: self.seeking,
            paused: self.paused,
            volume: self.volume,
            status: self.status.clone(),
            failure: self.failure.clone(),
            started_at: self.started_at,
            mode_entered_at: self.mode_entered_at,
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub source_url: String,
    pub mode: PlaybackMode,
    pub transcode_anchor: f64,
    pub transcode_revision: u64,
    pub absolute_current_time: f64,
    pub absolute_duration: Option<f64>,
    pub recovery_attempts: u32,
    pub pending_seek_target: Option<f64>,
    pub audio_track: Option<u32>,
    pub seeking: bool,
    pub paused: bool,
    pub volume: Option<f64>,
    pub status: Option<String>,
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub mode_entered_at: DateTime<Utc>,
}
