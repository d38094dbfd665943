//! Time authority
//!
//! The decoder reports positions relative to whatever it was loaded with. In
//! transcode mode that is a segment starting at the anchor, so decoder-local time
//! and source time differ; everywhere else they coincide. All session positions
//! are kept in source (absolute) seconds and converted here.

use streamline_common::events::PlaybackMode;

/// Snapshot of the values time conversion depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeline {
    mode: PlaybackMode,
    anchor: f64,
    duration: Option<f64>,
}

impl Timeline {
    pub fn new(mode: PlaybackMode, anchor: f64, duration: Option<f64>) -> Self {
        Self {
            mode,
            anchor,
            duration,
        }
    }

    pub fn to_absolute(&self, local: f64) -> f64 {
        match self.mode {
            PlaybackMode::Transcode => self.anchor + local,
            _ => local,
        }
    }

    pub fn to_local(&self, absolute: f64) -> f64 {
        match self.mode {
            PlaybackMode::Transcode => (absolute - self.anchor).max(0.0),
            _ => absolute,
        }
    }

    /// Clamp an absolute target to `[0, duration - end_guard]`
    ///
    /// Without a known duration only the lower bound applies.
    pub fn clamp(&self, absolute: f64, end_guard: f64) -> f64 {
        let target = if absolute.is_finite() { absolute.max(0.0) } else { 0.0 };

        match self.duration {
            Some(duration) if duration.is_finite() => target.min((duration - end_guard).max(0.0)),
            _ => target,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }
}
