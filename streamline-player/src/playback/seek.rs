//! Seek coordination
//!
//! Direct and proxy seeks go straight to the decoder. Transcode seeks are
//! debounced (the controller re-arms the commit timer on every request, so the
//! latest target wins) and committed by starting a new segment at the keyframe
//! boundary at or before the target. The remainder is applied as an in-segment
//! seek once the new segment reports its metadata.

use crate::playback::session::PlaybackSession;
use streamline_common::config::PlaybackSettings;
use streamline_common::events::PlaybackMode;
use tracing::debug;

/// A seek target split into segment start and in-segment offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedSeek {
    /// Clamped absolute target
    pub target: f64,

    /// Keyframe boundary the new segment starts at
    pub anchor: f64,

    /// `target - anchor`, always in `[0, interval)`
    pub offset: f64,
}

/// Align `target` to the keyframe grid: `anchor = floor(t / interval) * interval`
pub fn align_to_keyframe(target: f64, interval: f64) -> AlignedSeek {
    let target = target.max(0.0);
    let anchor = (target / interval).floor() * interval;
    // Floating point can put the offset a hair outside [0, interval)
    let offset = (target - anchor).clamp(0.0, interval);
    let (anchor, offset) = if offset >= interval {
        (anchor + interval, 0.0)
    } else {
        (anchor, offset)
    };

    AlignedSeek {
        target,
        anchor,
        offset,
    }
}

/// How the controller should carry out a seek request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekAction {
    /// Seek the decoder now to this decoder-local position
    Native(f64),

    /// Target recorded; commit after the debounce window
    Debounced(f64),

    /// Session is failed; nothing to seek
    Ignored,
}

#[derive(Debug, Clone)]
pub struct SeekCoordinator {
    keyframe_interval: f64,
    end_guard: f64,
}

impl SeekCoordinator {
    pub fn new(settings: &PlaybackSettings) -> Self {
        Self {
            keyframe_interval: settings.keyframe_interval_secs,
            end_guard: settings.end_guard_secs,
        }
    }

    /// Clamp an absolute target to `[0, duration - end_guard]`
    pub fn clamp(&self, session: &PlaybackSession, target: f64) -> f64 {
        session.timeline().clamp(target, self.end_guard)
    }

    pub fn request(&self, session: &mut PlaybackSession, target: f64) -> SeekAction {
        match session.mode {
            PlaybackMode::Direct | PlaybackMode::Proxy => {
                let clamped = self.clamp(session, target);
                session.absolute_current_time = clamped;
                session.seeking = true;
                SeekAction::Native(session.timeline().to_local(clamped))
            }
            PlaybackMode::Transcode => {
                let clamped = self.clamp(session, target);
                session.pending_seek_target = Some(clamped);
                session.seeking = true;
                SeekAction::Debounced(clamped)
            }
            PlaybackMode::Failed => SeekAction::Ignored,
        }
    }

    /// Commit the pending debounced target, if any
    pub fn commit(&self, session: &mut PlaybackSession) -> Option<AlignedSeek> {
        let target = session.pending_seek_target.take()?;
        Some(self.commit_to(session, target))
    }

    /// Start a new transcode segment for `target`
    ///
    /// Sets the anchor, records the residual offset, bumps the revision (even when
    /// the anchor does not change) and marks the session seeking.
    pub fn commit_to(&self, session: &mut PlaybackSession, target: f64) -> AlignedSeek {
        let clamped = self.clamp(session, target);
        let aligned = align_to_keyframe(clamped, self.keyframe_interval);

        session.transcode_anchor = aligned.anchor;
        session.pending_segment_offset = Some(aligned.offset);
        session.transcode_revision += 1;
        session.absolute_current_time = aligned.target;
        session.seeking = true;

        debug!(
            target = aligned.target,
            anchor = aligned.anchor,
            offset = aligned.offset,
            revision = session.transcode_revision,
            "Committed transcode seek"
        );

        aligned
    }

    /// Take the pending offset to apply once a source of `local_duration` is loaded
    ///
    /// Clamped to `local_duration - end_guard` when the duration is known. A zero
    /// offset needs no seek.
    pub fn residual(&self, session: &mut PlaybackSession, local_duration: f64) -> Option<f64> {
        let offset = session.pending_segment_offset.take()?;

        let offset = if local_duration.is_finite() && local_duration > 0.0 {
            offset.min((local_duration - self.end_guard).max(0.0))
        } else {
            offset
        };

        (offset > 0.0).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn coordinator() -> SeekCoordinator {
        SeekCoordinator::new(&PlaybackSettings::default())
    }

    fn session(mode: PlaybackMode) -> PlaybackSession {
        let mut session = PlaybackSession::new(Url::parse("http://h/a.mp4").unwrap());
        session.enter_mode(mode).unwrap();
        session.absolute_duration = Some(600.0);
        session
    }

    #[test]
    fn test_alignment_grid() {
        let aligned = align_to_keyframe(43.7, 2.0);
        assert_eq!(aligned.anchor, 42.0);
        assert!((aligned.offset - 1.7).abs() < 1e-9);

        let aligned = align_to_keyframe(44.0, 2.0);
        assert_eq!(aligned.anchor, 44.0);
        assert_eq!(aligned.offset, 0.0);
    }

    #[test]
    fn test_alignment_offset_in_range() {
        for i in 0..2000 {
            let target = i as f64 * 0.137;
            let aligned = align_to_keyframe(target, 2.0);
            assert!(aligned.offset >= 0.0 && aligned.offset < 2.0, "offset {} for {}", aligned.offset, target);
            assert_eq!(aligned.anchor % 2.0, 0.0);
            assert!((aligned.anchor + aligned.offset - target).abs() < 1e-9);
        }
    }

    #[test]
    fn test_direct_seek_is_native_and_clamped() {
        let mut session = session(PlaybackMode::Direct);
        assert_eq!(coordinator().request(&mut session, 1000.0), SeekAction::Native(599.75));
        assert_eq!(coordinator().request(&mut session, -5.0), SeekAction::Native(0.0));
    }

    #[test]
    fn test_transcode_seek_is_debounced() {
        let mut session = session(PlaybackMode::Transcode);
        assert_eq!(coordinator().request(&mut session, 100.0), SeekAction::Debounced(100.0));
        assert_eq!(coordinator().request(&mut session, 123.4), SeekAction::Debounced(123.4));
        assert_eq!(session.pending_seek_target, Some(123.4));
        assert_eq!(session.transcode_revision, 0, "Nothing committed yet");
    }

    #[test]
    fn test_commit_sets_anchor_and_bumps_revision() {
        let mut session = session(PlaybackMode::Transcode);
        coordinator().request(&mut session, 123.4);

        let aligned = coordinator().commit(&mut session).unwrap();
        assert_eq!(aligned.anchor, 122.0);
        assert_eq!(session.transcode_anchor, 122.0);
        assert_eq!(session.transcode_revision, 1);
        assert!(session.seeking);
        assert!(session.pending_seek_target.is_none());
        assert!(coordinator().commit(&mut session).is_none());
    }

    #[test]
    fn test_commit_to_same_anchor_still_bumps_revision() {
        let mut session = session(PlaybackMode::Transcode);
        coordinator().commit_to(&mut session, 10.5);
        coordinator().commit_to(&mut session, 10.5);
        assert_eq!(session.transcode_anchor, 10.0);
        assert_eq!(session.transcode_revision, 2);
    }

    #[test]
    fn test_residual_clamped_to_segment() {
        let mut session = session(PlaybackMode::Transcode);
        session.pending_segment_offset = Some(1.9);
        assert_eq!(coordinator().residual(&mut session, 1.0), Some(0.75));
        assert_eq!(coordinator().residual(&mut session, 1.0), None, "Offset is consumed");

        session.pending_segment_offset = Some(0.0);
        assert_eq!(coordinator().residual(&mut session, 30.0), None);

        session.pending_segment_offset = Some(1.5);
        assert_eq!(coordinator().residual(&mut session, f64::INFINITY), Some(1.5));
    }

    #[test]
    fn test_failed_session_ignores_seeks() {
        let mut session = session(PlaybackMode::Failed);
        assert_eq!(coordinator().request(&mut session, 5.0), SeekAction::Ignored);
    }
}
