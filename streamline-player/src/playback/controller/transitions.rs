//! Mode state machine - escalation, in-mode recovery and terminal failure
//!
//! **Responsibilities:**
//! - Mode transitions (Direct -> Proxy -> Transcode -> Failed, never backwards)
//! - Transport teardown before every new source is constructed
//! - Transcode segment (re)loading and same-mode recovery seeks
//! - Status text and transition events

use super::core::PlaybackController;
use crate::buffer::SegmentBuffer;
use crate::decoder::{DecoderSource, MediaDecoder, TimeRange};
use crate::playback::scheduler::TimerKind;
use streamline_common::events::{PlaybackMode, PlayerEvent, TransitionCause};
use streamline_common::time;
use tracing::{debug, error, info, warn};

/// Verb used in status lines for a transition cause
pub(super) fn cause_verb(cause: TransitionCause) -> &'static str {
    match cause {
        TransitionCause::DecodeError => "failed",
        TransitionCause::Stall => "stalled",
        TransitionCause::ProxyTimeout => "timed out",
        TransitionCause::CapacityExhausted => "ran out of buffer space",
        TransitionCause::UnsafeUrl => "was blocked",
    }
}

impl<D: MediaDecoder> PlaybackController<D> {
    /// Cancel the segment fetch and drop the segment buffer
    pub(super) fn teardown_transport(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.cancel();
        }
        if let Some(buffer) = self.buffer.take() {
            debug!(stats = ?buffer.stats(), "Segment buffer released");
        }
        self.scheduler.cancel(TimerKind::QuotaRetry);
    }

    /// Replace the transient status text, announcing changes
    pub(super) fn set_status(&mut self, status: Option<String>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.status == status {
            return;
        }

        session.status = status.clone();
        self.state.broadcast_event(PlayerEvent::StatusChanged {
            status,
            timestamp: time::now(),
        });
    }

    /// Direct -> Proxy, resuming at the current position once the proxy loads
    pub(super) fn escalate_to_proxy(&mut self, cause: TransitionCause) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let position = session.absolute_current_time;
        session.pending_segment_offset = (position > 0.0).then_some(position);

        let status = format!("Direct playback {}, switching to proxy", cause_verb(cause));
        self.transition(PlaybackMode::Proxy, cause, status);
    }

    /// Proxy -> Transcode, anchored at the last known absolute position
    pub(super) fn escalate_to_transcode(&mut self, cause: TransitionCause, status: String) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.transcode_anchor = session.absolute_current_time.max(0.0);
        session.pending_segment_offset = None;
        session.transcode_revision += 1;
        session.recovery_attempts = 0;

        self.transition(PlaybackMode::Transcode, cause, status);
    }

    /// Enter `to` with a fresh source for that mode
    fn transition(&mut self, to: PlaybackMode, cause: TransitionCause, status: String) {
        if self.session.is_none() {
            return;
        }

        if matches!(to, PlaybackMode::Proxy | PlaybackMode::Transcode) {
            if let Err(e) = self.check_asset_url() {
                self.fail(TransitionCause::UnsafeUrl, e.to_string());
                return;
            }
        }

        self.teardown_transport();
        self.scheduler.cancel(TimerKind::StallCheck);
        self.scheduler.cancel(TimerKind::SeekCommit);
        self.scheduler.cancel(TimerKind::ProxyWatchdog);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let from = match session.enter_mode(to) {
            Ok(from) => from,
            Err(e) => {
                error!("Rejected mode transition: {}", e);
                return;
            }
        };
        session.seeking = false;
        let asset = session.source_url.clone();

        info!(from = %from, to = %to, cause = %cause, "Playback mode transition");
        self.state.record_transition();
        self.state.broadcast_event(PlayerEvent::ModeChanged {
            from,
            to,
            cause,
            timestamp: time::now(),
        });
        self.set_status(Some(status));

        match to {
            PlaybackMode::Direct => {
                self.decoder.load(DecoderSource::Url(self.urls.direct(&asset)));
            }
            PlaybackMode::Proxy => {
                self.decoder.load(DecoderSource::Url(self.urls.proxy(&asset)));
                self.scheduler
                    .schedule(TimerKind::ProxyWatchdog, self.config.playback.proxy_watchdog());
            }
            PlaybackMode::Transcode => self.start_transcode_segment(),
            PlaybackMode::Failed => {}
        }
    }

    /// Same-mode transcode recovery, or `Failed` once the attempts are spent
    pub(super) fn recover_or_fail(&mut self, cause: TransitionCause) {
        let max_attempts = self.config.playback.max_recovery_attempts;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if session.recovery_attempts >= max_attempts {
            let reason = format!(
                "transcoded playback {} after {} recovery attempts",
                cause_verb(cause),
                session.recovery_attempts
            );
            self.fail(cause, reason);
            return;
        }

        session.recovery_attempts += 1;
        let attempt = session.recovery_attempts;
        let position = session.absolute_current_time;
        let aligned = self.seeks.commit_to(session, position);
        let revision = session.transcode_revision;

        warn!(
            attempt,
            max_attempts,
            position,
            anchor = aligned.anchor,
            revision,
            cause = %cause,
            "Recovering transcoded playback"
        );

        self.scheduler.cancel(TimerKind::StallCheck);
        self.state.record_recovery();
        self.state.broadcast_event(PlayerEvent::RecoveryAttempt {
            attempt,
            position_secs: position,
            revision,
            cause,
            timestamp: time::now(),
        });
        self.set_status(Some(format!(
            "Recovering playback (attempt {}/{})",
            attempt, max_attempts
        )));

        self.start_transcode_segment();
    }

    /// Enter the terminal state; only `restart` or `load` leave it
    pub(super) fn fail(&mut self, cause: TransitionCause, reason: String) {
        self.teardown_transport();
        self.scheduler.cancel_all();

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let from = match session.enter_mode(PlaybackMode::Failed) {
            Ok(from) => from,
            Err(e) => {
                error!("Rejected mode transition: {}", e);
                return;
            }
        };
        session.failure = Some(reason.clone());
        session.seeking = false;
        session.pending_segment_offset = None;

        error!(from = %from, cause = %cause, reason = %reason, "Playback failed");
        self.state.record_transition();
        self.state.broadcast_event(PlayerEvent::ModeChanged {
            from,
            to: PlaybackMode::Failed,
            cause,
            timestamp: time::now(),
        });
        self.state.broadcast_event(PlayerEvent::PlaybackFailed {
            reason: reason.clone(),
            timestamp: time::now(),
        });
        self.set_status(Some(format!("Playback failed: {}", reason)));

        self.decoder.detach();
    }

    /// Load the segment for the session's current anchor and revision
    ///
    /// The previous fetch and buffer are gone before the new ones exist.
    pub(super) fn start_transcode_segment(&mut self) {
        self.teardown_transport();
        self.last_cleanup = None;

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.last_error_mode = None;
        session.segment_loading = true;
        let revision = session.transcode_revision;

        let url = self.urls.transcode(
            &session.source_url,
            session.transcode_anchor,
            session.transcode_revision,
            session.audio_track,
        );
        info!(
            url = %url,
            anchor = session.transcode_anchor,
            revision = session.transcode_revision,
            "Loading transcode segment"
        );

        self.decoder.load(DecoderSource::Segments);
        let sink = self.decoder.attach_sink(revision);
        self.buffer = Some(SegmentBuffer::new(sink, &self.config.playback));
        self.stream = Some(
            self.source
                .open(&url, self.config.playback.channel_capacity),
        );
    }

    pub(super) fn record_eviction(&mut self, local: TimeRange) {
        let timeline = match self.session.as_ref() {
            Some(session) => session.timeline(),
            None => return,
        };
        let start_secs = timeline.to_absolute(local.start);
        let end_secs = timeline.to_absolute(local.end);

        debug!(start_secs, end_secs, "Segment buffer range evicted");
        self.state.record_eviction();
        self.state.broadcast_event(PlayerEvent::BufferEvicted {
            start_secs,
            end_secs,
            timestamp: time::now(),
        });
    }

    /// Run the URL-safety gate on the session's asset
    pub(super) fn check_asset_url(&self) -> crate::error::Result<()> {
        match self.session.as_ref() {
            Some(session) => self.gate.check(&session.source_url),
            None => Ok(()),
        }
    }
}
