//! Event handlers - decoder callbacks, timer fires and segment data
//!
//! **Responsibilities:**
//! - Decoder event dispatch (progress, readiness, errors, sink idle)
//! - Stall check arming and evaluation
//! - Debounced seek commit, proxy watchdog, quota retry
//! - Feeding segment stream items into the segment buffer

use super::core::PlaybackController;
use super::transitions::cause_verb;
use crate::buffer::FeedOutcome;
use crate::decoder::{DecoderEvent, MediaDecoder};
use crate::net::{ProbeOutcome, StreamItem};
use crate::playback::scheduler::{TimerKind, TimerToken};
use crate::playback::stall::StallVerdict;
use std::sync::Arc;
use streamline_common::events::{PlaybackMode, PlayerEvent, TransitionCause};
use streamline_common::time;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

impl<D: MediaDecoder> PlaybackController<D> {
    /// Apply one decoder callback
    pub async fn handle_decoder_event(&mut self, event: DecoderEvent) {
        let Some(session) = self.session.as_mut() else {
            trace!(?event, "Decoder event without a session");
            return;
        };
        if session.is_failed() {
            trace!(?event, "Decoder event ignored, playback failed");
            return;
        }

        if event.is_progress() {
            self.stall.mark_progress();
        }
        if event.is_progress() || event.is_readiness() {
            session.mode_ready = true;
            if session.mode == PlaybackMode::Proxy {
                self.scheduler.cancel(TimerKind::ProxyWatchdog);
            }
        }

        match event {
            DecoderEvent::Play => session.paused = false,
            DecoderEvent::Pause => session.paused = true,
            DecoderEvent::TimeUpdate(local) => {
                if session.segment_loading {
                    trace!(local, "Time update from the previous source ignored");
                    return;
                }
                session.absolute_current_time = session.timeline().to_absolute(local);
                self.maybe_cleanup();
            }
            DecoderEvent::LoadedMetadata(local_duration) => self.on_loaded_metadata(local_duration),
            DecoderEvent::VolumeChange(volume) => session.volume = Some(volume),
            DecoderEvent::Seeking => session.seeking = true,
            DecoderEvent::Seeked => session.seeking = false,
            DecoderEvent::Waiting | DecoderEvent::Stalled => self.arm_stall_check(),
            DecoderEvent::CanPlay => {}
            DecoderEvent::Playing => self.on_playing(),
            DecoderEvent::Error(code) => self.on_decode_error(code).await,
            DecoderEvent::SinkIdle(revision) => self.on_sink_idle(revision),
        }
    }

    /// Act on a fired timer; superseded or cancelled tokens are ignored
    pub fn handle_timer(&mut self, token: TimerToken) {
        if !self.scheduler.accept(token) {
            return;
        }
        debug!(kind = ?token.kind, generation = token.generation, "Timer fired");

        match token.kind {
            TimerKind::StallCheck => self.on_stall_check(),
            TimerKind::SeekCommit => self.on_seek_commit(),
            TimerKind::ProxyWatchdog => self.on_proxy_watchdog(),
            TimerKind::QuotaRetry => {
                if let Some(buffer) = self.buffer.as_mut() {
                    let outcome = buffer.retry();
                    self.apply_feed_outcome(outcome);
                }
            }
        }
    }

    /// Feed one item from the segment stream (`None`: stream closed)
    pub fn handle_stream_item(&mut self, item: Option<StreamItem>) {
        match item {
            Some(StreamItem::Chunk(chunk)) => {
                if let Some(buffer) = self.buffer.as_mut() {
                    let outcome = buffer.append(chunk);
                    self.apply_feed_outcome(outcome);
                }
            }
            Some(StreamItem::End) => {
                self.stream = None;
                self.finish_buffer();
            }
            Some(StreamItem::Failed(reason)) => {
                // Play out what arrived; a resulting stall or error recovers from here
                warn!(reason = %reason, "Transcode stream failed");
                self.stream = None;
                self.finish_buffer();
            }
            None => {
                debug!("Segment stream closed");
                self.stream = None;
            }
        }
    }

    fn finish_buffer(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            let outcome = buffer.finish();
            self.apply_feed_outcome(outcome);
        }
    }

    fn apply_feed_outcome(&mut self, outcome: FeedOutcome) {
        match outcome {
            FeedOutcome::Appending | FeedOutcome::Queued | FeedOutcome::Idle => {}
            FeedOutcome::Finished => debug!("Transcode segment fully buffered"),
            FeedOutcome::Evicting(range) => self.record_eviction(range),
            FeedOutcome::RetryAfter(delay) => {
                self.scheduler.schedule(TimerKind::QuotaRetry, delay);
            }
            FeedOutcome::Exhausted => self.recover_or_fail(TransitionCause::CapacityExhausted),
            FeedOutcome::Failed(reason) => {
                warn!(reason = %reason, "Segment sink failed");
                self.recover_or_fail(TransitionCause::DecodeError);
            }
        }
    }

    fn on_sink_idle(&mut self, revision: u64) {
        let current = self.session.as_ref().map(|s| s.transcode_revision);
        if current != Some(revision) {
            debug!(revision, ?current, "Idle signal from a detached sink ignored");
            return;
        }
        if let Some(buffer) = self.buffer.as_mut() {
            let outcome = buffer.on_idle();
            self.apply_feed_outcome(outcome);
        }
    }

    fn on_loaded_metadata(&mut self, local_duration: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let known = local_duration.is_finite() && local_duration > 0.0;
        match session.mode {
            PlaybackMode::Transcode => {
                if known && session.absolute_duration.is_none() {
                    session.absolute_duration = Some(session.transcode_anchor + local_duration);
                }
            }
            _ => {
                if known {
                    session.absolute_duration = Some(local_duration);
                }
            }
        }

        let segment_loaded = std::mem::take(&mut session.segment_loading);
        match self.seeks.residual(session, local_duration) {
            Some(offset) => {
                debug!(offset, mode = %session.mode, "Applying pending in-segment seek");
                self.decoder.seek(offset);
            }
            // Segment starts on the target; no `seeked` will follow
            None if segment_loaded && session.pending_seek_target.is_none() => {
                session.seeking = false;
            }
            None => {}
        }
    }

    fn on_playing(&mut self) {
        self.scheduler.cancel(TimerKind::StallCheck);

        if let Some(session) = self.session.as_mut() {
            if session.recovery_attempts > 0 {
                info!(attempts = session.recovery_attempts, "Playback recovered");
            }
            session.recovery_attempts = 0;
            session.seeking = false;
        }

        self.set_status(None);
    }

    fn arm_stall_check(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.seeking {
            trace!("Waiting while seeking, no stall check");
            return;
        }
        if self.scheduler.is_armed(TimerKind::StallCheck) {
            return;
        }

        let delay = self.config.playback.stall_delay();
        debug!(?delay, mode = %session.mode, "Decoder waiting, stall check armed");
        self.scheduler.schedule(TimerKind::StallCheck, delay);
    }

    fn on_stall_check(&mut self) {
        let Some(mode) = self.session.as_ref().map(|s| s.mode) else {
            return;
        };

        match self.stall.evaluate(self.decoder.is_paused()) {
            StallVerdict::Paused => debug!("Stall check: paused"),
            StallVerdict::Progressed => debug!(
                since = ?self.stall.since_progress(),
                "Stall check: progress since waiting"
            ),
            StallVerdict::Stalled => {
                warn!(
                    mode = %mode,
                    since = ?self.stall.since_progress(),
                    "Playback stalled"
                );
                match mode {
                    PlaybackMode::Direct => self.escalate_to_proxy(TransitionCause::Stall),
                    PlaybackMode::Proxy => self.escalate_to_transcode(
                        TransitionCause::Stall,
                        "Proxy playback stalled, switching to transcoding".to_string(),
                    ),
                    PlaybackMode::Transcode => self.recover_or_fail(TransitionCause::Stall),
                    PlaybackMode::Failed => {}
                }
            }
        }
    }

    fn on_seek_commit(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.mode != PlaybackMode::Transcode {
            session.pending_seek_target = None;
            return;
        }
        let Some(aligned) = self.seeks.commit(session) else {
            return;
        };
        let revision = session.transcode_revision;

        info!(
            target = aligned.target,
            anchor = aligned.anchor,
            offset = aligned.offset,
            revision,
            "Seek committed"
        );
        self.state.broadcast_event(PlayerEvent::SeekCommitted {
            target_secs: aligned.target,
            anchor_secs: aligned.anchor,
            offset_secs: aligned.offset,
            revision,
            timestamp: time::now(),
        });

        self.start_transcode_segment();
    }

    fn on_proxy_watchdog(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.mode != PlaybackMode::Proxy || session.mode_ready {
            return;
        }

        warn!(
            grace = ?self.config.playback.proxy_watchdog(),
            "Proxy produced no readiness or progress"
        );
        self.escalate_to_transcode(
            TransitionCause::ProxyTimeout,
            format!(
                "Proxy playback {}, switching to transcoding",
                cause_verb(TransitionCause::ProxyTimeout)
            ),
        );
    }

    async fn on_decode_error(&mut self, code: Option<u16>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mode = session.mode;
        if session.last_error_mode == Some(mode) {
            debug!(?code, mode = %mode, "Duplicate decoder error ignored");
            return;
        }
        session.last_error_mode = Some(mode);
        warn!(?code, mode = %mode, position = session.absolute_current_time, "Decoder error");

        match mode {
            PlaybackMode::Direct => self.escalate_to_proxy(TransitionCause::DecodeError),
            PlaybackMode::Proxy => {
                let outcome = match self.probe_proxy().await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.fail(TransitionCause::UnsafeUrl, e.to_string());
                        return;
                    }
                };
                let status = format!("{}, switching to transcoding", sentence_case(&outcome.describe()));
                self.escalate_to_transcode(TransitionCause::DecodeError, status);
            }
            PlaybackMode::Transcode => self.recover_or_fail(TransitionCause::DecodeError),
            PlaybackMode::Failed => {}
        }
    }

    /// Diagnostic probe against the proxy URL; network errors are folded into the outcome
    async fn probe_proxy(&mut self) -> crate::error::Result<ProbeOutcome> {
        self.check_asset_url()?;
        let Some(session) = self.session.as_ref() else {
            return Ok(ProbeOutcome::Unreachable {
                reason: "no session".to_string(),
            });
        };

        let url = self.urls.proxy(&session.source_url);
        let prober = Arc::clone(&self.prober);
        let outcome = prober.probe(&url).await;
        info!(url = %url, ?outcome, "Proxy probe finished");
        Ok(outcome)
    }

    /// Periodic retention cleanup, at most once per cleanup interval
    fn maybe_cleanup(&mut self) {
        let interval = self.config.playback.cleanup_interval();
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };

        let now = Instant::now();
        if let Some(last) = self.last_cleanup {
            if now.duration_since(last) < interval {
                return;
            }
        }
        self.last_cleanup = Some(now);

        let retention = buffer.retention();
        if let Some(range) = buffer.cleanup(retention.backward_secs, retention.forward_secs) {
            self.record_eviction(range);
        }
    }
}

fn sentence_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
