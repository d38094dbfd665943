//! Core controller - construction, caller-facing operations and the run loop
//!
//! **Responsibilities:**
//! - PlaybackController struct definition and initialization
//! - Session lifecycle (load, restart, shutdown)
//! - User operations (seek, audio track selection)
//! - Event loop multiplexing decoder events, timers, segment data and commands

use crate::buffer::SegmentBuffer;
use crate::config::PlayerConfig;
use crate::decoder::{DecoderEvent, DecoderSource, MediaDecoder};
use crate::error::{Error, Result};
use crate::net::{Prober, SegmentSource, SegmentStream, StreamItem, UrlGate};
use crate::playback::scheduler::{Scheduler, TimerKind, TimerToken};
use crate::playback::seek::{SeekAction, SeekCoordinator};
use crate::playback::session::PlaybackSession;
use crate::playback::stall::StallDetector;
use crate::playback::urls::SourceUrls;
use crate::state::SharedState;
use std::sync::Arc;
use streamline_common::events::{PlaybackMode, PlayerEvent};
use streamline_common::human_time::format_position;
use streamline_common::time;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::diagnostics::ControllerSnapshot;

/// Requests accepted by [`PlaybackController::run`]
#[derive(Debug)]
pub enum Command {
    Load(String),
    Seek(f64),
    SelectAudioTrack(Option<u32>),
    Restart,
    Snapshot(oneshot::Sender<Option<ControllerSnapshot>>),
    Shutdown,
}

/// Adaptive playback controller
///
/// Sole authority over the session: mode transitions, stall recovery, seek
/// coordination and the transcode segment pipeline all go through `&mut self`.
pub struct PlaybackController<D: MediaDecoder> {
    pub(super) config: PlayerConfig,
    pub(super) urls: SourceUrls,
    pub(super) decoder: D,

    pub(super) source: Arc<dyn SegmentSource>,
    pub(super) prober: Arc<dyn Prober>,
    pub(super) gate: Arc<dyn UrlGate>,
    pub(super) state: Arc<SharedState>,

    /// Current asset, if any
    pub(super) session: Option<PlaybackSession>,

    /// Present only in transcode mode
    pub(super) buffer: Option<SegmentBuffer>,
    pub(super) stream: Option<SegmentStream>,

    pub(super) scheduler: Scheduler,
    pub(super) seeks: SeekCoordinator,
    pub(super) stall: StallDetector,
    pub(super) last_cleanup: Option<Instant>,
}

impl<D: MediaDecoder> PlaybackController<D> {
    pub fn new(
        config: PlayerConfig,
        decoder: D,
        source: Arc<dyn SegmentSource>,
        prober: Arc<dyn Prober>,
        gate: Arc<dyn UrlGate>,
        state: Arc<SharedState>,
    ) -> Self {
        let urls = SourceUrls::from_config(&config);
        let seeks = SeekCoordinator::new(&config.playback);
        let stall = StallDetector::new(config.playback.stall_delay());

        Self {
            config,
            urls,
            decoder,
            source,
            prober,
            gate,
            state,
            session: None,
            buffer: None,
            stream: None,
            scheduler: Scheduler::new(),
            seeks,
            stall,
            last_cleanup: None,
        }
    }

    /// Start a new session for `asset_url` in direct mode
    ///
    /// Any previous session is torn down first: timers, segment fetch and buffer.
    pub fn load(&mut self, asset_url: &str) -> Result<()> {
        let asset = Url::parse(asset_url)?;
        self.start_session(asset);
        Ok(())
    }

    /// Rebuild the current asset's session from scratch in direct mode
    ///
    /// The only way out of `Failed`.
    pub fn restart(&mut self) -> Result<()> {
        let asset = self
            .session
            .as_ref()
            .map(|s| s.source_url.clone())
            .ok_or_else(|| Error::InvalidState("no session to restart".to_string()))?;

        info!(url = %asset, "Restarting playback session");
        self.start_session(asset);
        Ok(())
    }

    /// Drop the session and release the decoder
    pub fn shutdown(&mut self) {
        self.teardown_transport();
        self.scheduler.cancel_all();
        if let Some(session) = self.session.take() {
            info!(url = %session.source_url, mode = %session.mode, "Playback session closed");
        }
        self.decoder.detach();
    }

    /// Seek to an absolute source position
    pub fn seek(&mut self, target_secs: f64) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no active session".to_string()))?;

        match self.seeks.request(session, target_secs) {
            SeekAction::Native(local) => {
                debug!(target = target_secs, local, mode = %session.mode, "Native seek");
                self.decoder.seek(local);
                Ok(())
            }
            SeekAction::Debounced(clamped) => {
                self.scheduler.cancel(TimerKind::StallCheck);
                self.scheduler
                    .schedule(TimerKind::SeekCommit, self.config.playback.seek_debounce());
                self.set_status(Some(format!("Seeking to {}", format_position(clamped))));
                Ok(())
            }
            SeekAction::Ignored => Err(Error::InvalidState(
                "playback failed; restart required".to_string(),
            )),
        }
    }

    /// Choose the audio track used for transcoding (`None` = transcoder default)
    ///
    /// In transcode mode the segment restarts at the current position; otherwise
    /// the choice is kept for the next transcode URL.
    pub fn select_audio_track(&mut self, index: Option<u32>) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no active session".to_string()))?;

        if session.audio_track == index {
            return Ok(());
        }
        session.audio_track = index;

        if session.mode != PlaybackMode::Transcode {
            debug!(?index, mode = %session.mode, "Audio track recorded for transcoding");
            return Ok(());
        }

        let position = session.absolute_current_time;
        let aligned = self.seeks.commit_to(session, position);
        info!(
            ?index,
            anchor = aligned.anchor,
            revision = session.transcode_revision,
            "Switching audio track"
        );
        self.set_status(Some("Switching audio track".to_string()));
        self.start_transcode_segment();
        Ok(())
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    pub fn shared_state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Whether the segment reader may deliver another chunk
    pub fn wants_segment_data(&self) -> bool {
        self.stream.is_some() && self.buffer.as_ref().map_or(false, |b| b.wants_more())
    }

    /// Next item from the active segment stream
    ///
    /// Pends forever without a stream; callers gate on `wants_segment_data`.
    pub async fn next_stream_item(&mut self) -> Option<StreamItem> {
        next_item(&mut self.stream).await
    }

    /// Next fired timer, current or superseded
    pub async fn next_timer(&mut self) -> TimerToken {
        self.scheduler.fired().await
    }

    /// Drive the controller until shutdown or until both inputs close
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<DecoderEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        info!("Playback controller started");

        loop {
            let wants_data = self.wants_segment_data();

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_decoder_event(event).await,
                    None => {
                        info!("Decoder event channel closed");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                token = self.scheduler.fired() => self.handle_timer(token),
                item = next_item(&mut self.stream), if wants_data => self.handle_stream_item(item),
            }
        }

        self.shutdown();
        info!("Playback controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        let result = match command {
            Command::Load(url) => self.load(&url),
            Command::Seek(target) => self.seek(target),
            Command::SelectAudioTrack(index) => self.select_audio_track(index),
            Command::Restart => self.restart(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
                Ok(())
            }
            Command::Shutdown => {
                self.shutdown();
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Command rejected: {}", e);
        }
    }

    fn start_session(&mut self, asset: Url) {
        self.teardown_transport();
        self.scheduler.cancel_all();
        self.last_cleanup = None;
        self.stall.mark_progress();

        let session = PlaybackSession::new(asset.clone());
        info!(url = %asset, "Starting playback session in direct mode");
        self.state.broadcast_event(PlayerEvent::SessionStarted {
            source_url: asset.to_string(),
            timestamp: time::now(),
        });

        self.session = Some(session);
        self.set_status(None);
        self.decoder
            .load(DecoderSource::Url(self.urls.direct(&asset)));
    }
}

async fn next_item(stream: &mut Option<SegmentStream>) -> Option<StreamItem> {
    match stream.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

impl<D: MediaDecoder> Drop for PlaybackController<D> {
    fn drop(&mut self) {
        self.teardown_transport();
        self.scheduler.cancel_all();
    }
}
