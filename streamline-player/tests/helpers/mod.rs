//! Test helper modules for streamline-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - FakeDecoder / FakeSink: scriptable decoder recording every call
//! - FakeSource: segment source handing the test the producing end of each stream
//! - FakeProber / RejectingGate: canned probe outcomes and URL-gate failures
//! - Harness: a controller wired to all of the above

#![allow(dead_code)]

pub mod fakes;

pub use fakes::{DecoderLog, FakeDecoder, FakeProber, FakeSource, OpenedStream, RejectingGate, SinkLog};

use std::sync::{Arc, Mutex};
use streamline_common::config::{PlaybackSettings, TomlConfig};
use streamline_common::events::{PlaybackMode, PlayerEvent};
use streamline_player::decoder::{DecoderEvent, DecoderSource};
use streamline_player::net::{HttpSchemeGate, ProbeOutcome, UrlGate};
use streamline_player::playback::{PlaybackSession, TimerKind};
use streamline_player::{PlaybackController, PlayerConfig, SharedState};
use tokio::sync::broadcast;
use url::Url;

pub const ASSET: &str = "https://media.example.com/library/movie.mkv";

/// Controller under test plus handles on every collaborator
pub struct Harness {
    pub controller: PlaybackController<FakeDecoder>,
    pub decoder: Arc<Mutex<DecoderLog>>,
    pub source: Arc<FakeSource>,
    pub prober: Arc<FakeProber>,
    pub events: broadcast::Receiver<PlayerEvent>,
}

pub fn harness() -> Harness {
    harness_with(PlaybackSettings::default())
}

pub fn harness_with(settings: PlaybackSettings) -> Harness {
    build(settings, Arc::new(HttpSchemeGate))
}

pub fn harness_with_gate(gate: Arc<dyn UrlGate>) -> Harness {
    build(PlaybackSettings::default(), gate)
}

fn build(settings: PlaybackSettings, gate: Arc<dyn UrlGate>) -> Harness {
    let toml = TomlConfig {
        playback: settings,
        ..TomlConfig::default()
    };
    let config = PlayerConfig::from_toml(&toml).expect("default endpoints are valid");

    let decoder_log = Arc::new(Mutex::new(DecoderLog::default()));
    let source = Arc::new(FakeSource::default());
    let prober = Arc::new(FakeProber::new(ProbeOutcome::Unreachable {
        reason: "connection refused".to_string(),
    }));
    let state = Arc::new(SharedState::new());
    let events = state.subscribe_events();

    let controller = PlaybackController::new(
        config,
        FakeDecoder::new(Arc::clone(&decoder_log)),
        source.clone(),
        prober.clone(),
        gate,
        state,
    );

    Harness {
        controller,
        decoder: decoder_log,
        source,
        prober,
        events,
    }
}

impl Harness {
    /// Harness with `ASSET` loaded in direct mode
    pub fn loaded() -> Self {
        let mut h = harness();
        h.controller.load(ASSET).expect("asset URL is valid");
        h
    }

    pub fn asset() -> Url {
        Url::parse(ASSET).expect("asset URL is valid")
    }

    pub fn session(&self) -> &PlaybackSession {
        self.controller.session().expect("session loaded")
    }

    pub fn mode(&self) -> PlaybackMode {
        self.session().mode
    }

    pub async fn event(&mut self, event: DecoderEvent) {
        self.controller.handle_decoder_event(event).await;
    }

    /// Wait for the next timer (paused clock auto-advances) and apply it
    pub async fn fire_next_timer(&mut self) -> TimerKind {
        let token = self.controller.next_timer().await;
        self.controller.handle_timer(token);
        token.kind
    }

    /// Apply the next timer if one fires within `secs` of (virtual) time
    pub async fn fire_timer_within(&mut self, secs: u64) -> Option<TimerKind> {
        let token = tokio::time::timeout(
            std::time::Duration::from_secs(secs),
            self.controller.next_timer(),
        )
        .await
        .ok()?;
        self.controller.handle_timer(token);
        Some(token.kind)
    }

    /// Drive Direct -> Proxy -> Transcode with the position at `position`
    pub async fn escalate_to_transcode(&mut self, position: f64) {
        self.event(DecoderEvent::TimeUpdate(position)).await;
        self.event(DecoderEvent::Error(Some(4))).await;
        assert_eq!(self.mode(), PlaybackMode::Proxy);
        self.event(DecoderEvent::Error(Some(4))).await;
        assert_eq!(self.mode(), PlaybackMode::Transcode);
    }

    /// Completion signal from the sink attached for the current revision
    pub async fn sink_idle(&mut self) {
        let revision = self.session().transcode_revision;
        self.event(DecoderEvent::SinkIdle(revision)).await;
    }

    /// Pull one item from the active segment stream and feed it to the controller
    pub async fn pump(&mut self) {
        let item = self.controller.next_stream_item().await;
        self.controller.handle_stream_item(item);
    }

    pub fn last_load(&self) -> Option<DecoderSource> {
        self.decoder.lock().unwrap().loads.last().cloned()
    }

    /// Every event broadcast since the last drain
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => drained.push(event),
                // Oldest events were overwritten; keep what is still buffered
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        drained
    }
}

/// Value of query parameter `key`
pub fn query(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
