//! Event types for the Streamline status surface
//!
//! Every mode transition, recovery attempt and terminal failure is announced as a
//! `PlayerEvent`. Consumers (UI bridges, logs, tests) subscribe through the
//! player's broadcast channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery strategy for the current asset
///
/// Ordered by escalation: a session only ever moves to a greater variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Decoder reads the asset URL as-is
    Direct,
    /// Decoder reads through the byte-range proxy
    Proxy,
    /// Decoder is fed a live transcode through the segment buffer
    Transcode,
    /// Terminal; requires a manual restart
    Failed,
}

impl PlaybackMode {
    pub fn is_terminal(self) -> bool {
        self == PlaybackMode::Failed
    }
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Direct => write!(f, "direct"),
            PlaybackMode::Proxy => write!(f, "proxy"),
            PlaybackMode::Transcode => write!(f, "transcode"),
            PlaybackMode::Failed => write!(f, "failed"),
        }
    }
}

/// Why a recovery or transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Decoder reported an error
    DecodeError,
    /// No progress within the stall threshold
    Stall,
    /// Proxy produced no readiness or progress within the grace period
    ProxyTimeout,
    /// Segment buffer could not make room after the configured retries
    CapacityExhausted,
    /// Upstream URL rejected by the safety gate
    UnsafeUrl,
}

impl std::fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionCause::DecodeError => write!(f, "decode error"),
            TransitionCause::Stall => write!(f, "stall"),
            TransitionCause::ProxyTimeout => write!(f, "proxy timeout"),
            TransitionCause::CapacityExhausted => write!(f, "capacity exhausted"),
            TransitionCause::UnsafeUrl => write!(f, "unsafe url"),
        }
    }
}

/// Player events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A new asset was loaded (or the current one restarted)
    SessionStarted {
        source_url: String,
        timestamp: DateTime<Utc>,
    },

    /// Delivery strategy changed
    ModeChanged {
        from: PlaybackMode,
        to: PlaybackMode,
        cause: TransitionCause,
        timestamp: DateTime<Utc>,
    },

    /// Transient status text changed (`None` clears it)
    StatusChanged {
        status: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Same-mode transcode recovery seek
    RecoveryAttempt {
        attempt: u32,
        position_secs: f64,
        revision: u64,
        cause: TransitionCause,
        timestamp: DateTime<Utc>,
    },

    /// A debounced seek was committed to a new transcode segment
    SeekCommitted {
        target_secs: f64,
        anchor_secs: f64,
        offset_secs: f64,
        revision: u64,
        timestamp: DateTime<Utc>,
    },

    /// Segment buffer removed a range to make room
    BufferEvicted {
        start_secs: f64,
        end_secs: f64,
        timestamp: DateTime<Utc>,
    },

    /// Session entered the terminal failed state
    PlaybackFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl PlayerEvent {
    /// Short event name for logs and subscribers filtering by kind
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::SessionStarted { .. } => "SessionStarted",
            PlayerEvent::ModeChanged { .. } => "ModeChanged",
            PlayerEvent::StatusChanged { .. } => "StatusChanged",
            PlayerEvent::RecoveryAttempt { .. } => "RecoveryAttempt",
            PlayerEvent::SeekCommitted { .. } => "SeekCommitted",
            PlayerEvent::BufferEvicted { .. } => "BufferEvicted",
            PlayerEvent::PlaybackFailed { .. } => "PlaybackFailed",
        }
    }
}
