//! # Streamline Common Library
//!
//! Shared code for the Streamline crates:
//! - Error type
//! - TOML bootstrap configuration
//! - Player event types and the playback mode enum
//! - Time helpers and human-readable position formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod time;

pub use error::{Error, Result};
pub use events::{PlaybackMode, PlayerEvent, TransitionCause};
