//! Adaptive playback controller
//!
//! **Module Structure:**
//! - `core.rs`: Construction, caller-facing operations, run loop
//! - `transitions.rs`: Mode state machine, recovery, segment loading
//! - `handlers.rs`: Decoder events, timers, segment stream items
//! - `diagnostics.rs`: Snapshot for status surfaces

mod core;
mod diagnostics;
mod handlers;
mod transitions;

pub use self::core::{Command, PlaybackController};
pub use diagnostics::{BufferSnapshot, ControllerSnapshot};
