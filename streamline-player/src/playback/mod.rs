//! Playback control: session, time authority, seeks, stalls, timers and the controller

pub mod controller;
pub mod scheduler;
pub mod seek;
pub mod session;
pub mod stall;
pub mod timeline;
pub mod urls;

pub use controller::{Command, ControllerSnapshot, PlaybackController};
pub use scheduler::{Scheduler, TimerKind, TimerToken};
pub use seek::{align_to_keyframe, AlignedSeek, SeekAction, SeekCoordinator};
pub use session::{PlaybackSession, SessionSnapshot};
pub use stall::{StallDetector, StallVerdict};
pub use timeline::Timeline;
pub use urls::SourceUrls;
