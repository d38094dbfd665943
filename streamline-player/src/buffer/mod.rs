//! Media segment buffer and its eviction policy

pub mod eviction;
pub mod segment_buffer;

pub use eviction::{eviction_tiers, plan_eviction, plan_removal, RetentionPolicy};
pub use segment_buffer::{BufferStats, FeedOutcome, SegmentBuffer};
