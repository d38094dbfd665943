//! Eviction policy for the segment buffer
//!
//! Removal planning is pure: given the decoder's buffered ranges and playback
//! position, pick at most one range to remove. Forward material (beyond
//! `current + forward`) is always chosen before backward material (before
//! `current - backward`) so rewinding stays possible as long as possible.

use crate::decoder::TimeRange;
use serde::Serialize;
use streamline_common::config::PlaybackSettings;

/// How much material to keep around the playback position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetentionPolicy {
    /// Already-played seconds kept for rewinding
    pub backward_secs: f64,

    /// Seconds allowed ahead of the playback position
    pub forward_secs: f64,
}

impl RetentionPolicy {
    pub const fn new(backward_secs: f64, forward_secs: f64) -> Self {
        Self {
            backward_secs,
            forward_secs,
        }
    }

    pub fn from_settings(settings: &PlaybackSettings) -> Self {
        Self::new(settings.retention_backward_secs, settings.retention_forward_secs)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(300.0, 30.0)
    }
}

/// Tiers tried after the steady-state retention, most lenient first
pub const ESCALATION_TIERS: [RetentionPolicy; 3] = [
    RetentionPolicy::new(60.0, 20.0),
    RetentionPolicy::new(60.0, 10.0),
    // Emergency
    RetentionPolicy::new(10.0, 5.0),
];

/// Full tier sequence starting from the steady-state retention
pub fn eviction_tiers(retention: RetentionPolicy) -> Vec<RetentionPolicy> {
    let mut tiers = Vec::with_capacity(1 + ESCALATION_TIERS.len());
    tiers.push(retention);
    tiers.extend_from_slice(&ESCALATION_TIERS);
    tiers
}

/// Pick the next range to remove under `policy`, forward material first
pub fn plan_removal(ranges: &[TimeRange], current: f64, policy: RetentionPolicy) -> Option<TimeRange> {
    let forward_limit = current + policy.forward_secs;
    for range in ranges {
        if range.end > forward_limit {
            let candidate = TimeRange::new(range.start.max(forward_limit), range.end);
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
    }

    let remove_end = current - policy.backward_secs;
    for range in ranges {
        if range.start < remove_end {
            let candidate = TimeRange::new(range.start, range.end.min(remove_end));
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
    }

    None
}

/// Try each tier in order; returns the index of the tier that found a range
pub fn plan_eviction(
    ranges: &[TimeRange],
    current: f64,
    tiers: &[RetentionPolicy],
) -> Option<(usize, TimeRange)> {
    tiers
        .iter()
        .enumerate()
        .find_map(|(index, tier)| plan_removal(ranges, current, *tier).map(|range| (index, range)))
}
