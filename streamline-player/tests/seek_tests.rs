//! Seek coordination integration tests
//!
//! Native seeks in direct/proxy mode, debounced keyframe-aligned commits in
//! transcode mode and the in-segment residual seek.

mod helpers;

use helpers::{query, Harness};
use std::time::Duration;
use streamline_common::events::{PlaybackMode, PlayerEvent};
use streamline_player::decoder::DecoderEvent;
use streamline_player::playback::TimerKind;
use streamline_player::Error;

/// Loaded with a known 600 s duration, then escalated to transcoding at `position`
async fn transcoding_at(position: f64) -> Harness {
    let mut h = Harness::loaded();
    h.event(DecoderEvent::LoadedMetadata(600.0)).await;
    h.escalate_to_transcode(position).await;
    h
}

// ============================================================================
// Native seeks
// ============================================================================

#[tokio::test]
async fn test_direct_seek_is_clamped_to_end_guard() {
    let mut h = Harness::loaded();
    h.event(DecoderEvent::LoadedMetadata(600.0)).await;

    h.controller.seek(1000.0).unwrap();
    h.controller.seek(-3.0).unwrap();

    assert_eq!(h.decoder.lock().unwrap().seeks, vec![599.75, 0.0]);
    assert_eq!(h.source.open_count(), 0, "Native seeks never fetch segments");
}

#[tokio::test]
async fn test_proxy_seek_is_native() {
    let mut h = Harness::loaded();
    h.event(DecoderEvent::Error(None)).await;
    assert_eq!(h.mode(), PlaybackMode::Proxy);

    h.controller.seek(42.0).unwrap();

    assert_eq!(h.decoder.lock().unwrap().seeks, vec![42.0]);
    assert_eq!(h.session().absolute_current_time, 42.0);
}

#[tokio::test]
async fn test_seek_without_session_is_rejected() {
    let mut h = helpers::harness();
    assert!(matches!(h.controller.seek(10.0), Err(Error::InvalidState(_))));
}

// ============================================================================
// Debounced transcode seeks
// ============================================================================

/// **Given:** Transcoded playback of a 600 s asset
/// **When:** Two seeks arrive inside the debounce window
/// **Then:**
///   - Only the latest target is committed, as one new segment
///   - The segment starts at the keyframe boundary at or before the target
///   - The remainder is applied once the new segment reports metadata
#[tokio::test(start_paused = true)]
async fn test_debounced_seek_latest_target_wins() {
    let mut h = transcoding_at(10.0).await;
    let first = h.source.last();
    let revision = h.session().transcode_revision;

    h.controller.seek(100.0).unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;
    h.controller.seek(123.4).unwrap();

    assert_eq!(h.source.open_count(), 1, "Nothing fetched before the debounce elapses");
    assert_eq!(h.session().status.as_deref(), Some("Seeking to 2:03"));

    assert_eq!(h.fire_next_timer().await, TimerKind::SeekCommit);
    assert_eq!(h.source.open_count(), 2);
    assert!(first.cancel.is_cancelled(), "Superseded segment fetch cancelled");

    let segment = h.source.last();
    assert_eq!(query(&segment.url, "time").as_deref(), Some("122"));
    assert_eq!(query(&segment.url, "r"), Some((revision + 1).to_string()));
    assert_eq!(h.session().transcode_anchor, 122.0);

    h.event(DecoderEvent::LoadedMetadata(478.0)).await;
    let seeks = h.decoder.lock().unwrap().seeks.clone();
    assert_eq!(seeks.len(), 1);
    assert!((seeks[0] - 1.4).abs() < 1e-9, "residual seek {}", seeks[0]);
    assert_eq!(h.session().absolute_duration, Some(600.0));

    let committed: Vec<_> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            PlayerEvent::SeekCommitted {
                target_secs,
                anchor_secs,
                ..
            } => Some((target_secs, anchor_secs)),
            _ => None,
        })
        .collect();
    assert_eq!(committed, vec![(123.4, 122.0)]);
}

#[tokio::test(start_paused = true)]
async fn test_transcode_seek_past_end_is_clamped() {
    let mut h = transcoding_at(10.0).await;

    h.controller.seek(10_000.0).unwrap();
    h.fire_next_timer().await;

    assert_eq!(h.session().transcode_anchor, 598.0);
    assert_eq!(query(&h.source.last().url, "time").as_deref(), Some("598"));

    h.event(DecoderEvent::LoadedMetadata(2.0)).await;
    assert_eq!(h.decoder.lock().unwrap().seeks, vec![1.75]);
}

/// A boundary-aligned target needs no in-segment seek
#[tokio::test(start_paused = true)]
async fn test_aligned_seek_has_no_residual() {
    let mut h = transcoding_at(10.0).await;

    h.controller.seek(200.0).unwrap();
    h.fire_next_timer().await;
    h.event(DecoderEvent::LoadedMetadata(400.0)).await;

    assert_eq!(h.session().transcode_anchor, 200.0);
    assert!(h.decoder.lock().unwrap().seeks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_seek_cancels_pending_stall_check() {
    let mut h = transcoding_at(10.0).await;
    h.event(DecoderEvent::Waiting).await;

    h.controller.seek(300.0).unwrap();

    assert_eq!(h.fire_next_timer().await, TimerKind::SeekCommit);
    assert_eq!(h.session().recovery_attempts, 0);
    assert_eq!(h.fire_timer_within(10).await, None);
}

/// **Given:** Transcoded playback at 10 s
/// **When:** The decoder reports the old segment's clock after a seek commit
/// **Then:** The position is left alone until the new segment reports metadata
#[tokio::test(start_paused = true)]
async fn test_time_update_before_new_segment_metadata_is_ignored() {
    let mut h = transcoding_at(10.0).await;
    h.event(DecoderEvent::LoadedMetadata(590.0)).await;
    h.event(DecoderEvent::TimeUpdate(5.0)).await;
    assert_eq!(h.session().absolute_current_time, 15.0);

    h.controller.seek(300.0).unwrap();
    h.fire_next_timer().await;
    h.event(DecoderEvent::TimeUpdate(6.0)).await;
    assert_eq!(h.session().absolute_current_time, 300.0);

    h.event(DecoderEvent::LoadedMetadata(300.0)).await;
    h.event(DecoderEvent::TimeUpdate(0.5)).await;
    assert_eq!(h.session().absolute_current_time, 300.5);
}

/// **Given:** A transcode seek to a keyframe boundary
/// **When:** The new segment loads and then hangs
/// **Then:** Stall detection is live again and recovery kicks in
#[tokio::test(start_paused = true)]
async fn test_aligned_seek_then_hang_recovers() {
    let mut h = transcoding_at(10.0).await;

    h.controller.seek(100.0).unwrap();
    h.fire_next_timer().await;
    assert!(h.session().seeking);

    h.event(DecoderEvent::LoadedMetadata(500.0)).await;
    assert!(!h.session().seeking, "No in-segment seek left to wait for");

    h.event(DecoderEvent::Waiting).await;
    assert_eq!(h.fire_timer_within(10).await, Some(TimerKind::StallCheck));
    assert_eq!(h.session().recovery_attempts, 1);
    assert_eq!(h.session().transcode_anchor, 100.0);
}

/// A residual seek keeps the session seeking until the decoder settles
#[tokio::test(start_paused = true)]
async fn test_residual_seek_stays_seeking_until_seeked() {
    let mut h = transcoding_at(10.0).await;

    h.controller.seek(101.0).unwrap();
    h.fire_next_timer().await;
    h.event(DecoderEvent::LoadedMetadata(500.0)).await;
    assert_eq!(h.decoder.lock().unwrap().seeks, vec![1.0]);
    assert!(h.session().seeking);

    h.event(DecoderEvent::Seeked).await;
    assert!(!h.session().seeking);
}

/// Segment time is mapped back to source time through the anchor
#[tokio::test(start_paused = true)]
async fn test_progress_reported_in_source_time() {
    let mut h = transcoding_at(10.0).await;
    h.controller.seek(123.4).unwrap();
    h.fire_next_timer().await;
    h.event(DecoderEvent::LoadedMetadata(478.0)).await;

    h.event(DecoderEvent::TimeUpdate(5.0)).await;

    assert_eq!(h.session().absolute_current_time, 127.0);
    let snapshot = h.controller.snapshot().unwrap();
    assert_eq!(snapshot.session.transcode_anchor, 122.0);
}
