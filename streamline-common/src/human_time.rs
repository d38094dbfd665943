//! Human-readable playback position formatting
//!
//! Used by status messages ("Seeking to 1:02:03...") so every component renders
//! source positions the same way.

/// Positions below this many seconds render as `M:SS`
const HOUR_SECS: u64 = 3600;

/// Format a source position as `M:SS` or `H:MM:SS`.
///
/// Fractional seconds are truncated. Negative, NaN and infinite inputs render as `0:00`
/// since they only appear before metadata is known.
///
/// # Examples
///
/// ```
/// use streamline_common::human_time::format_position;
///
/// assert_eq!(format_position(5.9), "0:05");
/// assert_eq!(format_position(330.0), "5:30");
/// assert_eq!(format_position(3661.0), "1:01:01");
/// assert_eq!(format_position(-1.0), "0:00");
/// ```
pub fn format_position(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = total / HOUR_SECS;
    let mins = (total % HOUR_SECS) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
