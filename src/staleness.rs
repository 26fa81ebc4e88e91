//! Staleness filter
//!
//! After a connector reconnect the chat backfills messages that were posted
//! while nobody was listening. Those are not answered.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::chat::ChatEvent;

/// Events older than this are not answered
pub const STALENESS_THRESHOLD: Duration = Duration::from_secs(30);

/// Whether `event` is older than `threshold` at `now`
///
/// An event exactly at the threshold is still fresh, and events stamped in
/// the future (clock skew) are always fresh.
#[must_use]
pub fn is_stale_after(event: &ChatEvent, now: DateTime<Utc>, threshold: Duration) -> bool {
    let age = now.signed_duration_since(event.received_at);
    age.to_std().is_ok_and(|age| age > threshold)
}

/// Whether `event` is older than [`STALENESS_THRESHOLD`] at `now`
#[must_use]
pub fn is_stale(event: &ChatEvent, now: DateTime<Utc>) -> bool {
    is_stale_after(event, now, STALENESS_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::chat::Segment;

    fn event_aged(now: DateTime<Utc>, millis: i64) -> ChatEvent {
        ChatEvent::new(
            now - TimeDelta::milliseconds(millis),
            vec![Segment::text("hi")],
        )
    }

    #[test]
    fn fresh_event_is_not_stale() {
        let now = Utc::now();
        assert!(!is_stale(&event_aged(now, 0), now));
        assert!(!is_stale(&event_aged(now, 29_999), now));
    }

    #[test]
    fn threshold_is_exclusive() {
        let now = Utc::now();
        assert!(!is_stale(&event_aged(now, 30_000), now));
        assert!(is_stale(&event_aged(now, 30_001), now));
    }

    #[test]
    fn old_event_is_stale() {
        let now = Utc::now();
        assert!(is_stale(&event_aged(now, 40_000), now));
    }

    #[test]
    fn future_event_is_fresh() {
        let now = Utc::now();
        assert!(!is_stale(&event_aged(now, -5_000), now));
    }

    #[test]
    fn custom_threshold() {
        let now = Utc::now();
        let event = event_aged(now, 5_000);
        assert!(is_stale_after(&event, now, Duration::from_secs(1)));
        assert!(!is_stale_after(&event, now, Duration::from_secs(10)));
    }
}
