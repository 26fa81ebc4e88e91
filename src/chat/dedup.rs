//! Duplicate suppression for polled chat
//!
//! Consecutive `get_live_chat` pages overlap around continuation boundaries,
//! so a message id can arrive twice. Ids are remembered over a window of
//! message time (the `received_at` stamps), not wall time: a slow or failing
//! poll does not make the connector forget ids it has not moved past yet.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};

use super::ChatEvent;

/// How far behind the newest message an id is still remembered
///
/// Twice the staleness threshold; older repeats would be skipped as stale
/// anyway.
pub const DEDUP_WINDOW: TimeDelta = TimeDelta::seconds(60);

/// Hard cap on remembered ids during chat bursts
const MAX_REMEMBERED: usize = 4096;

/// Remembers recently delivered chat message ids
#[derive(Debug)]
pub struct MessageDedup {
    seen: HashSet<String>,
    /// Ids in delivery order with their message time
    recent: VecDeque<(DateTime<Utc>, String)>,
    newest: Option<DateTime<Utc>>,
    window: TimeDelta,
    capacity: usize,
}

impl Default for MessageDedup {
    fn default() -> Self {
        Self::new(DEDUP_WINDOW, MAX_REMEMBERED)
    }
}

impl MessageDedup {
    /// Remember ids for `window` of message time, at most `capacity` of them
    #[must_use]
    pub fn new(window: TimeDelta, capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            recent: VecDeque::new(),
            newest: None,
            window,
            capacity: capacity.max(1),
        }
    }

    /// Whether `event` was already delivered; records it if not
    ///
    /// Events without an id are never treated as duplicates.
    pub fn is_duplicate(&mut self, event: &ChatEvent) -> bool {
        if event.id.is_empty() {
            return false;
        }
        if self.seen.contains(&event.id) {
            return true;
        }

        let newest = self
            .newest
            .map_or(event.received_at, |n| n.max(event.received_at));
        self.newest = Some(newest);
        let cutoff = newest
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.forget_before(cutoff);

        self.seen.insert(event.id.clone());
        self.recent.push_back((event.received_at, event.id.clone()));
        false
    }

    /// Drop ids older than `cutoff`, and the oldest ids beyond capacity
    fn forget_before(&mut self, cutoff: DateTime<Utc>) {
        while let Some((at, _)) = self.recent.front() {
            if *at >= cutoff && self.recent.len() < self.capacity {
                break;
            }
            if let Some((_, id)) = self.recent.pop_front() {
                self.seen.remove(&id);
            }
        }
    }

    /// Number of remembered ids
    #[must_use]
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Whether no ids are remembered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Segment;

    fn message(id: &str, at: DateTime<Utc>) -> ChatEvent {
        let mut event = ChatEvent::new(at, vec![Segment::text("こんにちは")]);
        event.id = id.to_string();
        event
    }

    #[test]
    fn repeated_id_is_duplicate() {
        let now = Utc::now();
        let mut dedup = MessageDedup::default();

        assert!(!dedup.is_duplicate(&message("a", now)));
        assert!(dedup.is_duplicate(&message("a", now)));
        assert!(!dedup.is_duplicate(&message("b", now)));
    }

    #[test]
    fn ids_expire_by_message_time() {
        let start = Utc::now();
        let mut dedup = MessageDedup::new(TimeDelta::seconds(10), 100);

        assert!(!dedup.is_duplicate(&message("a", start)));
        assert!(!dedup.is_duplicate(&message("b", start + TimeDelta::seconds(5))));
        assert!(dedup.is_duplicate(&message("a", start)));

        // A later message moves the window past "a"
        assert!(!dedup.is_duplicate(&message("c", start + TimeDelta::seconds(11))));
        assert!(!dedup.is_duplicate(&message("a", start)));
        assert!(dedup.is_duplicate(&message("b", start)));
    }

    #[test]
    fn capacity_is_bounded() {
        let now = Utc::now();
        let mut dedup = MessageDedup::new(DEDUP_WINDOW, 3);

        for id in ["a", "b", "c", "d", "e"] {
            dedup.is_duplicate(&message(id, now));
        }

        assert_eq!(dedup.len(), 3);
        assert!(!dedup.is_duplicate(&message("a", now)));
    }

    #[test]
    fn events_without_id_pass() {
        let now = Utc::now();
        let mut dedup = MessageDedup::default();

        assert!(!dedup.is_duplicate(&message("", now)));
        assert!(!dedup.is_duplicate(&message("", now)));
        assert!(dedup.is_empty());
    }
}
