//! Per-member record of the last go-live notification.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

/// Last go-live edge seen per member.
///
/// Entries are written on every go-live edge, whether or not an announcement
/// is eventually sent.
#[derive(Debug, Default)]
pub struct StreamHistory {
    entries: DashMap<String, DateTime<Utc>>,
}

impl StreamHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `now` for `member_id` and return the previous timestamp.
    ///
    /// The swap is atomic, so of two concurrent edges for the same member
    /// exactly one observes the older value.
    pub fn record(&self, member_id: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.entries.insert(member_id.to_string(), now)
    }

    pub fn last_notified(&self, member_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(member_id).map(|entry| *entry)
    }

    /// Drop entries whose cooldown has elapsed at `now`.
    ///
    /// An elapsed entry and a missing entry lead to the same decision, so
    /// sweeping never changes whether a member gets announced.
    pub fn sweep(&self, now: DateTime<Utc>, cooldown: TimeDelta) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, last| within_cooldown(*last, now, cooldown));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `now` falls inside the cooldown window started at `last`.
pub(crate) fn within_cooldown(last: DateTime<Utc>, now: DateTime<Utc>, cooldown: TimeDelta) -> bool {
    match last.checked_add_signed(cooldown) {
        Some(until) => now < until,
        // A cooldown reaching past the representable range never ends.
        None => true,
    }
}

/// State owned by the host process and shared across notifier reloads.
#[derive(Debug, Clone, Default)]
pub struct NotifierContext {
    history: Arc<StreamHistory>,
}

impl NotifierContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &Arc<StreamHistory> {
        &self.history
    }
}
