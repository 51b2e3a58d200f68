use chrono::{DateTime, Duration, Utc};

use crate::feed::parser::FeedEntry;

/// Keeps entries published strictly after `now - window` that carry a link
/// and a publish date, sorted oldest first.
///
/// An entry published exactly at the cutoff is excluded. The sort is stable,
/// so entries sharing a timestamp keep their feed order.
pub fn recent_entries(
    entries: Vec<FeedEntry>,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<FeedEntry> {
    let cutoff = now - window;

    let mut recent: Vec<FeedEntry> = entries
        .into_iter()
        .filter(|e| e.link.is_some() && e.published.is_some_and(|p| p > cutoff))
        .collect();
    recent.sort_by_key(|e| e.published);
    recent
}
