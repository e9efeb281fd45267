//! crates/library_core/src/ledger.rs
//!
//! The usage ledger: append-only read/download events and the reporting
//! queries built on top of them.

use crate::domain::{
    BookDownloads, BookId, BookUsageReport, LibraryTotals, UsageEntry, UsageEvent, UsageEventId,
    UsageKind, UserId,
};
use crate::ports::{DatabaseService, PortResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Name shown for events whose user no longer exists.
pub fn placeholder_name(user_id: UserId) -> String {
    format!("User #{}", user_id)
}

#[derive(Clone)]
pub struct UsageLedger {
    db: Arc<dyn DatabaseService>,
}

impl UsageLedger {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Appends one event. Storage failures are surfaced unchanged.
    pub async fn record(
        &self,
        kind: UsageKind,
        user_id: UserId,
        book_id: BookId,
    ) -> PortResult<UsageEventId> {
        self.db.record_usage(kind, user_id, book_id).await
    }

    /// Both event lists for a book, newest first, with user names resolved now.
    pub async fn aggregate_for_book(&self, book_id: BookId) -> PortResult<BookUsageReport> {
        let reads = self.db.usage_for_book(UsageKind::Read, book_id).await?;
        let downloads = self.db.usage_for_book(UsageKind::Download, book_id).await?;

        let user_ids: Vec<UserId> = reads
            .iter()
            .chain(downloads.iter())
            .map(|e| e.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let names = if user_ids.is_empty() {
            HashMap::new()
        } else {
            self.db.user_names(&user_ids).await?
        };

        Ok(BookUsageReport {
            reads: label_events(reads, &names),
            downloads: label_events(downloads, &names),
        })
    }

    pub async fn count_all(&self) -> PortResult<LibraryTotals> {
        self.db.totals().await
    }

    pub async fn downloads_per_book(&self) -> PortResult<Vec<BookDownloads>> {
        self.db.downloads_per_book().await
    }

    pub async fn list(&self, kind: UsageKind) -> PortResult<Vec<UsageEvent>> {
        self.db.list_usage(kind).await
    }
}

/// Joins events with display names, keeping their order.
fn label_events(events: Vec<UsageEvent>, names: &HashMap<UserId, String>) -> Vec<UsageEntry> {
    events
        .into_iter()
        .map(|event| UsageEntry {
            id: event.id,
            user_id: event.user_id,
            name: names
                .get(&event.user_id)
                .cloned()
                .unwrap_or_else(|| placeholder_name(event.user_id)),
            occurred_at: event.occurred_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn event(id: i64, user_id: UserId, minutes: i64) -> UsageEvent {
        UsageEvent {
            id,
            kind: UsageKind::Read,
            user_id,
            book_id: 1,
            occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn placeholder_uses_the_user_id() {
        assert_eq!(placeholder_name(42), "User #42");
    }

    #[test]
    fn missing_users_get_placeholder_names() {
        let names = HashMap::from([(1, "Ada".to_string())]);
        let entries = label_events(vec![event(10, 1, 5), event(9, 3, 1)], &names);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Ada");
        assert_eq!(entries[1].name, "User #3");
    }

    #[test]
    fn labelling_preserves_event_order() {
        let entries = label_events(
            vec![event(3, 1, 30), event(2, 1, 20), event(1, 2, 10)],
            &HashMap::new(),
        );
        let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
