use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::io::gateway::{SessionRecord, StorageGateway};
use crate::io::store::KeyValueStore;
use crate::model::{DueDate, SessionId, TextField};

/// Order of the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Storage enumeration order
    #[default]
    Insertion,
    /// Most recently saved first; never-saved sessions last
    Recency,
    /// Title, case-insensitive
    Title,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "insertion" => Ok(SortMode::Insertion),
            "updated" | "recency" => Ok(SortMode::Recency),
            "title" => Ok(SortMode::Title),
            other => Err(format!("unknown sort mode: {other} (expected none, updated or title)")),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortMode::Insertion => "none",
            SortMode::Recency => "updated",
            SortMode::Title => "title",
        };
        f.write_str(name)
    }
}

/// One discovered session, as read at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub title: String,
    pub details: String,
    pub due_date: DueDate,
    /// Newest of the title and details save times
    pub last_updated: Option<DateTime<Utc>>,
    /// Enumeration position of the key that first revealed this session
    pub original_index: usize,
}

impl SessionSummary {
    /// No title, no details, and no due date. Such sessions are still
    /// reported; hiding them is up to the caller.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.details.is_empty() && !self.due_date.is_set()
    }
}

/// Discover every session with at least one field key and summarize it.
///
/// Discovery is key-driven and reads one snapshot of the store, so a scan
/// costs one enumeration however many sessions there are.
pub fn scan<S: KeyValueStore>(gateway: &StorageGateway<S>, mode: SortMode) -> Vec<SessionSummary> {
    let mut sessions: Vec<SessionSummary> =
        gateway.records().iter().map(summarize).collect();

    tracing::debug!(count = sessions.len(), sort = %mode, "scanned sessions");
    sort_sessions(&mut sessions, mode);
    sessions
}

fn summarize(record: &SessionRecord) -> SessionSummary {
    SessionSummary {
        session_id: record.session_id.clone(),
        title: record.text(TextField::Title),
        details: record.text(TextField::Details),
        due_date: record.due_date(),
        last_updated: record.last_updated(),
        original_index: record.first_index,
    }
}

/// Stable sort in place.
pub fn sort_sessions(sessions: &mut [SessionSummary], mode: SortMode) {
    match mode {
        SortMode::Insertion => sessions.sort_by_key(|s| s.original_index),
        SortMode::Recency => {
            sessions.sort_by(|a, b| match (a.last_updated, b.last_updated) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
        }
        SortMode::Title => sessions.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::io::store::MemoryStore;
    use crate::model::Field;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn id(raw: &str) -> SessionId {
        SessionId::canonicalize(Some(raw))
    }

    fn ids(sessions: &[SessionSummary]) -> Vec<&str> {
        sessions.iter().map(|s| s.session_id.as_str()).collect()
    }

    fn setup() -> (StorageGateway<MemoryStore>, ManualClock) {
        let clock = ManualClock::starting_at(1_000);
        let gw = StorageGateway::new(MemoryStore::new(), Arc::new(clock.clone()));
        (gw, clock)
    }

    #[test]
    fn each_session_is_reported_once() {
        let (mut gw, _) = setup();
        gw.set_text(&id("a"), TextField::Title, "Alpha").unwrap();
        gw.set_text(&id("a"), TextField::Details, "first").unwrap();
        gw.set_due_date(&id("a"), DueDate::Date(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()))
            .unwrap();
        gw.set_text(&id("b"), TextField::Details, "second").unwrap();

        let sessions = scan(&gw, SortMode::Insertion);
        assert_eq!(ids(&sessions), vec!["win_a", "win_b"]);
        assert_eq!(sessions[0].title, "Alpha");
        assert_eq!(sessions[0].details, "first");
        assert!(sessions[0].due_date.is_set());
        assert_eq!(sessions[1].title, "");
        assert_eq!(sessions[1].details, "second");
        assert_eq!(sessions[1].original_index, 5);
    }

    #[test]
    fn lingering_timestamp_key_is_still_discovered() {
        let (mut gw, _) = setup();
        gw.put_raw(&id("ghost"), Field::TitleTimestamp, "123").unwrap();

        let sessions = scan(&gw, SortMode::Insertion);
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_blank());
        assert_eq!(
            sessions[0].last_updated.map(|t| t.timestamp_millis()),
            Some(123)
        );
    }

    #[test]
    fn unrelated_and_global_keys_are_ignored() {
        let (mut gw, _) = setup();
        gw.set_global(crate::model::GlobalKey::LastBackup, "2025-01-01T00:00:00Z")
            .unwrap();
        gw.set_text(&id("a"), TextField::Title, "A").unwrap();
        assert_eq!(ids(&scan(&gw, SortMode::Insertion)), vec!["win_a"]);
    }

    #[test]
    fn repeated_prefix_keys_are_read_and_deletable() {
        let clock = ManualClock::starting_at(0);
        let mut gw = StorageGateway::new(
            MemoryStore::from_entries([
                ("pageTitle_win_win_x", "Hello"),
                ("timestamp_pageTitle_win_win_x", "500"),
            ]),
            Arc::new(clock),
        );

        let sessions = scan(&gw, SortMode::Insertion);
        assert_eq!(ids(&sessions), vec!["win_x"]);
        assert_eq!(sessions[0].title, "Hello");
        assert_eq!(sessions[0].last_updated.map(|t| t.timestamp_millis()), Some(500));

        gw.delete_session(&id("x")).unwrap();
        assert!(scan(&gw, SortMode::Insertion).is_empty());
    }

    /// Counts point reads, to check that a scan works from one snapshot.
    struct ReadCounting {
        inner: MemoryStore,
        point_reads: std::cell::Cell<usize>,
    }

    impl KeyValueStore for ReadCounting {
        fn keys(&self) -> Vec<String> {
            self.inner.keys()
        }

        fn get_item(&self, key: &str) -> Option<String> {
            self.point_reads.set(self.point_reads.get() + 1);
            self.inner.get_item(key)
        }

        fn set_item(&mut self, key: &str, value: &str) -> Result<(), crate::io::store::StoreError> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&mut self, key: &str) -> Result<(), crate::io::store::StoreError> {
            self.inner.remove_item(key)
        }

        fn entries(&self) -> Vec<(String, String)> {
            self.inner.entries()
        }
    }

    #[test]
    fn scan_reads_one_snapshot() {
        let mut inner = MemoryStore::new();
        for n in 0..20 {
            inner.set_item(&format!("pageTitle_win_{n}"), "t").unwrap();
            inner.set_item(&format!("timestamp_pageTitle_win_{n}"), "1").unwrap();
        }
        let store = ReadCounting {
            inner,
            point_reads: std::cell::Cell::new(0),
        };
        let gw = StorageGateway::new(store, Arc::new(ManualClock::starting_at(0)));

        assert_eq!(scan(&gw, SortMode::Recency).len(), 20);
        assert_eq!(gw.store().point_reads.get(), 0);
    }

    #[test]
    fn recency_puts_newest_first_and_unsaved_last() {
        let (mut gw, clock) = setup();
        gw.set_text(&id("old"), TextField::Title, "old").unwrap();
        clock.advance(10);
        gw.set_text(&id("new"), TextField::Title, "new").unwrap();
        gw.set_due_date(&id("dateonly"), DueDate::NoDate).unwrap();
        clock.advance(10);
        gw.set_text(&id("old"), TextField::Details, "touched").unwrap();

        let sessions = scan(&gw, SortMode::Recency);
        assert_eq!(ids(&sessions), vec!["win_old", "win_new", "win_dateonly"]);
    }

    #[test]
    fn title_sort_ignores_case() {
        let (mut gw, _) = setup();
        for (raw, title) in [("1", "banana"), ("2", "Apple"), ("3", "cherry"), ("4", "apple")] {
            gw.set_text(&id(raw), TextField::Title, title).unwrap();
        }
        let sessions = scan(&gw, SortMode::Title);
        assert_eq!(ids(&sessions), vec!["win_2", "win_4", "win_1", "win_3"]);
    }

    #[test]
    fn insertion_order_is_stable_across_scans() {
        let (mut gw, _) = setup();
        for raw in ["c", "a", "b"] {
            gw.set_text(&id(raw), TextField::Title, raw).unwrap();
        }
        let first = scan(&gw, SortMode::Insertion);
        let second = scan(&gw, SortMode::Insertion);
        assert_eq!(first, second);
        assert_eq!(ids(&first), vec!["win_c", "win_a", "win_b"]);
    }

    #[test]
    fn sort_mode_names() {
        assert_eq!("none".parse::<SortMode>(), Ok(SortMode::Insertion));
        assert_eq!("Updated".parse::<SortMode>(), Ok(SortMode::Recency));
        assert_eq!("title".parse::<SortMode>(), Ok(SortMode::Title));
        assert!("size".parse::<SortMode>().is_err());
        assert_eq!(SortMode::Recency.to_string(), "updated");
    }
}
