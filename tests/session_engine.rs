//! End-to-end behavior of the session engine: several tabs sharing one
//! in-process store, driven through the `Session` interface with a manual
//! clock.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use tabnote::Session;
use tabnote::clock::ManualClock;
use tabnote::io::store::{KeyValueStore, MemoryStore, StoreError};
use tabnote::model::config::Config;
use tabnote::model::{DueDate, Field, SessionId, TextField};
use tabnote::ops::backup::parse_backup;
use tabnote::ops::pipeline::{PipelineEvent, PipelineOutput};
use tabnote::ops::reconcile::LoadCase;
use tabnote::ops::scan::{SessionSummary, SortMode};

type Shared = Rc<RefCell<MemoryStore>>;

fn shared_store() -> Shared {
    Rc::new(RefCell::new(MemoryStore::new()))
}

fn open_tab(store: &Shared, clock: &ManualClock, location: &str) -> Session<Shared> {
    let (session, _) = Session::open(
        Rc::clone(store),
        location,
        Arc::new(clock.clone()),
        Config::default(),
    )
    .unwrap();
    session
}

fn type_and_save(tab: &mut Session<Shared>, clock: &ManualClock, field: TextField, value: &str) {
    tab.record_edit(field, value).unwrap();
    clock.advance(1_000);
    tab.dispatch(PipelineEvent::Tick).unwrap();
}

fn ids(sessions: &[SessionSummary]) -> Vec<&str> {
    sessions.iter().map(|s| s.session_id.as_str()).collect()
}

/// Counts writes per key, for checking that bursts collapse.
struct CountingStore {
    inner: MemoryStore,
    writes: Vec<String>,
}

impl KeyValueStore for CountingStore {
    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.writes.push(key.to_string());
        self.inner.set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        self.inner.remove_item(key)
    }
}

#[test]
fn two_tabs_are_both_listed_with_their_own_fields() {
    let store = shared_store();
    let clock = ManualClock::starting_at(1_000_000);
    let mut tab_a = open_tab(&store, &clock, "https://t.local/?win=a");
    let mut tab_b = open_tab(&store, &clock, "https://t.local/?win=b");

    type_and_save(&mut tab_a, &clock, TextField::Title, "Task A");
    type_and_save(&mut tab_b, &clock, TextField::Details, "details of B");
    tab_b
        .select_due_date(DueDate::parse("2025-09-01"))
        .unwrap();

    for mode in [SortMode::Insertion, SortMode::Recency, SortMode::Title] {
        let sessions = tab_a.scan_directory(mode);
        assert_eq!(sessions.len(), 2);
        let a = sessions.iter().find(|s| s.session_id.as_str() == "win_a").unwrap();
        let b = sessions.iter().find(|s| s.session_id.as_str() == "win_b").unwrap();
        assert_eq!((a.title.as_str(), a.details.as_str()), ("Task A", ""));
        assert_eq!((b.title.as_str(), b.details.as_str()), ("", "details of B"));
        assert_eq!(b.due_date, DueDate::parse("2025-09-01"));
        assert_eq!(a.due_date, DueDate::NoDate);
    }
}

#[test]
fn deleting_one_session_leaves_the_other() {
    let store = shared_store();
    let clock = ManualClock::starting_at(0);
    let mut tab_a = open_tab(&store, &clock, "https://t.local/?win=a");
    let mut tab_b = open_tab(&store, &clock, "https://t.local/?win=b");
    type_and_save(&mut tab_a, &clock, TextField::Title, "A");
    type_and_save(&mut tab_b, &clock, TextField::Title, "B");
    tab_b.select_due_date(DueDate::NoDate).unwrap();

    let a = SessionId::canonicalize(Some("a"));
    tab_b.delete_session(&a).unwrap();

    let sessions = tab_b.scan_directory(SortMode::Insertion);
    assert_eq!(ids(&sessions), vec!["win_b"]);
    assert_eq!(sessions[0].title, "B");
    assert!(store.borrow().keys().iter().all(|k| !k.ends_with("win_a")));
}

#[test]
fn url_content_is_adopted_only_into_absent_keys() {
    let store = shared_store();
    let clock = ManualClock::starting_at(5_000);
    let (_, initial) = Session::open(
        Rc::clone(&store),
        "https://t.local/?win=foo&title=Hello",
        Arc::new(clock.clone()),
        Config::default(),
    )
    .unwrap();
    assert_eq!(initial.case, LoadCase::UrlOnly);
    assert_eq!(store.borrow().get_item("pageTitle_win_foo").as_deref(), Some("Hello"));
    assert_eq!(
        store.borrow().get_item("timestamp_pageTitle_win_foo").as_deref(),
        Some("5000")
    );

    // Same URL, but the title was explicitly saved empty since
    let other = shared_store();
    other
        .borrow_mut()
        .set_item("pageTitle_win_foo", "")
        .unwrap();
    let (_, initial) = Session::open(
        Rc::clone(&other),
        "https://t.local/?win=foo&title=Hello",
        Arc::new(clock.clone()),
        Config::default(),
    )
    .unwrap();
    assert!(initial.adopted.is_empty());
    assert_eq!(other.borrow().get_item("pageTitle_win_foo").as_deref(), Some(""));
}

#[test]
fn backup_round_trip_restores_identical_directory() {
    let store = shared_store();
    let clock = ManualClock::starting_at(1_700_000_000_000);
    let mut tab_a = open_tab(&store, &clock, "https://t.local/?win=a");
    let mut tab_b = open_tab(&store, &clock, "https://t.local/?win=b&title=From+URL");
    type_and_save(&mut tab_a, &clock, TextField::Title, "Alpha");
    type_and_save(&mut tab_a, &clock, TextField::Details, "line 1\nline 2");
    tab_b.select_due_date(DueDate::parse("2026-01-01")).unwrap();
    // A session whose only key holds an explicitly empty title
    store.borrow_mut().set_item("pageTitle_win_empty", "").unwrap();
    // A title cleared by the user: empty, but saved
    let mut tab_c = open_tab(&store, &clock, "https://t.local/?win=c");
    type_and_save(&mut tab_c, &clock, TextField::Title, "");

    let before = tab_a.scan_directory(SortMode::Insertion);
    let json = tab_a.export_backup().unwrap().to_json().unwrap();

    let restored = shared_store();
    let mut fresh = open_tab(&restored, &clock, "https://t.local/");
    fresh.import_backup(&parse_backup(&json).unwrap()).unwrap();
    let after = fresh.scan_directory(SortMode::Insertion);

    assert_eq!(ids(&after), ids(&before));
    for (x, y) in before.iter().zip(&after) {
        assert_eq!(x.title, y.title);
        assert_eq!(x.details, y.details);
        assert_eq!(x.due_date, y.due_date);
        assert_eq!(x.last_updated, y.last_updated);
        for field in Field::ALL {
            assert_eq!(
                tab_a.gateway().has_field(&x.session_id, field),
                fresh.gateway().has_field(&y.session_id, field),
                "{} {field:?}",
                x.session_id
            );
        }
    }
}

#[test]
fn ten_rapid_edits_collapse_into_one_write() {
    let clock = ManualClock::starting_at(0);
    let store = CountingStore {
        inner: MemoryStore::new(),
        writes: Vec::new(),
    };
    let (mut tab, _) = Session::open(
        store,
        "https://t.local/?win=typing",
        Arc::new(clock.clone()),
        Config::default(),
    )
    .unwrap();
    let navigation = tab.subscribe_navigation();
    let url_writes_before = tab.location().clone();

    for i in 1..=10 {
        tab.record_edit(TextField::Title, format!("draft {i}")).unwrap();
        clock.advance(90);
        assert!(tab.dispatch(PipelineEvent::Tick).unwrap().is_empty());
    }
    clock.advance(1_000);
    let outputs = tab.dispatch(PipelineEvent::Tick).unwrap();
    assert!(outputs.contains(&PipelineOutput::Saved(vec![TextField::Title])));

    let navigations: Vec<_> = navigation.try_iter().collect();
    assert_eq!(navigations.len(), 1);
    assert_ne!(tab.location(), &url_writes_before);
    assert_eq!(
        tab.location().query(),
        Some("win=win_typing&title=draft+10")
    );

    let store = tab.into_store();
    let title_writes = store
        .writes
        .iter()
        .filter(|k| k.as_str() == "pageTitle_win_typing")
        .count();
    assert_eq!(title_writes, 1);
    assert_eq!(store.inner.get_item("pageTitle_win_typing").as_deref(), Some("draft 10"));
}

#[test]
fn sort_modes_give_expected_orders() {
    let store = shared_store();
    let clock = ManualClock::starting_at(0);
    for (win, title) in [("1", "pear"), ("2", "Apple"), ("3", "mango")] {
        let mut tab = open_tab(&store, &clock, &format!("https://t.local/?win={win}"));
        type_and_save(&mut tab, &clock, TextField::Title, title);
    }
    let tab = open_tab(&store, &clock, "https://t.local/");

    assert_eq!(
        ids(&tab.scan_directory(SortMode::Recency)),
        vec!["win_3", "win_2", "win_1"]
    );
    assert_eq!(
        ids(&tab.scan_directory(SortMode::Title)),
        vec!["win_2", "win_3", "win_1"]
    );
    let first = tab.scan_directory(SortMode::Insertion);
    let second = tab.scan_directory(SortMode::Insertion);
    assert_eq!(ids(&first), vec!["win_1", "win_2", "win_3"]);
    assert_eq!(first, second);
}

#[test]
fn no_date_sentinel_and_absent_key_read_the_same() {
    let store = shared_store();
    let clock = ManualClock::starting_at(0);
    let mut cleared = open_tab(&store, &clock, "https://t.local/?win=cleared");
    cleared.select_due_date(DueDate::NoDate).unwrap();
    let never = SessionId::canonicalize(Some("never"));
    let cleared_id = cleared.session_id().clone();

    let gateway = cleared.gateway();
    assert_eq!(gateway.due_date(&cleared_id), DueDate::NoDate);
    assert_eq!(gateway.due_date(&never), DueDate::NoDate);
    assert_eq!(gateway.raw(&cleared_id, Field::DueDate).as_deref(), Some("0"));
    assert!(gateway.has_field(&cleared_id, Field::DueDate));
    assert!(!gateway.has_field(&never, Field::DueDate));
}

#[test]
fn other_tabs_edits_show_up_on_background_refresh() {
    let store = shared_store();
    let clock = ManualClock::starting_at(0);
    let mut watcher = open_tab(&store, &clock, "https://t.local/?win=w");
    let mut writer = open_tab(&store, &clock, "https://t.local/?win=x");

    type_and_save(&mut writer, &clock, TextField::Title, "written elsewhere");

    clock.set(30_000);
    let outputs = watcher.dispatch(PipelineEvent::Tick).unwrap();
    let refreshed = outputs.iter().find_map(|o| match o {
        PipelineOutput::DirectoryRefreshed(s) => Some(s),
        _ => None,
    });
    assert_eq!(refreshed.map(|s| ids(s)), Some(vec!["win_x"]));
}
