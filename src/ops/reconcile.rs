use serde::Serialize;

use crate::io::gateway::StorageGateway;
use crate::io::store::{KeyValueStore, StoreError};
use crate::io::url_state::UrlMirror;
use crate::model::{DueDate, Field, SessionId, TextField};

/// Where session content was found when the tab loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadCase {
    UrlOnly,
    StorageOnly,
    BothEmpty,
    BothPresent,
}

impl LoadCase {
    fn classify(url_has_content: bool, storage_has_content: bool) -> Self {
        match (url_has_content, storage_has_content) {
            (true, false) => LoadCase::UrlOnly,
            (false, true) => LoadCase::StorageOnly,
            (false, false) => LoadCase::BothEmpty,
            (true, true) => LoadCase::BothPresent,
        }
    }
}

/// The authoritative starting state for one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialState {
    pub session_id: SessionId,
    pub title: String,
    pub details: String,
    pub due_date: DueDate,
    pub case: LoadCase,
    /// Fields copied from the URL into storage during this load
    pub adopted: Vec<Field>,
    /// A fresh id was generated because the URL carried none
    pub minted: bool,
}

/// Merge URL and stored state for the tab at `mirror`'s location.
///
/// URL content is adopted into storage only for fields whose key does not
/// exist yet; a key holding an explicitly saved empty string is left alone.
/// Effective values prefer the URL, then storage, then empty. The URL is
/// rewritten afterwards so its shape is normalized. Values stored under
/// non-canonical keys are moved to their canonical keys first.
pub fn reconcile_on_load<S: KeyValueStore>(
    gateway: &mut StorageGateway<S>,
    mirror: &mut UrlMirror,
) -> Result<InitialState, StoreError> {
    gateway.repair_keys()?;
    let url = mirror.read();
    let parsed = url.win.as_deref().and_then(SessionId::parse);
    let minted = parsed.is_none();
    let session_id = parsed.unwrap_or_else(SessionId::generate);

    let url_due = url.due_date.as_deref().and_then(|raw| {
        let date = DueDate::parse_strict(raw);
        if date.is_none() {
            tracing::debug!(value = raw, "ignoring malformed dueDate in URL");
        }
        date
    });

    let storage_has_content = Field::ALL
        .iter()
        .any(|&field| gateway.has_field(&session_id, field));
    let url_has_content = url.title.is_some() || url.details.is_some() || url_due.is_some();
    let case = LoadCase::classify(url_has_content, storage_has_content);

    let mut adopted = Vec::new();
    for (field, url_value) in [
        (TextField::Title, url.title.as_deref()),
        (TextField::Details, url.details.as_deref()),
    ] {
        if let Some(value) = url_value
            && gateway.stored_text(&session_id, field).is_none()
        {
            gateway.set_text(&session_id, field, value)?;
            adopted.push(field.field());
        }
    }
    if let Some(date) = url_due
        && !gateway.has_field(&session_id, Field::DueDate)
    {
        gateway.set_due_date(&session_id, DueDate::Date(date))?;
        adopted.push(Field::DueDate);
    }

    let title = url
        .title
        .unwrap_or_else(|| gateway.text(&session_id, TextField::Title));
    let details = url
        .details
        .unwrap_or_else(|| gateway.text(&session_id, TextField::Details));
    let due_date = url_due.map_or_else(|| gateway.due_date(&session_id), DueDate::Date);

    tracing::debug!(session = %session_id, ?case, ?adopted, minted, "reconciled on load");
    mirror.write(gateway, &session_id, &title, &details);

    Ok(InitialState {
        session_id,
        title,
        details,
        due_date,
        case,
        adopted,
        minted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::io::store::MemoryStore;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn gateway() -> StorageGateway<MemoryStore> {
        StorageGateway::new(MemoryStore::new(), Arc::new(ManualClock::starting_at(42_000)))
    }

    fn id(raw: &str) -> SessionId {
        SessionId::canonicalize(Some(raw))
    }

    #[test]
    fn url_only_adopts_into_storage() {
        let mut gw = gateway();
        let mut mirror = UrlMirror::parse("https://t.local/?win=foo&title=Hello").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        assert_eq!(state.session_id.as_str(), "win_foo");
        assert_eq!(state.case, LoadCase::UrlOnly);
        assert_eq!(state.adopted, vec![Field::Title]);
        assert!(!state.minted);
        assert_eq!(gw.text(&id("foo"), TextField::Title), "Hello");
        assert_eq!(
            gw.timestamp(&id("foo"), TextField::Title).map(|t| t.timestamp_millis()),
            Some(42_000)
        );
        assert!(!gw.has_field(&id("foo"), Field::Details));
    }

    #[test]
    fn explicitly_saved_empty_title_is_not_overwritten() {
        let mut gw = gateway();
        gw.set_text(&id("foo"), TextField::Title, "").unwrap();
        let mut mirror = UrlMirror::parse("https://t.local/?win=foo&title=Hello").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        assert_eq!(state.case, LoadCase::BothPresent);
        assert!(state.adopted.is_empty());
        assert_eq!(gw.stored_text(&id("foo"), TextField::Title), Some(String::new()));
        // The URL still wins for what the form shows
        assert_eq!(state.title, "Hello");
    }

    #[test]
    fn storage_only_fills_form_and_url() {
        let mut gw = gateway();
        gw.set_text(&id("foo"), TextField::Title, "Stored").unwrap();
        gw.set_due_date(&id("foo"), DueDate::Date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()))
            .unwrap();
        let mut mirror = UrlMirror::parse("https://t.local/?win=win_foo").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        assert_eq!(state.case, LoadCase::StorageOnly);
        assert_eq!(state.title, "Stored");
        assert_eq!(state.details, "");
        assert!(state.due_date.is_set());
        assert_eq!(
            mirror.location().query(),
            Some("win=win_foo&dueDate=2025-06-01&title=Stored")
        );
    }

    #[test]
    fn missing_win_mints_fresh_id() {
        let mut gw = gateway();
        let mut mirror = UrlMirror::parse("https://t.local/").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        assert!(state.minted);
        assert_eq!(state.case, LoadCase::BothEmpty);
        assert!(gw.keys().is_empty());
        assert_eq!(mirror.read().win.as_deref(), Some(state.session_id.as_str()));
    }

    #[test]
    fn double_prefixed_win_is_normalized() {
        let mut gw = gateway();
        let mut mirror = UrlMirror::parse("https://t.local/?win=win_win_abc").unwrap();
        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();
        assert_eq!(state.session_id.as_str(), "win_abc");
        assert_eq!(mirror.location().query(), Some("win=win_abc"));
    }

    #[test]
    fn repeated_prefix_keys_are_repaired_before_adoption() {
        let mut gw = StorageGateway::new(
            MemoryStore::from_entries([("pageTitle_win_win_foo", "")]),
            Arc::new(ManualClock::starting_at(0)),
        );
        let mut mirror = UrlMirror::parse("https://t.local/?win=foo&title=Hello").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        assert!(state.adopted.is_empty());
        assert_eq!(state.case, LoadCase::BothPresent);
        assert_eq!(gw.keys(), vec!["pageTitle_win_foo"]);
        assert_eq!(gw.stored_text(&id("foo"), TextField::Title), Some(String::new()));
    }

    #[test]
    fn malformed_due_date_falls_back_to_stored() {
        let mut gw = gateway();
        let stored = DueDate::Date(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        gw.set_due_date(&id("foo"), stored).unwrap();
        let mut mirror = UrlMirror::parse("https://t.local/?win=foo&dueDate=31/01/2025").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        assert_eq!(state.due_date, stored);
        assert_eq!(state.case, LoadCase::StorageOnly);
        assert!(!state.adopted.contains(&Field::DueDate));
    }

    #[test]
    fn malformed_due_date_alone_is_not_url_content() {
        let mut gw = gateway();
        let mut mirror = UrlMirror::parse("https://t.local/?win=foo&dueDate=31/01/2025").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        assert_eq!(state.case, LoadCase::BothEmpty);
        assert_eq!(state.due_date, DueDate::NoDate);
        assert!(gw.keys().is_empty());
        assert_eq!(mirror.location().query(), Some("win=win_foo"));
    }

    #[test]
    fn url_due_date_is_adopted_when_no_key_exists() {
        let mut gw = gateway();
        let mut mirror = UrlMirror::parse("https://t.local/?win=foo&dueDate=2025-02-03").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        let expected = DueDate::Date(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        assert_eq!(state.adopted, vec![Field::DueDate]);
        assert_eq!(gw.due_date(&id("foo")), expected);
        assert_eq!(state.due_date, expected);
    }

    #[test]
    fn url_due_date_does_not_replace_stored_sentinel() {
        let mut gw = gateway();
        gw.set_due_date(&id("foo"), DueDate::NoDate).unwrap();
        let mut mirror = UrlMirror::parse("https://t.local/?win=foo&dueDate=2025-02-03").unwrap();

        let state = reconcile_on_load(&mut gw, &mut mirror).unwrap();

        assert!(state.adopted.is_empty());
        assert_eq!(gw.due_date(&id("foo")), DueDate::NoDate);
        // URL beats storage for the effective value
        assert!(state.due_date.is_set());
        // The rewritten URL reflects storage
        assert_eq!(mirror.location().query(), Some("win=win_foo"));
    }
}
