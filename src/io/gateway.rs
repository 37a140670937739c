use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::clock::SharedClock;
use crate::io::store::{KeyValueStore, StoreError, utf16_len};
use crate::model::{
    DueDate, Field, FieldValue, GlobalKey, SessionId, StorageKey, TextField,
};

/// Every stored field of one session, taken from a single store snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: SessionId,
    /// Enumeration index of the first key belonging to this session
    pub first_index: usize,
    values: HashMap<Field, String>,
}

impl SessionRecord {
    pub fn raw(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn text(&self, field: TextField) -> String {
        self.raw(field.field()).unwrap_or_default().to_string()
    }

    pub fn timestamp(&self, field: TextField) -> Option<DateTime<Utc>> {
        let stamp = field.timestamp_field();
        match self.raw(stamp).and_then(|raw| stamp.parse_value(raw)) {
            Some(FieldValue::Timestamp(t)) => Some(t),
            _ => None,
        }
    }

    pub fn due_date(&self) -> DueDate {
        match self.raw(Field::DueDate).and_then(|raw| Field::DueDate.parse_value(raw)) {
            Some(FieldValue::Due(d)) => d,
            _ => DueDate::NoDate,
        }
    }

    /// Newest of the title and details save times.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        [TextField::Title, TextField::Details]
            .into_iter()
            .filter_map(|field| self.timestamp(field))
            .max()
    }
}

/// Typed access to session fields over a raw key/value store.
///
/// This is the only place stored strings are parsed into [`FieldValue`]s
/// and serialized back. Reads never fail: missing or unreadable values come
/// back empty or absent.
pub struct StorageGateway<S> {
    store: S,
    clock: SharedClock,
}

impl<S: KeyValueStore> StorageGateway<S> {
    pub fn new(store: S, clock: SharedClock) -> Self {
        StorageGateway { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The stored string for a field, verbatim.
    pub fn raw(&self, id: &SessionId, field: Field) -> Option<String> {
        self.store.get_item(&StorageKey::new(field, id).encode())
    }

    pub fn has_field(&self, id: &SessionId, field: Field) -> bool {
        self.raw(id, field).is_some()
    }

    pub fn get(&self, id: &SessionId, field: Field) -> Option<FieldValue> {
        self.raw(id, field).and_then(|raw| field.parse_value(&raw))
    }

    /// Text content, empty when never saved.
    pub fn text(&self, id: &SessionId, field: TextField) -> String {
        self.stored_text(id, field).unwrap_or_default()
    }

    /// Text content, `None` only when the key does not exist. An explicitly
    /// saved empty string is `Some("")`.
    pub fn stored_text(&self, id: &SessionId, field: TextField) -> Option<String> {
        self.raw(id, field.field())
    }

    /// Time of the last save of a text field.
    pub fn timestamp(&self, id: &SessionId, field: TextField) -> Option<DateTime<Utc>> {
        match self.get(id, field.timestamp_field()) {
            Some(FieldValue::Timestamp(t)) => Some(t),
            _ => None,
        }
    }

    /// The due date. A stored sentinel and a missing key both read as
    /// `NoDate`; use [`has_field`](Self::has_field) to tell them apart.
    pub fn due_date(&self, id: &SessionId) -> DueDate {
        match self.get(id, Field::DueDate) {
            Some(FieldValue::Due(d)) => d,
            _ => DueDate::NoDate,
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write a typed value. Text fields go through [`set_text`](Self::set_text)
    /// so they are always stamped.
    pub fn set(
        &mut self,
        id: &SessionId,
        field: Field,
        value: &FieldValue,
    ) -> Result<(), StoreError> {
        match (field, value) {
            (Field::Title, FieldValue::Text(text)) => {
                self.set_text(id, TextField::Title, text).map(|_| ())
            }
            (Field::Details, FieldValue::Text(text)) => {
                self.set_text(id, TextField::Details, text).map(|_| ())
            }
            (_, value) if field.kind() == value.kind() => {
                self.put_raw(id, field, &value.serialize())
            }
            (_, value) => Err(StoreError::KindMismatch {
                field,
                kind: value.kind(),
            }),
        }
    }

    /// Save a text field and its companion timestamp, always as a pair.
    /// Returns the timestamp written.
    pub fn set_text(
        &mut self,
        id: &SessionId,
        field: TextField,
        value: &str,
    ) -> Result<DateTime<Utc>, StoreError> {
        let now = self.now();
        self.put_raw(id, field.field(), value)?;
        self.put_raw(
            id,
            field.timestamp_field(),
            &FieldValue::Timestamp(now).serialize(),
        )?;
        Ok(now)
    }

    /// Save the due date. `NoDate` writes the sentinel rather than removing the key.
    pub fn set_due_date(&mut self, id: &SessionId, due: DueDate) -> Result<(), StoreError> {
        self.put_raw(id, Field::DueDate, &due.to_storage())
    }

    /// Write a stored string verbatim, bypassing stamping. Restores only.
    pub fn put_raw(&mut self, id: &SessionId, field: Field, raw: &str) -> Result<(), StoreError> {
        self.store.set_item(&StorageKey::new(field, id).encode(), raw)
    }

    pub fn remove(&mut self, id: &SessionId, field: Field) -> Result<(), StoreError> {
        self.store.remove_item(&StorageKey::new(field, id).encode())
    }

    /// Remove every field key of a session, including keys stored under a
    /// non-canonical spelling of its id. The removes are sequential; a
    /// concurrent reader may observe a partially deleted record.
    pub fn delete_session(&mut self, id: &SessionId) -> Result<(), StoreError> {
        for field in Field::ALL {
            self.remove(id, field)?;
        }
        let stray: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|key| StorageKey::parse(key).is_some_and(|parsed| &parsed.session_id == id))
            .collect();
        for key in stray {
            self.store.remove_item(&key)?;
        }
        tracing::debug!(session = %id, "deleted session");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Process-wide keys and enumeration
    // -----------------------------------------------------------------------

    pub fn global(&self, key: GlobalKey) -> Option<String> {
        self.store.get_item(key.key())
    }

    pub fn set_global(&mut self, key: GlobalKey, value: &str) -> Result<(), StoreError> {
        self.store.set_item(key.key(), value)
    }

    /// Every session in the store, read from one enumeration, in discovery
    /// order. A value under a non-canonical key (e.g. a repeated id prefix)
    /// is used only when the canonical key is absent.
    pub fn records(&self) -> Vec<SessionRecord> {
        let mut records: IndexMap<SessionId, SessionRecord> = IndexMap::new();
        for (index, (key, value)) in self.store.entries().into_iter().enumerate() {
            let Some(parsed) = StorageKey::parse(&key) else {
                continue;
            };
            let canonical = parsed.encode() == key;
            let record = records
                .entry(parsed.session_id.clone())
                .or_insert_with(|| SessionRecord {
                    session_id: parsed.session_id,
                    first_index: index,
                    values: HashMap::new(),
                });
            if canonical {
                record.values.insert(parsed.field, value);
            } else {
                record.values.entry(parsed.field).or_insert(value);
            }
        }
        records.into_values().collect()
    }

    /// Move values stored under non-canonical keys to their canonical key,
    /// unless that key already exists, and remove the stray keys. Returns
    /// how many stray keys were found.
    pub fn repair_keys(&mut self) -> Result<usize, StoreError> {
        let stray: Vec<(String, String, String)> = self
            .store
            .entries()
            .into_iter()
            .filter_map(|(key, value)| {
                let canonical = StorageKey::parse(&key)?.encode();
                (canonical != key).then_some((key, canonical, value))
            })
            .collect();

        for (key, canonical, value) in &stray {
            if self.store.get_item(canonical).is_none() {
                self.store.set_item(canonical, value)?;
            }
            self.store.remove_item(key)?;
            tracing::warn!(from = %key, to = %canonical, "moved value to canonical storage key");
        }
        Ok(stray.len())
    }

    /// Every key in the store, in enumeration order.
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    pub fn item_count(&self) -> usize {
        self.store.keys().len()
    }

    /// Keys plus values, in UTF-16 units.
    pub fn estimated_size(&self) -> usize {
        self.store
            .entries()
            .iter()
            .map(|(k, v)| utf16_len(k) + utf16_len(v))
            .sum()
    }
}
