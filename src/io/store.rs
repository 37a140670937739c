use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::io::lock::LockError;

/// Error type for key/value store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize storage: {0}")]
    SerializeError(#[from] serde_json::Error),
    #[error("storage quota exceeded writing {key}: {needed} units needed, capacity {capacity}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        capacity: usize,
    },
    #[error("{field} cannot hold a {kind:?} value")]
    KindMismatch {
        field: crate::model::Field,
        kind: crate::model::FieldKind,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// A flat string-to-string store shared by every tab, enumerable in a
/// stable order. Each call is one independently visible access; there are
/// no transactions.
pub trait KeyValueStore {
    /// All keys in enumeration order.
    fn keys(&self) -> Vec<String>;

    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError>;

    /// All entries in enumeration order.
    fn entries(&self) -> Vec<(String, String)> {
        self.keys()
            .into_iter()
            .filter_map(|k| self.get_item(&k).map(|v| (k, v)))
            .collect()
    }
}

/// Size of a string the way browser storage quotas count it.
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// In-memory store. Updating an existing key keeps its enumeration position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    items: IndexMap<String, String>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// A store that rejects writes once keys plus values exceed `capacity`
    /// UTF-16 units.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        MemoryStore {
            items: IndexMap::new(),
            capacity: Some(capacity),
        }
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MemoryStore {
            items: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            capacity: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn used(&self) -> usize {
        self.items
            .iter()
            .map(|(k, v)| utf16_len(k) + utf16_len(v))
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(capacity) = self.capacity {
            let previous = self
                .items
                .get(key)
                .map_or(0, |old| utf16_len(key) + utf16_len(old));
            let needed = self.used() - previous + utf16_len(key) + utf16_len(value);
            if needed > capacity {
                tracing::warn!(key, needed, capacity, "storage quota exceeded");
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    capacity,
                });
            }
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        self.items.shift_remove(key);
        Ok(())
    }
}

/// One store seen by several tabs living in the same process.
impl<T: KeyValueStore> KeyValueStore for Rc<RefCell<T>> {
    fn keys(&self) -> Vec<String> {
        self.borrow().keys()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.borrow().get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.borrow_mut().set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        self.borrow_mut().remove_item(key)
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.borrow().entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_keeps_insertion_order() {
        let mut store = MemoryStore::new();
        store.set_item("b", "1").unwrap();
        store.set_item("a", "2").unwrap();
        store.set_item("c", "3").unwrap();
        store.set_item("b", "updated").unwrap();
        assert_eq!(store.keys(), vec!["b", "a", "c"]);
        assert_eq!(store.get_item("b").as_deref(), Some("updated"));

        store.remove_item("a").unwrap();
        assert_eq!(store.keys(), vec!["b", "c"]);
    }

    #[test]
    fn missing_key_reads_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("nope"), None);
    }

    #[test]
    fn capacity_limit_rejects_overflow() {
        let mut store = MemoryStore::with_capacity_limit(10);
        store.set_item("ab", "cdef").unwrap();
        // Replacing a value only counts the difference
        store.set_item("ab", "cdefgh").unwrap();
        let err = store.set_item("xyz", "12").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { needed: 13, .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn utf16_length_counts_surrogate_pairs() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("ü"), 1);
        assert_eq!(utf16_len("😀"), 2);
    }

    #[test]
    fn shared_store_is_visible_to_every_handle() {
        let shared = Rc::new(RefCell::new(MemoryStore::new()));
        let mut tab_a = Rc::clone(&shared);
        let tab_b = Rc::clone(&shared);
        tab_a.set_item("k", "v").unwrap();
        assert_eq!(tab_b.get_item("k").as_deref(), Some("v"));
        assert_eq!(tab_b.entries(), vec![("k".to_string(), "v".to_string())]);
    }
}
