use super::field::Field;
use super::session_id::SessionId;

/// A per-session storage key: field prefix followed by the canonical id,
/// e.g. `pageTitle_win_k3j2h1g0fa`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub field: Field,
    pub session_id: SessionId,
}

impl StorageKey {
    pub fn new(field: Field, session_id: &SessionId) -> Self {
        StorageKey {
            field,
            session_id: session_id.clone(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}{}", self.field.key_prefix(), self.session_id)
    }

    /// Recognize a raw store key. Keys without a known field prefix, or
    /// with nothing after it, are not session keys.
    pub fn parse(key: &str) -> Option<StorageKey> {
        Field::ALL.iter().find_map(|&field| {
            let rest = key.strip_prefix(field.key_prefix())?;
            let session_id = SessionId::parse(rest)?;
            Some(StorageKey { field, session_id })
        })
    }
}

/// Process-wide keys, shared by every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKey {
    /// RFC 3339 time of the last export or import.
    LastBackup,
    /// Epoch millis of the last storage-capacity advisory.
    LastStorageWarning,
    /// Epoch millis of the last stale-backup advisory.
    LastBackupWarning,
}

impl GlobalKey {
    pub fn key(self) -> &'static str {
        match self {
            GlobalKey::LastBackup => "lastBackupTimestamp",
            GlobalKey::LastStorageWarning => "lastStorageWarning",
            GlobalKey::LastBackupWarning => "lastBackupWarning",
        }
    }
}
