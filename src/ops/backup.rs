use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::io::gateway::StorageGateway;
use crate::io::store::{KeyValueStore, StoreError};
use crate::model::{Field, GlobalKey, SessionId, StorageKey, TextField};

pub const BACKUP_VERSION: &str = "1.3";

/// Fields every exported tab carries, in order.
pub const SCHEMA_FIELDS: [&str; 6] = [
    "id",
    "title",
    "details",
    "titleTimestamp",
    "detailsTimestamp",
    "dueDate",
];

/// Error type for backup parsing and restore
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("invalid backup file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub export_date: String,
    pub schema: BackupSchema,
    pub storage_info: StorageInfo,
    pub tabs: IndexMap<String, BackupTab>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSchema {
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub total_items: usize,
    pub estimated_size: usize,
    pub backup_date: String,
}

/// One exported session. Every field is present; unset fields are empty
/// strings and stored strings are copied verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupTab {
    pub id: String,
    pub title: String,
    pub details: String,
    pub title_timestamp: String,
    pub details_timestamp: String,
    pub due_date: String,
}

impl BackupDocument {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One tab as read from a backup file. Fields may be missing, and values
/// may be strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTab {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub details_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub due_date: Option<String>,
}

impl ImportTab {
    /// A text field saved as an empty string: no content, but a save time.
    fn saved_empty(&self, field: Field) -> bool {
        let stamp = match field {
            Field::Title => &self.title_timestamp,
            Field::Details => &self.details_timestamp,
            _ => return false,
        };
        stamp.as_deref().is_some_and(|t| !t.is_empty())
    }

    fn fields(&self) -> [(Field, Option<&str>); 5] {
        [
            (Field::Title, self.title.as_deref()),
            (Field::Details, self.details.as_deref()),
            (Field::TitleTimestamp, self.title_timestamp.as_deref()),
            (Field::DetailsTimestamp, self.details_timestamp.as_deref()),
            (Field::DueDate, self.due_date.as_deref()),
        ]
    }
}

/// A parsed backup file in either supported layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupPayload {
    /// `{ "tabs": { id: { ... } } }`
    Tabs(IndexMap<String, ImportTab>),
    /// Raw storage keys at the top level
    Legacy(Vec<(StorageKey, String)>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValueInput {
    Str(String),
    Num(serde_json::Number),
}

impl From<ValueInput> for String {
    fn from(value: ValueInput) -> Self {
        match value {
            ValueInput::Str(s) => s,
            ValueInput::Num(n) => n.to_string(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<ValueInput>::deserialize(deserializer)?;
    Ok(value.map(String::from))
}

#[derive(Deserialize)]
struct RawBackup {
    #[serde(default)]
    tabs: Option<IndexMap<String, ImportTab>>,
    #[serde(flatten)]
    rest: IndexMap<String, serde_json::Value>,
}

/// Parse backup file content.
pub fn parse_backup(text: &str) -> Result<BackupPayload, BackupError> {
    let raw: RawBackup = serde_json::from_str(text)?;
    if let Some(tabs) = raw.tabs {
        return Ok(BackupPayload::Tabs(tabs));
    }

    let mut entries = Vec::new();
    for (key, value) in raw.rest {
        let Some(parsed) = StorageKey::parse(&key) else {
            continue;
        };
        let value = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                tracing::debug!(key, ?other, "skipping non-scalar legacy backup value");
                continue;
            }
        };
        entries.push((parsed, value));
    }
    Ok(BackupPayload::Legacy(entries))
}

/// Snapshot every discovered session and record the backup time.
pub fn export_backup<S: KeyValueStore>(
    gateway: &mut StorageGateway<S>,
) -> Result<BackupDocument, StoreError> {
    let now = gateway.now();
    let stamp = iso_timestamp(now);

    let mut tabs = IndexMap::new();
    for record in gateway.records() {
        let id = &record.session_id;
        let raw = |field: Field| record.raw(field).unwrap_or_default().to_string();
        tabs.insert(
            id.to_string(),
            BackupTab {
                id: id.to_string(),
                title: raw(Field::Title),
                details: raw(Field::Details),
                title_timestamp: raw(Field::TitleTimestamp),
                details_timestamp: raw(Field::DetailsTimestamp),
                due_date: raw(Field::DueDate),
            },
        );
    }

    let document = BackupDocument {
        version: BACKUP_VERSION.to_string(),
        export_date: stamp.clone(),
        schema: BackupSchema {
            fields: SCHEMA_FIELDS.iter().map(|f| f.to_string()).collect(),
        },
        storage_info: StorageInfo {
            total_items: gateway.item_count(),
            estimated_size: gateway.estimated_size(),
            backup_date: stamp.clone(),
        },
        tabs,
    };

    gateway.set_global(GlobalKey::LastBackup, &stamp)?;
    tracing::debug!(tabs = document.tabs.len(), "exported backup");
    Ok(document)
}

/// Restore a parsed backup into storage, returning how many keys were
/// written. Existing keys not mentioned by the backup are left alone.
pub fn import_backup<S: KeyValueStore>(
    gateway: &mut StorageGateway<S>,
    payload: &BackupPayload,
) -> Result<usize, BackupError> {
    let mut written = 0;
    match payload {
        BackupPayload::Tabs(tabs) => {
            for (key, tab) in tabs {
                let Some(id) = SessionId::parse(key).or_else(|| tab.id.as_deref().and_then(SessionId::parse))
                else {
                    tracing::warn!(key, "skipping backup tab without an id");
                    continue;
                };
                let mut any = false;
                for (field, value) in tab.fields() {
                    let Some(value) = value else {
                        continue;
                    };
                    if !value.is_empty() || tab.saved_empty(field) {
                        gateway.put_raw(&id, field, value)?;
                        written += 1;
                        any = true;
                    }
                }
                // Keep sessions whose every field is empty discoverable
                if !any {
                    gateway.put_raw(&id, TextField::Title.field(), "")?;
                    written += 1;
                }
            }
        }
        BackupPayload::Legacy(entries) => {
            for (key, value) in entries {
                gateway.put_raw(&key.session_id, key.field, value)?;
                written += 1;
            }
        }
    }

    gateway.set_global(GlobalKey::LastBackup, &iso_timestamp(gateway.now()))?;
    tracing::debug!(written, "imported backup");
    Ok(written)
}

/// `tasks-backup-YYYY-MM-DD.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("tasks-backup-{}.json", date.format("%Y-%m-%d"))
}

fn iso_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
