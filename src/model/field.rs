use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Stored value meaning "no due date". Distinct from the key being absent.
pub const NO_DATE_SENTINEL: &str = "0";

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"));

/// The two free-text fields a user types into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    Title,
    Details,
}

impl TextField {
    pub fn field(self) -> Field {
        match self {
            TextField::Title => Field::Title,
            TextField::Details => Field::Details,
        }
    }

    /// The companion key written alongside every save of this field.
    pub fn timestamp_field(self) -> Field {
        match self {
            TextField::Title => Field::TitleTimestamp,
            TextField::Details => Field::DetailsTimestamp,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextField::Title => "title",
            TextField::Details => "details",
        }
    }

    /// Remaining characters below which the field counts as near its limit.
    pub fn warn_margin(self) -> usize {
        match self {
            TextField::Title => 10,
            TextField::Details => 20,
        }
    }
}

/// Every per-session key the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Details,
    DueDate,
    TitleTimestamp,
    DetailsTimestamp,
    /// Recognized for discovery and deletion; nothing writes it anymore.
    DueDateTimestamp,
}

/// How a field's stored string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    DateOrSentinel,
    Timestamp,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Title,
        Field::Details,
        Field::DueDate,
        Field::TitleTimestamp,
        Field::DetailsTimestamp,
        Field::DueDateTimestamp,
    ];

    /// Storage key prefix; the canonical session id follows it directly.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Field::Title => "pageTitle_",
            Field::Details => "details_",
            Field::DueDate => "dueDate_",
            Field::TitleTimestamp => "timestamp_pageTitle_",
            Field::DetailsTimestamp => "timestamp_details_",
            Field::DueDateTimestamp => "timestamp_dueDate_",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Title | Field::Details => FieldKind::Text,
            Field::DueDate => FieldKind::DateOrSentinel,
            Field::TitleTimestamp | Field::DetailsTimestamp | Field::DueDateTimestamp => {
                FieldKind::Timestamp
            }
        }
    }

    /// Parse a stored string. Timestamps that are not integer epoch millis
    /// read as absent; every other kind always yields a value.
    pub fn parse_value(self, raw: &str) -> Option<FieldValue> {
        match self.kind() {
            FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
            FieldKind::DateOrSentinel => Some(FieldValue::Due(DueDate::parse(raw))),
            FieldKind::Timestamp => parse_timestamp(raw).map(FieldValue::Timestamp),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Details => "details",
            Field::DueDate => "dueDate",
            Field::TitleTimestamp => "titleTimestamp",
            Field::DetailsTimestamp => "detailsTimestamp",
            Field::DueDateTimestamp => "dueDateTimestamp",
        };
        f.write_str(name)
    }
}

/// A due date, or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DueDate {
    Date(NaiveDate),
    #[default]
    NoDate,
}

impl DueDate {
    /// Lenient parse for stored and user-supplied values: anything that is
    /// not a real `YYYY-MM-DD` date (including the sentinel) is `NoDate`.
    pub fn parse(raw: &str) -> DueDate {
        DueDate::parse_strict(raw).map_or(DueDate::NoDate, DueDate::Date)
    }

    /// `Some` only for a well-formed, existing calendar date.
    pub fn parse_strict(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if !ISO_DATE.is_match(raw) {
            return None;
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }

    /// The string written to storage.
    pub fn to_storage(self) -> String {
        match self {
            DueDate::Date(d) => d.format("%Y-%m-%d").to_string(),
            DueDate::NoDate => NO_DATE_SENTINEL.to_string(),
        }
    }

    pub fn as_date(self) -> Option<NaiveDate> {
        match self {
            DueDate::Date(d) => Some(d),
            DueDate::NoDate => None,
        }
    }

    pub fn is_set(self) -> bool {
        matches!(self, DueDate::Date(_))
    }
}

impl fmt::Display for DueDate {
    /// `YYYY-MM-DD`, or nothing for `NoDate`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueDate::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DueDate::NoDate => Ok(()),
        }
    }
}

/// A typed field value. The gateway converts to and from the stored strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Due(DueDate),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Due(_) => FieldKind::DateOrSentinel,
            FieldValue::Timestamp(_) => FieldKind::Timestamp,
        }
    }

    pub fn serialize(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Due(d) => d.to_storage(),
            FieldValue::Timestamp(t) => t.timestamp_millis().to_string(),
        }
    }
}

/// Epoch milliseconds as written by every save.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_date_strict_parse() {
        assert_eq!(
            DueDate::parse("2025-03-09"),
            DueDate::Date(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap())
        );
        assert_eq!(DueDate::parse("2025-3-9"), DueDate::NoDate);
        assert_eq!(DueDate::parse("2025-02-30"), DueDate::NoDate);
        assert_eq!(DueDate::parse("tomorrow"), DueDate::NoDate);
        assert_eq!(DueDate::parse(""), DueDate::NoDate);
    }

    #[test]
    fn sentinel_reads_as_no_date() {
        assert_eq!(DueDate::parse(NO_DATE_SENTINEL), DueDate::NoDate);
        assert_eq!(DueDate::NoDate.to_storage(), NO_DATE_SENTINEL);
        assert_eq!(DueDate::NoDate.to_string(), "");
    }

    #[test]
    fn timestamps_parse_as_epoch_millis() {
        let parsed = parse_timestamp("1700000000123").unwrap();
        assert_eq!(parsed.timestamp_millis(), 1_700_000_000_123);
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert_eq!(Field::TitleTimestamp.parse_value("nope"), None);
    }

    #[test]
    fn field_values_round_trip_through_strings() {
        let ts = parse_timestamp("1700000000000").unwrap();
        let value = FieldValue::Timestamp(ts);
        assert_eq!(
            Field::DetailsTimestamp.parse_value(&value.serialize()),
            Some(value)
        );
        assert_eq!(
            Field::Title.parse_value(""),
            Some(FieldValue::Text(String::new()))
        );
    }

    #[test]
    fn key_prefixes_are_distinct() {
        for a in Field::ALL {
            for b in Field::ALL {
                if a != b {
                    assert!(!a.key_prefix().starts_with(b.key_prefix()));
                }
            }
        }
    }
}
