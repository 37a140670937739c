use std::fmt;

use chrono::NaiveDate;

use crate::model::DueDate;

/// How a due date relates to today, as shown next to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    /// No due date
    AlwaysRelevant,
    Today,
    InDays(i64),
    DaysAgo(i64),
}

impl DueStatus {
    pub fn for_date(due: DueDate, today: NaiveDate) -> Self {
        let Some(date) = due.as_date() else {
            return DueStatus::AlwaysRelevant;
        };
        let days = (date - today).num_days();
        match days {
            0 => DueStatus::Today,
            d if d > 0 => DueStatus::InDays(d),
            d => DueStatus::DaysAgo(-d),
        }
    }

    pub fn is_overdue(self) -> bool {
        matches!(self, DueStatus::DaysAgo(_))
    }
}

impl fmt::Display for DueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueStatus::AlwaysRelevant => f.write_str("Always relevant"),
            DueStatus::Today => f.write_str("Today"),
            DueStatus::InDays(1) => f.write_str("1 day"),
            DueStatus::InDays(n) => write!(f, "{n} days"),
            DueStatus::DaysAgo(1) => f.write_str("1 day ago"),
            DueStatus::DaysAgo(n) => write!(f, "{n} days ago"),
        }
    }
}
