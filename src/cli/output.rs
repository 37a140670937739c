use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::DueDate;
use crate::ops::advisory::{Advisory, StorageUsage};
use crate::ops::due::DueStatus;
use crate::ops::reconcile::{InitialState, LoadCase};
use crate::ops::scan::SessionSummary;
use crate::util::unicode::{first_line, truncate_to_width};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SessionJson {
    pub id: String,
    pub title: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub due_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[derive(Serialize)]
pub struct OpenJson {
    pub id: String,
    pub case: LoadCase,
    pub minted: bool,
    pub adopted: Vec<String>,
    pub title: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub url: String,
}

#[derive(Serialize)]
pub struct StatusJson {
    #[serde(flatten)]
    pub usage: StorageUsage,
    pub backup_stale: bool,
    pub advisories: Vec<Advisory>,
}

#[derive(Serialize)]
pub struct ImportJson {
    pub restored: usize,
}

fn due_string(due: DueDate) -> Option<String> {
    due.is_set().then(|| due.to_string())
}

pub fn session_to_json(summary: &SessionSummary, today: NaiveDate) -> SessionJson {
    SessionJson {
        id: summary.session_id.to_string(),
        title: summary.title.clone(),
        details: summary.details.clone(),
        due_date: due_string(summary.due_date),
        due_status: DueStatus::for_date(summary.due_date, today).to_string(),
        last_updated: summary.last_updated.map(|t| t.to_rfc3339()),
    }
}

pub fn open_to_json(state: &InitialState, url: &str) -> OpenJson {
    OpenJson {
        id: state.session_id.to_string(),
        case: state.case,
        minted: state.minted,
        adopted: state.adopted.iter().map(|f| f.to_string()).collect(),
        title: state.title.clone(),
        details: state.details.clone(),
        due_date: due_string(state.due_date),
        url: url.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

const TITLE_WIDTH: usize = 40;

/// One row of the task list.
pub fn format_session_line(summary: &SessionSummary, today: NaiveDate, now: DateTime<Utc>) -> String {
    let title = if summary.title.is_empty() {
        "(untitled)".to_string()
    } else {
        truncate_to_width(first_line(&summary.title), TITLE_WIDTH)
    };
    let mut line = format!(
        "{}  {}  [{}]",
        summary.session_id,
        title,
        DueStatus::for_date(summary.due_date, today)
    );
    if let Some(updated) = &summary.last_updated {
        line.push_str("  ");
        line.push_str(&relative_time(updated, now));
    }
    line
}

/// Human-readable age of `dt` relative to `now`.
pub fn relative_time(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(*dt);

    let secs = duration.num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let mins = duration.num_minutes();
    if mins < 60 {
        return format!("{} min ago", mins);
    }
    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{} hr ago", hours);
    }
    let days = duration.num_days();
    if days == 1 {
        return "yesterday".to_string();
    }
    if days < 7 {
        return format!("{} days ago", days);
    }
    let weeks = days / 7;
    if weeks < 5 {
        return format!("{} weeks ago", weeks);
    }
    dt.format("%Y-%m-%d").to_string()
}

pub fn format_usage(usage: &StorageUsage) -> Vec<String> {
    let mut lines = vec![
        format!(
            "storage: {:.1}% of {:.1} MB ({} items, {} tasks)",
            usage.percent,
            usage.capacity as f64 / (1024.0 * 1024.0),
            usage.items,
            usage.sessions
        ),
    ];
    match &usage.last_backup {
        Some(t) => lines.push(format!("last backup: {}", t.format("%Y-%m-%d %H:%M UTC"))),
        None => lines.push("last backup: never".to_string()),
    }
    lines
}
