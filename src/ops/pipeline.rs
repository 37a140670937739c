use std::collections::BTreeSet;

use crate::io::gateway::StorageGateway;
use crate::io::store::{KeyValueStore, StoreError};
use crate::io::url_state::UrlMirror;
use crate::model::config::{Limits, Timeouts};
use crate::model::{DueDate, SessionId, TextField};
use crate::ops::advisory::{self, Advisory};
use crate::ops::scan::{SessionSummary, SortMode, scan};
use crate::ops::timer::{Interval, Timer};

/// Something that happened to the tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A keystroke changed a text field to `value`.
    Input { field: TextField, value: String },
    /// A date was picked (or cleared) in the date picker.
    DueDateSelected(DueDate),
    /// Time moved on; fire whatever timers are due.
    Tick,
    /// The tab was hidden or is about to unload.
    Hidden,
    Visible,
    Focus,
    ManualRefresh,
}

/// What handling an event did, for the presentation layer to show.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    /// These fields were written to storage and the URL was rewritten.
    Saved(Vec<TextField>),
    DueDateSaved(DueDate),
    DirectoryRefreshed(Vec<SessionSummary>),
    Advisory(Advisory),
}

/// The in-memory form: what the user currently sees, which may be ahead of
/// storage while a save is pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub title: String,
    pub details: String,
    pub due_date: DueDate,
}

impl FormState {
    pub fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Title => &self.title,
            TextField::Details => &self.details,
        }
    }

    pub fn set_text(&mut self, field: TextField, value: String) {
        match field {
            TextField::Title => self.title = value,
            TextField::Details => self.details = value,
        }
    }
}

/// Everything a pipeline step touches, borrowed from the session.
pub struct EditContext<'a, S> {
    pub gateway: &'a mut StorageGateway<S>,
    pub mirror: &'a mut UrlMirror,
    pub session_id: &'a SessionId,
    pub form: &'a mut FormState,
    pub sort: SortMode,
    pub limits: &'a Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TimerKind {
    Save,
    Refresh,
    Background,
    StorageCheck,
}

/// Debounced persistence and list refresh for one tab.
///
/// Each keystroke re-arms a save timer and a longer refresh timer, so a
/// burst of typing produces one save and one rescan once typing pauses.
/// Two periodic timers rescan in the background and sample storage usage.
#[derive(Debug, Clone)]
pub struct EditPipeline {
    timeouts: Timeouts,
    save: Timer,
    refresh: Timer,
    background: Interval,
    storage_check: Interval,
    dirty: BTreeSet<TextField>,
}

impl EditPipeline {
    pub fn new(timeouts: &Timeouts, now: i64) -> Self {
        EditPipeline {
            timeouts: timeouts.clone(),
            save: Timer::new(),
            refresh: Timer::new(),
            background: Interval::start(now, timeouts.background_refresh_ms),
            storage_check: Interval::start(now, timeouts.storage_check_ms),
            dirty: BTreeSet::new(),
        }
    }

    pub fn has_pending_save(&self) -> bool {
        self.save.is_armed()
    }

    /// Earliest time a `Tick` would do something.
    pub fn next_deadline(&self) -> Option<i64> {
        [
            self.save.deadline(),
            self.refresh.deadline(),
            self.background.deadline(),
            self.storage_check.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn handle<S: KeyValueStore>(
        &mut self,
        ctx: &mut EditContext<'_, S>,
        event: PipelineEvent,
    ) -> Result<Vec<PipelineOutput>, StoreError> {
        let now = ctx.gateway.now().timestamp_millis();
        let mut outputs = Vec::new();

        match event {
            PipelineEvent::Input { field, value } => {
                ctx.form.set_text(field, value);
                self.dirty.insert(field);
                self.save.arm(now, self.timeouts.debounce_ms);
                self.refresh.arm(now, self.timeouts.refresh_ms);
            }
            PipelineEvent::DueDateSelected(due) => {
                ctx.form.due_date = due;
                ctx.gateway.set_due_date(ctx.session_id, due)?;
                ctx.mirror
                    .write(ctx.gateway, ctx.session_id, &ctx.form.title, &ctx.form.details);
                outputs.push(PipelineOutput::DueDateSaved(due));
                outputs.push(refresh_now(ctx));
            }
            PipelineEvent::Tick => {
                for kind in self.take_due(now) {
                    tracing::debug!(?kind, now, "timer fired");
                    match kind {
                        TimerKind::Save => outputs.extend(self.flush(ctx)?),
                        TimerKind::Refresh | TimerKind::Background => {
                            outputs.push(refresh_now(ctx))
                        }
                        TimerKind::StorageCheck => {
                            if let Some(a) = advisory::check_storage(ctx.gateway, ctx.limits)? {
                                outputs.push(PipelineOutput::Advisory(a));
                            }
                        }
                    }
                }
            }
            PipelineEvent::Hidden => {
                if self.save.is_armed() {
                    self.save.cancel();
                    outputs.extend(self.flush(ctx)?);
                }
            }
            PipelineEvent::Visible | PipelineEvent::Focus | PipelineEvent::ManualRefresh => {
                outputs.push(refresh_now(ctx));
            }
        }

        Ok(outputs)
    }

    /// Disarm every due timer and return them in firing order: by deadline,
    /// then save before refresh before the periodic ones.
    fn take_due(&mut self, now: i64) -> Vec<TimerKind> {
        let mut due: Vec<(i64, TimerKind)> = [
            (self.save.deadline(), TimerKind::Save),
            (self.refresh.deadline(), TimerKind::Refresh),
            (self.background.deadline(), TimerKind::Background),
            (self.storage_check.deadline(), TimerKind::StorageCheck),
        ]
        .into_iter()
        .filter_map(|(deadline, kind)| deadline.filter(|&at| at <= now).map(|at| (at, kind)))
        .collect();
        due.sort();

        for (_, kind) in &due {
            match kind {
                TimerKind::Save => self.save.take_if_due(now),
                TimerKind::Refresh => self.refresh.take_if_due(now),
                TimerKind::Background => self.background.take_if_due(now),
                TimerKind::StorageCheck => self.storage_check.take_if_due(now),
            };
        }
        due.into_iter().map(|(_, kind)| kind).collect()
    }

    /// Write every dirty field once, then the URL once.
    fn flush<S: KeyValueStore>(
        &mut self,
        ctx: &mut EditContext<'_, S>,
    ) -> Result<Option<PipelineOutput>, StoreError> {
        if self.dirty.is_empty() {
            return Ok(None);
        }
        let fields: Vec<TextField> = std::mem::take(&mut self.dirty).into_iter().collect();
        for &field in &fields {
            ctx.gateway
                .set_text(ctx.session_id, field, ctx.form.text(field))?;
        }
        ctx.mirror
            .write(ctx.gateway, ctx.session_id, &ctx.form.title, &ctx.form.details);
        tracing::debug!(session = %ctx.session_id, ?fields, "saved edits");
        Ok(Some(PipelineOutput::Saved(fields)))
    }
}

fn refresh_now<S: KeyValueStore>(ctx: &EditContext<'_, S>) -> PipelineOutput {
    PipelineOutput::DirectoryRefreshed(scan(ctx.gateway, ctx.sort))
}
