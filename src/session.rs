use std::sync::mpsc;

use url::Url;

use crate::clock::SharedClock;
use crate::io::gateway::StorageGateway;
use crate::io::store::{KeyValueStore, StoreError};
use crate::io::url_state::{NavigationEvent, UrlMirror};
use crate::model::config::Config;
use crate::model::{DueDate, SessionId, TextField};
use crate::ops::advisory::{self, Advisory, StorageUsage};
use crate::ops::backup::{self, BackupDocument, BackupError, BackupPayload};
use crate::ops::limits::LengthReport;
use crate::ops::pipeline::{EditContext, EditPipeline, FormState, PipelineEvent, PipelineOutput};
use crate::ops::reconcile::{InitialState, reconcile_on_load};
use crate::ops::scan::{SessionSummary, SortMode, scan};

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid location: {0}")]
    Location(#[from] url::ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backup(#[from] BackupError),
}

/// One tab: its identity, its form, its location, and the pipeline that
/// keeps storage and the location in step with the form.
///
/// This is the whole surface the presentation layer talks to.
pub struct Session<S> {
    gateway: StorageGateway<S>,
    mirror: UrlMirror,
    session_id: SessionId,
    form: FormState,
    sort: SortMode,
    config: Config,
    pipeline: EditPipeline,
}

impl<S: KeyValueStore> Session<S> {
    /// Load a tab at `location`, reconciling it with `store`.
    pub fn open(
        store: S,
        location: &str,
        clock: SharedClock,
        config: Config,
    ) -> Result<(Self, InitialState), SessionError> {
        let mut mirror = UrlMirror::parse(location)?;
        let mut gateway = StorageGateway::new(store, clock);
        let initial = reconcile_on_load(&mut gateway, &mut mirror)?;

        let now = gateway.now().timestamp_millis();
        let session = Session {
            form: FormState {
                title: initial.title.clone(),
                details: initial.details.clone(),
                due_date: initial.due_date,
            },
            session_id: initial.session_id.clone(),
            pipeline: EditPipeline::new(&config.timeouts, now),
            sort: SortMode::default(),
            gateway,
            mirror,
            config,
        };
        Ok((session, initial))
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn location(&self) -> &Url {
        self.mirror.location()
    }

    pub fn gateway(&self) -> &StorageGateway<S> {
        &self.gateway
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe_navigation(&mut self) -> mpsc::Receiver<NavigationEvent> {
        self.mirror.subscribe()
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort
    }

    /// Change the sort mode used by timer-driven rescans.
    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.sort = mode;
    }

    pub fn scan_directory(&self, mode: SortMode) -> Vec<SessionSummary> {
        scan(&self.gateway, mode)
    }

    /// A keystroke in `field`. Nothing is written until the debounce fires.
    pub fn record_edit(
        &mut self,
        field: TextField,
        value: impl Into<String>,
    ) -> Result<Vec<PipelineOutput>, SessionError> {
        self.dispatch(PipelineEvent::Input {
            field,
            value: value.into(),
        })
    }

    pub fn select_due_date(&mut self, due: DueDate) -> Result<Vec<PipelineOutput>, SessionError> {
        self.dispatch(PipelineEvent::DueDateSelected(due))
    }

    pub fn dispatch(&mut self, event: PipelineEvent) -> Result<Vec<PipelineOutput>, SessionError> {
        let mut ctx = EditContext {
            gateway: &mut self.gateway,
            mirror: &mut self.mirror,
            session_id: &self.session_id,
            form: &mut self.form,
            sort: self.sort,
            limits: &self.config.limits,
        };
        Ok(self.pipeline.handle(&mut ctx, event)?)
    }

    /// When the owner should next dispatch a `Tick`.
    pub fn next_deadline(&self) -> Option<i64> {
        self.pipeline.next_deadline()
    }

    pub fn has_pending_save(&self) -> bool {
        self.pipeline.has_pending_save()
    }

    /// Remove every field of `id`. Deleting this tab's own session leaves
    /// the tab open with its id; the next save recreates the record.
    pub fn delete_session(&mut self, id: &SessionId) -> Result<(), SessionError> {
        self.gateway.delete_session(id)?;
        Ok(())
    }

    pub fn export_backup(&mut self) -> Result<BackupDocument, SessionError> {
        Ok(backup::export_backup(&mut self.gateway)?)
    }

    pub fn import_backup(&mut self, payload: &BackupPayload) -> Result<usize, SessionError> {
        Ok(backup::import_backup(&mut self.gateway, payload)?)
    }

    /// Location that opens `id` with its stored content.
    pub fn share_link(&self, id: &SessionId) -> Url {
        self.mirror.share_link(&self.gateway, id)
    }

    pub fn storage_usage(&self) -> StorageUsage {
        advisory::storage_usage(&self.gateway, &self.config.limits)
    }

    pub fn check_storage(&mut self) -> Result<Option<Advisory>, SessionError> {
        Ok(advisory::check_storage(&mut self.gateway, &self.config.limits)?)
    }

    pub fn check_backup(&mut self) -> Result<Option<Advisory>, SessionError> {
        Ok(advisory::check_backup(&mut self.gateway, &self.config.limits)?)
    }

    pub fn length_report(&self, field: TextField) -> LengthReport {
        LengthReport::measure(field, self.form.text(field), &self.config.limits)
    }

    pub fn into_store(self) -> S {
        self.gateway.into_store()
    }
}
