//! Controller layer: edit-session reducer, entity list cache, and the
//! orchestration of create, update and CSV import/export.

pub mod edit_session;
pub mod events;
pub mod fetch_cache;
pub mod import;
pub mod orchestration;

use std::{path::Path, sync::Arc};

use client_core::{CsvCodec, EntityService};
use shared::domain::{Entity, EntityId};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::error::ControllerError;
use edit_session::{EditSession, SessionAction, SessionStore};
use events::{ControllerEvent, UiError, UiErrorContext};
use fetch_cache::FetchCache;
use import::ImportReport;

const EVENT_CAPACITY: usize = 64;

pub struct EntityManagementController {
    service: Arc<dyn EntityService>,
    codec: Arc<dyn CsvCodec>,
    cache: FetchCache,
    session: SessionStore,
    events: broadcast::Sender<ControllerEvent>,
}

impl EntityManagementController {
    pub fn new(service: Arc<dyn EntityService>, codec: Arc<dyn CsvCodec>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            cache: FetchCache::new(service.clone()),
            service,
            codec,
            session: SessionStore::new(),
            events,
        }
    }

    /// Initial load performed when the page is shown.
    pub async fn mount(&self) -> Result<usize, ControllerError> {
        self.cache
            .refetch()
            .await
            .map_err(|err| self.fail(UiErrorContext::Fetch, err.into()))
    }

    pub fn fetch_cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn session(&self) -> EditSession {
        self.session.current()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<EditSession> {
        self.session.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn handle_start_create(&self) {
        self.transition(SessionAction::StartCreate);
    }

    pub fn handle_start_update(&self, entity: Entity) {
        self.transition(SessionAction::StartUpdate(entity));
    }

    pub fn close_modal(&self) {
        self.transition(SessionAction::Close);
    }

    /// Creates `entity`; on success reloads the list and closes the form.
    ///
    /// A failed create leaves the form open and the list untouched.
    pub async fn on_save_entity(&self, entity: Entity) -> Result<Entity, ControllerError> {
        let created = self
            .service
            .create(entity)
            .await
            .map_err(|err| self.fail(UiErrorContext::Save, err.into()))?;
        info!(entity = %created.display_label(), "entity created");

        self.refresh_after_write().await;
        self.close_modal();
        self.emit(ControllerEvent::EntitySaved(created.clone()));
        Ok(created)
    }

    pub async fn on_update_entity(
        &self,
        id: &EntityId,
        entity: Entity,
    ) -> Result<Entity, ControllerError> {
        let updated = self
            .service
            .update(id, entity)
            .await
            .map_err(|err| self.fail(UiErrorContext::Update, err.into()))?;
        info!(%id, entity = %updated.display_label(), "entity updated");

        self.refresh_after_write().await;
        self.close_modal();
        self.emit(ControllerEvent::EntityUpdated(updated.clone()));
        Ok(updated)
    }

    /// Submits the open form: a create while creating, an update of the target while editing.
    pub async fn submit_form(&self, entity: Entity) -> Result<Entity, ControllerError> {
        match self.session() {
            EditSession::Idle => Err(self.fail(
                UiErrorContext::Save,
                ControllerError::NoOpenSession,
            )),
            EditSession::Creating => self.on_save_entity(entity).await,
            EditSession::Editing(target) => {
                let Some(id) = target.id else {
                    return Err(self.fail(UiErrorContext::Update, ControllerError::MissingId));
                };
                self.on_update_entity(&id, entity).await
            }
        }
    }

    /// Creates every record decoded from `csv_bytes` and reloads the list once.
    ///
    /// A decode failure aborts before any request is made or the loading flag
    /// is raised. Individual create failures are recorded in the report.
    pub async fn handle_import(&self, csv_bytes: &[u8]) -> Result<ImportReport, ControllerError> {
        let records = self
            .codec
            .decode(csv_bytes)
            .map_err(|err| self.fail(UiErrorContext::Import, err.into()))?;
        info!(records = records.len(), "importing decoded records");

        let _loading = self.cache.hold_loading();
        let outcomes = import::create_all(self.service.as_ref(), records).await;
        let refetch_error = self
            .refresh_after_write()
            .await
            .map(|err| err.message().to_string());

        let report = ImportReport {
            outcomes,
            refetch_error,
        };
        let tally = report.tally();
        if tally.failed > 0 {
            warn!(
                succeeded = tally.succeeded,
                failed = tally.failed,
                "import finished with failed records"
            );
        } else {
            info!(succeeded = tally.succeeded, "import finished");
        }
        self.emit(ControllerEvent::ImportCompleted(tally));
        Ok(report)
    }

    /// Writes the current list to `path`; refused while the list is loading.
    pub fn handle_export(&self, path: &Path) -> Result<usize, ControllerError> {
        let state = self.cache.snapshot();
        if state.is_loading {
            return Err(self.fail(UiErrorContext::Export, ControllerError::Busy));
        }

        self.codec
            .encode(&state.items, path)
            .map_err(|err| self.fail(UiErrorContext::Export, err.into()))?;
        self.emit(ControllerEvent::Exported {
            path: path.to_path_buf(),
            records: state.items.len(),
        });
        Ok(state.items.len())
    }

    /// Reloads the list after a write. A failed reload is reported, not propagated.
    async fn refresh_after_write(&self) -> Option<UiError> {
        match self.cache.refetch().await {
            Ok(_) => None,
            Err(err) => {
                let ui_error =
                    UiError::from_controller_error(UiErrorContext::Fetch, &err.into());
                self.emit(ControllerEvent::Error(ui_error.clone()));
                Some(ui_error)
            }
        }
    }

    fn transition(&self, action: SessionAction) {
        let session = self.session.dispatch(action);
        self.emit(ControllerEvent::SessionChanged(session));
    }

    fn fail(&self, context: UiErrorContext, err: ControllerError) -> ControllerError {
        error!(?context, error = %err, "controller operation failed");
        self.emit(ControllerEvent::Error(UiError::from_controller_error(
            context, &err,
        )));
        err
    }

    fn emit(&self, event: ControllerEvent) {
        // Fails only when nobody is subscribed.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
