//! Dispatch of UI actions onto the controller.

use std::path::PathBuf;

use shared::domain::Entity;
use tracing::debug;

use crate::controller::{
    edit_session::EditSession, import::ImportReport, EntityManagementController,
};
use crate::error::ControllerError;

#[derive(Debug, Clone)]
pub enum ControllerCommand {
    Refresh,
    StartCreate,
    StartUpdate(Entity),
    CloseModal,
    Submit(Entity),
    Import(Vec<u8>),
    Export(PathBuf),
}

#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Refreshed(usize),
    SessionChanged(EditSession),
    Saved(Entity),
    Imported(ImportReport),
    Exported(usize),
}

impl ControllerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerCommand::Refresh => "refresh",
            ControllerCommand::StartCreate => "start_create",
            ControllerCommand::StartUpdate(_) => "start_update",
            ControllerCommand::CloseModal => "close_modal",
            ControllerCommand::Submit(_) => "submit",
            ControllerCommand::Import(_) => "import",
            ControllerCommand::Export(_) => "export",
        }
    }
}

pub async fn dispatch(
    controller: &EntityManagementController,
    command: ControllerCommand,
) -> Result<CommandOutcome, ControllerError> {
    debug!(command = command.name(), "dispatching controller command");

    match command {
        ControllerCommand::Refresh => controller.mount().await.map(CommandOutcome::Refreshed),
        ControllerCommand::StartCreate => {
            controller.handle_start_create();
            Ok(CommandOutcome::SessionChanged(controller.session()))
        }
        ControllerCommand::StartUpdate(entity) => {
            controller.handle_start_update(entity);
            Ok(CommandOutcome::SessionChanged(controller.session()))
        }
        ControllerCommand::CloseModal => {
            controller.close_modal();
            Ok(CommandOutcome::SessionChanged(controller.session()))
        }
        ControllerCommand::Submit(entity) => controller
            .submit_form(entity)
            .await
            .map(CommandOutcome::Saved),
        ControllerCommand::Import(bytes) => controller
            .handle_import(&bytes)
            .await
            .map(CommandOutcome::Imported),
        ControllerCommand::Export(path) => controller
            .handle_export(&path)
            .map(CommandOutcome::Exported),
    }
}
