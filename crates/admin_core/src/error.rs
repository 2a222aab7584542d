use client_core::{FormatError, ServiceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("no create or edit form is open")]
    NoOpenSession,
    #[error("the entity being edited has no id")]
    MissingId,
    #[error("entity list is still loading; retry once it settles")]
    Busy,
}
