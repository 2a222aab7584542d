//! Controller notifications and classification of failures for display.

use std::path::PathBuf;

use client_core::{FormatError, ServiceError};
use shared::{domain::Entity, error::ErrorCode};

use crate::controller::{edit_session::EditSession, import::ImportTally};
use crate::error::ControllerError;

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    SessionChanged(EditSession),
    EntitySaved(Entity),
    EntityUpdated(Entity),
    ImportCompleted(ImportTally),
    Exported { path: PathBuf, records: usize },
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Transport,
    Validation,
    Format,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    Fetch,
    Save,
    Update,
    Import,
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
    retryable: bool,
}

impl UiError {
    pub fn from_controller_error(context: UiErrorContext, err: &ControllerError) -> Self {
        let (category, retryable) = match err {
            ControllerError::Service(service_err) => classify_service_error(service_err),
            ControllerError::Format(FormatError::Io { .. }) => (UiErrorCategory::Unknown, true),
            ControllerError::Format(_) => (UiErrorCategory::Format, false),
            ControllerError::NoOpenSession | ControllerError::MissingId => {
                (UiErrorCategory::Validation, false)
            }
            ControllerError::Busy => (UiErrorCategory::Transport, true),
        };

        Self {
            category,
            context,
            message: err.to_string(),
            retryable,
        }
    }

    /// Whether the form should offer to repeat the same request.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn classify_service_error(err: &ServiceError) -> (UiErrorCategory, bool) {
    match err {
        ServiceError::Transport(_) | ServiceError::Unavailable(_) => {
            (UiErrorCategory::Transport, true)
        }
        ServiceError::Status { code, .. } => match code {
            ErrorCode::Validation | ErrorCode::Conflict | ErrorCode::NotFound => {
                (UiErrorCategory::Validation, err.is_transient())
            }
            ErrorCode::Unavailable => (UiErrorCategory::Transport, true),
            ErrorCode::Internal => (UiErrorCategory::Unknown, err.is_transient()),
        },
        ServiceError::InvalidUrl { .. } => (UiErrorCategory::Validation, false),
    }
}
