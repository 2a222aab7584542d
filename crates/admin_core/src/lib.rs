//! Admin page core: edit-session state, entity list cache, and the
//! controller orchestrating create, update and CSV import/export.

pub mod controller;
pub mod error;

pub use controller::{
    edit_session::{EditMode, EditSession, SessionAction},
    events::{ControllerEvent, UiError, UiErrorCategory, UiErrorContext},
    fetch_cache::{FetchCache, FetchState, LoadingGuard},
    import::{ImportOutcome, ImportReport, ImportTally, RecordOutcome},
    orchestration::{dispatch, CommandOutcome, ControllerCommand},
    EntityManagementController,
};
pub use error::ControllerError;

#[cfg(test)]
pub(crate) mod test_support;
