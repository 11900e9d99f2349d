//! Error types for the staging engine.

use sheetstage_model::AddressParseError;
use thiserror::Error;

/// Errors surfaced by staging, rollback, and rendering.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Address(#[from] AddressParseError),

    #[error("document access failed while {action}: {message}")]
    Document {
        action: &'static str,
        message: String,
    },

    #[error("cannot lay out projection: formatting profile address '{addr}' is unusable")]
    RenderLayout { addr: String },
}

impl StageError {
    pub(crate) fn document(action: &'static str, err: impl std::fmt::Display) -> StageError {
        StageError::Document {
            action,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StageError>;
