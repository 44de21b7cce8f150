use thiserror::Error;

use crate::model::field::FieldDataType;

/// Errors raised by the resolution and triage engine.
///
/// Fetch-time variants (`PaginationFailure`) abort a command. The rest are
/// scoped to a single field or item and are reported as warnings.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("field '{field}' not found on board")]
    SchemaNotFound { field: String },

    #[error("'{value}' is not a valid option for field '{field}'")]
    OptionNotFound { field: String, value: String },

    #[error("field '{field}' has type {data_type}, which cannot be updated")]
    UnsupportedFieldType {
        field: String,
        data_type: FieldDataType,
    },

    #[error("'{value}' is not a number (field '{field}')")]
    InvalidNumber { field: String, value: String },

    #[error("failed to list board items: {0}")]
    PaginationFailure(String),

    #[error("{action} failed: {message}")]
    MutationFailure { action: String, message: String },

    #[error("input closed while prompting for '{field}'")]
    PromptAborted { field: String },
}

impl BoardError {
    pub fn mutation(action: impl Into<String>, err: &anyhow::Error) -> Self {
        BoardError::MutationFailure {
            action: action.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn pagination(err: &anyhow::Error) -> Self {
        BoardError::PaginationFailure(format!("{err:#}"))
    }
}
