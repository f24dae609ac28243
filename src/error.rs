use thiserror::Error;

use crate::api::ApiError;

pub const FORMAT_ERROR: &str =
    "Data is not formatted correctly. Please check your import file and try again.";
pub const NOTHING_TO_IMPORT: &str = "There was nothing to import.";
pub const UNASSIGNED_ITEMS: &str =
    "One or more items are not assigned to a collection. Assign every item to a collection or choose an import target.";

/// Why an import did not go through.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The file could not be read as the chosen format. `missing_password`
    /// is set when a password-protected file was given without its password.
    #[error("{message}")]
    Parse {
        message: String,
        missing_password: bool,
    },
    #[error("{}", NOTHING_TO_IMPORT)]
    NothingToImport,
    #[error("{}", UNASSIGNED_ITEMS)]
    UnassignedItems,
    #[error("invalid import target: {0}")]
    InvalidTarget(String),
    /// Per-record server rejections, one paragraph per record.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Server(String),
    #[error(transparent)]
    Transport(ApiError),
}

impl ImportError {
    pub fn format_error() -> Self {
        ImportError::Parse {
            message: FORMAT_ERROR.to_string(),
            missing_password: false,
        }
    }

    pub fn is_missing_password(&self) -> bool {
        matches!(
            self,
            ImportError::Parse {
                missing_password: true,
                ..
            }
        )
    }
}
