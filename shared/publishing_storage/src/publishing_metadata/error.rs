//! Error types for publishing metadata storage operations

use thiserror::Error;

/// Result type for publishing metadata storage operations
pub type PublishingMetadataResult<T> = Result<T, PublishingMetadataError>;

/// Errors that can occur during publishing metadata storage operations
#[derive(Error, Debug)]
pub enum PublishingMetadataError {
    /// A unique column (business account, container or published media id) already holds this value
    #[error("DB error_code: {code} DB error_msg: {message}")]
    NotUnique {
        /// Driver specific error code
        code: String,
        /// Driver error message
        message: String,
    },

    /// Requested page or page size is out of range
    #[error("Invalid pagination: page {page}, size {size}")]
    InvalidPagination {
        /// Requested 1-based page
        page: u32,
        /// Requested page size
        size: u32,
    },

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PublishingMetadataError {
    /// Maps an insert failure, splitting unique violations from the rest
    pub(crate) fn from_insert(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Self::NotUnique {
                code: db_err.code().map(|code| code.into_owned()).unwrap_or_default(),
                message: db_err.message().to_string(),
            },
            other => Self::Database(other),
        }
    }
}
