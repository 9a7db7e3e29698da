use crate::resolver::EntityKind;
use crate::store::{StoreError, Table};
use thiserror::Error;

/// Errors surfaced by clinic operations.
///
/// Validation errors are raised before any store call. Store errors abort the
/// operation at the step that failed.
#[derive(Debug, Error)]
pub enum ClinicError {
    /// A form field the operation cannot proceed without
    #[error("Please enter {0}")]
    MissingField(&'static str),

    /// A field that was present but blank where a value is mandatory
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Invalid age: {0:?}")]
    InvalidAge(String),

    #[error("Invalid visit date: {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// Edit path: the typed name matched nothing and there is no previous id
    #[error("{} \"{name}\" not found. Please select an existing {}.", .kind.label(), .kind.noun())]
    Unresolved { kind: EntityKind, name: String },

    /// The user declined creation or cancelled a prompt for a missing field
    #[error("Creating {} \"{name}\" was cancelled", .kind.noun())]
    Cancelled { kind: EntityKind, name: String },

    #[error("Visit {0} not found")]
    VisitNotFound(i64),

    #[error("Malformed {table} row: {source}")]
    Decode {
        table: Table,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClinicError {
    /// True for errors the user caused by what they typed or answered.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, ClinicError::Store(_) | ClinicError::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClinicError>;
