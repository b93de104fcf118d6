//! Error types for emapper

use crate::changeset::ValidationError;
use thiserror::Error;

/// Result type alias for emapper operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for mapping, translation and database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Invalid or missing builder input
    #[error("Argument error: {0}")]
    Argument(String),

    /// Predicate or projection shape the translator cannot lower
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// No dialect selected, or a kind absent from the dialect's template map
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A validator rejected a changed field
    #[error("Validation error on '{}': {}", .0.field, .0.message)]
    Validation(ValidationError),

    /// Connection or command failure
    #[error("Data access error: {message} (sql: {sql})")]
    DataAccess {
        message: String,
        code: Option<String>,
        sql: String,
        params: Vec<String>,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedExpression(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error for a single field
    pub fn validation(err: ValidationError) -> Self {
        Self::Validation(err)
    }

    pub fn is_argument(&self) -> bool {
        matches!(self, Self::Argument(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedExpression(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_data_access(&self) -> bool {
        matches!(self, Self::DataAccess { .. })
    }

    /// The rejected field, if this is a validation error.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// The failed SQL text, if this is a data access error.
    pub fn failed_sql(&self) -> Option<&str> {
        match self {
            Self::DataAccess { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

/// A failure reported by a database driver, before it is tied to a statement.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DriverError {
    /// Vendor error code or SQLSTATE, when the driver exposes one.
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Attach the statement that failed, producing a [`OrmError::DataAccess`].
    pub fn into_data_access(self, sql: &str, params: Vec<String>) -> OrmError {
        OrmError::DataAccess {
            message: self.message,
            code: self.code,
            sql: sql.to_string(),
            params,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _) => {
                DriverError::with_code(code.extended_code.to_string(), err.to_string())
            }
            _ => DriverError::new(err.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DriverError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_err) => DriverError::with_code(db_err.code().code(), db_err.message()),
            None => DriverError::new(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ValidationCode;

    #[test]
    fn data_access_keeps_statement_and_snapshot() {
        let err = DriverError::with_code("42P01", "relation does not exist")
            .into_data_access("SELECT 1 FROM t", vec!["p0=1".to_string()]);
        assert!(err.is_data_access());
        assert_eq!(err.failed_sql(), Some("SELECT 1 FROM t"));
        assert_eq!(
            err.to_string(),
            "Data access error: relation does not exist (sql: SELECT 1 FROM t)"
        );
        match err {
            OrmError::DataAccess { code, params, .. } => {
                assert_eq!(code.as_deref(), Some("42P01"));
                assert_eq!(params, ["p0=1"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = OrmError::validation(ValidationError::new(
            "name",
            ValidationCode::Required,
            "name is required",
        ));
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Validation error on 'name': name is required");
        assert!(err.failed_sql().is_none());
    }
}
