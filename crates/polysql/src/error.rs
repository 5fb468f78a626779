//! Error types for polysql

use thiserror::Error;

/// Result type alias for polysql operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for SQL building and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// The connected database type/version has no dialect
    #[error("Unsupported database: {0}")]
    UnsupportedDatabase(String),

    /// Invalid configuration (detected at construction time)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A field that the table mapping does not know about
    #[error("Unsupported field '{field}' for table {table}")]
    UnsupportedField { table: String, field: String },

    /// The capability does not exist for this entity
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The operation needs a primary key that is not available
    #[error("Primary key required: {0}")]
    PrimaryKeyRequired(String),

    /// UPDATE/DELETE touched no rows and the caller asked for an error
    #[error("No rows affected by {operation} on {table}")]
    ZeroRowsAffected { table: String, operation: String },

    /// No batch strategy claimed support (registry misconfiguration)
    #[error("No {kind} batch strategy supports {db}")]
    NoBatchStrategy { kind: &'static str, db: String },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query execution error
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create an unsupported field error
    pub fn unsupported_field(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnsupportedField {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Create a zero-rows-affected error
    pub fn zero_rows(table: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::ZeroRowsAffected {
            table: table.into(),
            operation: operation.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Check if this is an unsupported field error
    pub fn is_unsupported_field(&self) -> bool {
        matches!(self, Self::UnsupportedField { .. })
    }

    /// Check if this is a zero-rows-affected error
    pub fn is_zero_rows(&self) -> bool {
        matches!(self, Self::ZeroRowsAffected { .. })
    }

    /// Configuration errors are fatal and never worth retrying.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::UnsupportedDatabase(_) | Self::InvalidConfig(_))
    }
}

impl From<toml::de::Error> for OrmError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
