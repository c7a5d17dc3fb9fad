//! Error types for practice-migrate
//!
//! This module defines the error hierarchy for the migration pipeline:
//! - Extraction errors (legacy database, artifact writing)
//! - Destination database errors (SQLite or Postgres)
//! - Per-record validation errors
//! - Configuration and CLI errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors should be actionable - include the table, column, or record
//!   identifier involved
//! - Preserve error chains for debugging

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the practice-migrate application
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Extraction stage errors
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Load stage errors
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Verify stage errors
    #[error("Verify error: {0}")]
    Verify(#[from] VerifyError),

    /// Destination database errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (artifact files, export directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extraction stage errors
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Legacy SQLite error (connection or query)
    #[error("Legacy database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open the legacy export file
    #[error("Cannot open legacy export '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// Artifact serialization error
    #[error("Artifact serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Artifact file I/O error
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Extracted row count does not match the operator-supplied expectation
    #[error("Row count mismatch for '{table}': expected {expected}, extracted {actual}")]
    CountMismatch {
        table: &'static str,
        expected: u64,
        actual: u64,
    },
}

/// Load stage errors
///
/// Note: a failed batch is NOT an error at this level. Batch failures are
/// collected into the per-table outcome and reported at the end of the run.
/// These errors abort the whole stage.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Destination database error outside any batch (clear, count)
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Artifact file for a table is missing from the export directory
    #[error("Missing artifact '{path}' - run the extract stage first")]
    ArtifactMissing { path: PathBuf },

    /// Artifact deserialization error
    #[error("Artifact parse error in '{path}' line {line}: {source}")]
    ArtifactParse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    /// Artifact file I/O error
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Verify stage errors
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Destination database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Destination database errors (shared by the SQLite and Postgres backends)
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Postgres error
    #[error("Postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    /// Failed to connect to the destination
    #[error("Failed to connect to destination '{target}': {reason}")]
    ConnectFailed { target: String, reason: String },

    /// Schema error (rehearsal backend only)
    #[error("Destination schema error: {0}")]
    Schema(String),
}

/// Per-record validation errors
///
/// A record failing validation marks its containing batch as failed; it never
/// aborts the stage.
#[derive(Error, Debug)]
pub enum RecordError {
    /// A destination NOT NULL column has no usable value
    #[error("record {id}: missing required value for '{column}'")]
    MissingRequired { id: i64, column: &'static str },

    /// A value could not be converted to the destination type
    #[error("record {id}: invalid value for '{column}': {detail}")]
    InvalidValue {
        id: i64,
        column: &'static str,
        detail: String,
    },

    /// The record has no primary key at all
    #[error("record without primary key '{column}'")]
    MissingPrimaryKey { column: &'static str },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid batch size
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Legacy source file missing
    #[error("Legacy export '{path}' does not exist")]
    SourceNotFound { path: PathBuf },

    /// Extract requested without a legacy source configured
    #[error("No legacy export configured: pass --source")]
    MissingSource,

    /// Export directory problem
    #[error("Invalid export directory '{path}': {reason}")]
    InvalidExportDir { path: PathBuf, reason: String },

    /// No destination connection string available
    #[error("No destination database configured: pass --database-url or set DATABASE_URL")]
    MissingDatabaseUrl,

    /// Destination connection string not understood
    #[error("Invalid destination URL '{url}': {reason}")]
    InvalidDatabaseUrl { url: String, reason: String },

    /// Malformed --expect flag
    #[error("Invalid --expect '{value}': expected <legacy-table>=<count>")]
    InvalidExpect { value: String },

    /// --expect names a table the pipeline does not know
    #[error("Unknown table '{table}' in --expect")]
    UnknownTable { table: String },
}

/// Result type alias for MigrateError
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Result type alias for ExtractError
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result type alias for LoadError
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err = ExtractError::CountMismatch {
            table: "Employee",
            expected: 10,
            actual: 9,
        };
        let top: MigrateError = err.into();
        assert!(matches!(top, MigrateError::Extract(_)));
    }

    #[test]
    fn test_record_error_display() {
        let err = RecordError::MissingRequired {
            id: 42,
            column: "duration_minutes",
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("duration_minutes"));
    }
}
