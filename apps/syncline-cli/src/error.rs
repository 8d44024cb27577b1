//! CLI error types and exit codes

use syncline_db::DbError;
use syncline_sync::{ConfigError, StoreError, SyncError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General or configuration error
/// - 3: Database unreachable or failing
/// - 4: Validation error
/// - 5: One or more tenant runs failed
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{failed} of {total} tenant run(s) failed")]
    SyncFailed { failed: usize, total: usize },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Io(_) => 1,
            CliError::Database(_) => 3,
            CliError::Validation(_) | CliError::NotFound(_) => 4,
            CliError::SyncFailed { .. } => 5,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Database(_) => {
                Some("Check DATABASE_URL and that PostgreSQL is reachable.")
            }
            CliError::SyncFailed { .. } => {
                Some("Re-run with --json to see the failure reason for each tenant.")
            }
            CliError::NotFound(_) => Some("Run 'syncline connections list' to see linked tenants."),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<DbError> for CliError {
    fn from(e: DbError) -> Self {
        CliError::Database(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Database(e.to_string())
    }
}

impl From<SyncError> for CliError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Configuration { .. } => CliError::Config(e.to_string()),
            SyncError::Persistence(store) => store.into(),
            other => CliError::Validation(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Validation(format!("invalid JSON: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 1);
        assert_eq!(CliError::Database("x".into()).exit_code(), 3);
        assert_eq!(CliError::Validation("x".into()).exit_code(), 4);
        assert_eq!(CliError::NotFound("x".into()).exit_code(), 4);
        assert_eq!(
            CliError::SyncFailed {
                failed: 1,
                total: 3
            }
            .exit_code(),
            5
        );
    }

    #[test]
    fn test_sync_error_conversion() {
        let err: CliError = SyncError::configuration("bad sheet reference").into();
        assert!(matches!(err, CliError::Config(_)));

        let err: CliError = SyncError::Persistence(StoreError::backend("pool closed")).into();
        assert!(matches!(err, CliError::Database(_)));

        let err: CliError = SyncError::validation("webhook", "not an object").into();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_sync_failed_message() {
        let err = CliError::SyncFailed {
            failed: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "2 of 5 tenant run(s) failed");
    }
}
