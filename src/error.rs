//! Error types for snippet storage, backups and snapshots.

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification handed to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; show the message to the user as-is.
    Validation,
    /// The snippet, backup or snapshot does not exist.
    NotFound,
    /// Database or filesystem failure.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Migration to version {version} failed: {message}")]
    Migration { version: u32, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }

    pub fn migration<S: Into<String>>(version: u32, message: S) -> Self {
        Self::Migration {
            version,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::Config(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Migration { .. }
            | Error::Database(_)
            | Error::Io(_)
            | Error::Serde(_)
            | Error::Storage(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_classify_as_storage() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn validation_message_is_shown_verbatim() {
        let err = Error::validation("Snippet name cannot be empty");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Snippet name cannot be empty");
    }

    #[test]
    fn migration_failure_is_storage() {
        let err = Error::migration(1, "table locked");
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.to_string(), "Migration to version 1 failed: table locked");
    }
}
