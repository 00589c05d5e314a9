//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No identity matched any recipient of an inbound message.
    #[error("No identity found for recipients: {}", recipients.join(", "))]
    IdentityNotFound {
        /// Recipients that were tried, in order.
        recipients: Vec<String>,
    },

    /// Inbound notification is structurally unusable.
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    /// Domain not found.
    #[error("Domain not found: {0}")]
    DomainNotFound(i64),

    /// Email record not found.
    #[error("Email not found: {0}")]
    EmailNotFound(i64),

    /// Stored object not found.
    #[error("Object not found: {container}/{key}")]
    ObjectNotFound {
        /// Container (bucket or directory) name.
        container: String,
        /// Object key within the container.
        key: String,
    },

    /// Object key or container would escape the store root.
    #[error("Invalid object path: {0}")]
    InvalidObjectPath(String),

    /// The background task queue no longer accepts work.
    #[error("Task queue closed")]
    QueueClosed,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
