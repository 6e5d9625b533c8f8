//! Error types for CryptoShow core.

use std::io;
use thiserror::Error;

/// Core error type for backend and configuration operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// HTTP transport errors.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backend answered with a status the client cannot interpret.
    #[error("Unexpected response from {url}: {status}")]
    UnexpectedStatus {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while submitting a job to the backend.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// Network failure before any response arrived.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response status is neither success nor a status that carries a body.
    #[error("Unexpected submission status: {0}")]
    UnexpectedStatus(u16),

    /// The body did not parse as a submission payload.
    #[error("Malformed submission response: {0}")]
    Malformed(String),

    /// The backend refused the job and explained why.
    #[error("{0}")]
    Rejected(String),

    /// Reading the upload from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for submissions.
pub type SubmitResult<T> = std::result::Result<T, SubmitError>;

/// Errors raised by job channels and their transports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel already has a status consumer.
    #[error("Job channel for {0} already has a subscriber")]
    AlreadySubscribed(String),

    /// Another channel for the same job is still open.
    #[error("Job {0} already has an open channel")]
    AlreadyOpen(String),

    /// The channel was closed before a terminal status arrived.
    #[error("Job channel for {0} closed")]
    Closed(String),

    /// Transport-level failure (connect, read, decode frame).
    #[error("Channel transport error: {0}")]
    Transport(String),

    /// The job lacks context the transport needs (e.g. a file hash for polling).
    #[error("Job {0} cannot be observed: {1}")]
    MissingContext(String, String),
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;
