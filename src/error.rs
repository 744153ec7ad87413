use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from the backing file service.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested path does not exist on the remote side.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// A path fragment could not be matched against the current listing
    /// while resolving a navigation target.
    #[error("{0} not found")]
    SegmentNotFound(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Unrecognized sort method name in config or CLI input.
    #[error("Invalid sort method: {0}")]
    InvalidSortMethod(String),

    /// A cooperative cancellation flag was raised mid-operation.
    ///
    /// Distinct from I/O failures: callers must discard partial state but
    /// must not report this as a remote error.
    #[error("Operation cancelled")]
    Cancelled,

    /// Copy/move/delete failure surfaced by the file service.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Malformed data received from another component (drag payloads,
    /// share links, host messages).
    #[error("Malformed payload: {0}")]
    Payload(String),
}

impl AppError {
    /// Whether this error is a cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}
