use thiserror::Error;

/// Preloader error types
#[derive(Error, Debug)]
pub enum PreloaderError {
    /// Workload inventory call failed (namespaces, pods, cron jobs)
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// A local image runtime command exited unsuccessfully
    #[error("Runtime command failed: {command} (exit {exit_code}): {stderr}")]
    Runtime {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Filesystem sync failed
    #[error("Sync failed: {0}")]
    Sync(String),

    /// Snapshot backend rejected or failed a request
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Operation cancelled by the caller
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Image reference could not be used
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PreloaderError {
    /// Process exit status for this error.
    ///
    /// Runtime failures propagate the exit code of the failed tool; everything
    /// else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            PreloaderError::Runtime { exit_code, .. } if *exit_code > 0 => *exit_code,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for PreloaderError {
    fn from(err: serde_json::Error) -> Self {
        PreloaderError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PreloaderError {
    fn from(err: serde_yaml::Error) -> Self {
        PreloaderError::Serialization(err.to_string())
    }
}

/// Result type alias for preloader operations
pub type Result<T> = std::result::Result<T, PreloaderError>;
