use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("an aggregation job is already running (pid {0})")]
    JobConflict(u32),

    #[error("failed to launch aggregation job: {0}")]
    JobProcess(String),
}

impl CatalogError {
    /// Whether this error matches the connection-failure signature that the
    /// repository retry policy recovers from by forcing a reconnect.
    ///
    /// Everything else propagates to the caller immediately.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Store(err) => {
                if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
                    return true;
                }
                let msg = err.to_string().to_lowercase();
                msg.contains("connection")
                    || msg.contains("broken pipe")
                    || msg.contains("os error 104")
                    || msg.contains("os error 32")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
