use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchwireError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to connect to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server registry is empty")]
    EmptyRegistry,

    #[error("No connection could be made because all servers have failed")]
    NoAvailableServers,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchwireError {
    /// Whether another server may succeed where this one failed.
    ///
    /// Only connection establishment fails over. Errors on an open
    /// connection surface to the caller.
    pub fn is_retryable_across_servers(&self) -> bool {
        matches!(self, SearchwireError::Connect { .. })
    }
}

pub type Result<T> = std::result::Result<T, SearchwireError>;
