use thiserror::Error;

/// Errors that can occur when using the Phoenix channels client.
#[derive(Error, Debug)]
pub enum PhoenixError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Channel-specific error (join rejected, push on a left channel, etc.)
    #[error("Channel error: {0}")]
    Channel(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Operation timed out (e.g. push acknowledgement not received)
    #[error("Timeout error")]
    Timeout,

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,
}

/// Convenience type alias for `Result<T, PhoenixError>`.
pub type Result<T> = std::result::Result<T, PhoenixError>;
