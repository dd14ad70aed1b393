//! Crate-level error type.

use crate::connection::ConnectionState;

/// Every failure the client core can report.
///
/// None of these are fatal to a page session: credential and connection
/// failures are surfaced as status messages and the user may retry.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A required credential token is absent from the page query string.
    #[error("{missing} URL parameter is required")]
    MissingCredentials { missing: &'static str },

    /// A send was attempted while the socket was not open.
    #[error("socket is not open (state: {state})")]
    NotConnected { state: ConnectionState },

    /// The configured endpoint is not a usable ws:// or wss:// URL.
    #[error("invalid endpoint '{endpoint}': {detail}")]
    InvalidEndpoint { endpoint: String, detail: String },

    /// The underlying WebSocket failed.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An internal channel was dropped (session torn down).
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A request could not be built from user input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A REPL line did not parse into a command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
