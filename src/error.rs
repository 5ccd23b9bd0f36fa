//! Error types shared across the crate.

/// Errors from the stats provider client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    #[error("request cancelled before completion")]
    Cancelled,

    #[error("{method} {url}: {status}")]
    Upstream {
        status: u16,
        method: String,
        url: String,
    },

    #[error("could not decode response: {reason}")]
    Decode { reason: String },

    #[error("no region data for player {battle_tag}")]
    PlayerNotFound { battle_tag: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from a publishing sink.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("unknown message handle {0}")]
    UnknownHandle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while loading configuration or the roster file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ConfigError> for String {
    fn from(e: ConfigError) -> Self {
        e.to_string()
    }
}
