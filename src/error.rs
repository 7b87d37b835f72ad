use thiserror::Error;

#[derive(Error, Debug)]
pub enum NozzleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Firehose transport error: {0}")]
    Transport(String),

    #[error("Firehose websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Undecodable envelope: {0}")]
    Decode(String),

    #[error("{service} returned HTTP {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Health server failed: {0}")]
    Server(#[from] hyper::Error),
}

pub type Result<T> = std::result::Result<T, NozzleError>;
