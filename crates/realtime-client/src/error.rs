use thiserror::Error;

/// Failures raised by the realtime AI peer client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("realtime peer disconnected")]
    PeerDisconnected,

    #[error("invalid session configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("json encode/decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("realtime peer is not connected")]
    NotConnected,
}

/// Validation failures for [`crate::session::SessionConfig`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("model id cannot change after the session has connected (was {current}, attempted {attempted})")]
    ModelFrozen { current: String, attempted: String },

    #[error("temperature {0} is outside the supported range [0.6, 1.2]")]
    TemperatureOutOfRange(f32),

    #[error("tool_choice {0:?} must be one of \"auto\", \"none\", \"required\"")]
    InvalidToolChoice(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
