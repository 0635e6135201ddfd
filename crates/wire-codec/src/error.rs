use thiserror::Error;

/// Failures raised while framing or parsing a telephony wire protocol.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unsupported action for this dialect: {0}")]
    UnsupportedAction(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, CodecError>;
