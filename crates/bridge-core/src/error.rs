use thiserror::Error;

/// Failures raised while a call moves through its lifecycle.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition { from: crate::call::CallState, to: crate::call::CallState },

    #[error("call {0} not found")]
    CallNotFound(String),

    #[error("no shared audio format between telephony peer and realtime peer")]
    FormatNegotiationFailed,

    #[error("wire codec error: {0}")]
    Codec(#[from] voxbridge_wire_codec::CodecError),

    #[error("audio format error: {0}")]
    Audio(#[from] voxbridge_audio_dsp::AudioFormatError),

    #[error("realtime peer client error: {0}")]
    RealtimeClient(#[from] voxbridge_realtime_client::ClientError),

    #[error("unknown tool requested: {0}")]
    UnknownTool(String),

    #[error("invalid base64 audio payload: {0}")]
    InvalidAudioPayload(String),

    #[error("tool invocation failed: {0}")]
    ToolFailed(String),
}

/// Failures specific to the event router's dispatch loop.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("telephony peer socket closed")]
    TelephonyDisconnected,

    #[error("realtime peer socket closed")]
    RealtimePeerDisconnected,

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
