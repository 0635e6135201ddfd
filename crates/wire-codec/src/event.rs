//! Dialect-agnostic event/action vocabulary (spec.md §4.1).
//!
//! Every [`WireCodec`](crate::codec::WireCodec) parses its dialect's frames
//! into this closed set before handing them to the bridge — the bridge never
//! reads a raw wire field. This is the "duck-typed events → tagged-union
//! message types" redesign point from spec.md §9.

use crate::format::AudioFormat;

/// A parsed inbound frame from the telephony peer.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    SessionStart {
        call_id: String,
        caller: String,
        bot: String,
        supported_formats: Vec<AudioFormat>,
        expects_audio_replies: bool,
    },
    SessionResume {
        call_id: String,
    },
    SessionEnd {
        call_id: String,
        reason: String,
    },
    UserStreamStart {
        call_id: String,
    },
    UserStreamChunk {
        call_id: String,
        base64_bytes: String,
        format: Option<AudioFormat>,
    },
    UserStreamStop {
        call_id: String,
    },
    DtmfDigit {
        call_id: String,
        digit: char,
    },
    Hangup {
        call_id: String,
    },
    Hello,
    Ping,
    /// An event kind the codec doesn't recognize. Dropped at the router with
    /// a warning counter (spec.md §4.1).
    Unknown {
        name: String,
    },
}

/// An internal action the router wants written to the telephony peer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundAction {
    AcceptSession {
        call_id: String,
        media_format: AudioFormat,
    },
    RejectSession {
        call_id: String,
        reason: String,
    },
    StartOutputStream {
        call_id: String,
        stream_id: String,
        format: AudioFormat,
    },
    OutputChunk {
        call_id: String,
        stream_id: String,
        base64_bytes: String,
    },
    StopOutputStream {
        call_id: String,
        stream_id: String,
    },
    UserStreamStarted {
        call_id: String,
    },
    UserStreamStopped {
        call_id: String,
    },
    Hangup {
        call_id: String,
        reason: String,
    },
    Mark {
        call_id: String,
        name: String,
    },
    EndCall {
        call_id: String,
    },
}
