//! The realtime AI peer's event vocabulary (spec.md §6.4), as a closed
//! tagged union. [`crate::client::RealtimePeerClient`] never exposes the
//! underlying JSON to callers — every inbound message is parsed into one
//! of these variants or rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::SessionConfig;

/// Severity the bridge should react to an `error` event with
/// (spec.md §12's supplemented error-severity table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Logged and surfaced, no special recovery.
    Info,
    /// Logged with a warning; triggers the rate-limit backoff pause.
    WarnAndPause,
    /// Logged as an error; the call should be considered unrecoverable.
    Fatal,
}

impl ErrorSeverity {
    pub fn classify(code: &str) -> Self {
        match code {
            "server_error" | "internal_server_error" => Self::Fatal,
            "rate_limit_error" => Self::WarnAndPause,
            _ => Self::Info,
        }
    }
}

/// A parsed event from the realtime AI peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AiEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionConfig },
    #[serde(rename = "session.updated")]
    SessionUpdated { session: SessionConfig },

    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated { item_id: String, item: Value },

    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioSpeechStarted { item_id: String },
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioSpeechStopped { item_id: String },
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioCommitted { item_id: String },

    #[serde(rename = "response.created")]
    ResponseCreated { response_id: String },
    #[serde(rename = "response.done")]
    ResponseDone { response_id: String, status: String },

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        response_id: String,
        output_index: u32,
        item_id: String,
        item_type: String,
        /// Present when `item_type == "function_call"`; the function's
        /// name, capturable this early per spec.md §4.6.
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone { response_id: String, output_index: u32, item_id: String },

    #[serde(rename = "response.audio.delta")]
    AudioDelta { response_id: String, item_id: String, base64_bytes: String },
    #[serde(rename = "response.audio.done")]
    AudioDone { response_id: String, item_id: String },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { response_id: String, item_id: String, delta: String },
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone { response_id: String, item_id: String, transcript: String },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { response_id: String, item_id: String, call_id: String, delta: String },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone { response_id: String, item_id: String, call_id: String, name: String, arguments: String },

    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated { limits: Value },

    #[serde(rename = "error")]
    Error { code: String, message: String },

    /// An event kind this client doesn't yet recognize. Counted and
    /// logged rather than treated as fatal (spec.md §12).
    #[serde(other)]
    Unknown,
}

/// A typed request the bridge sends to the realtime peer
/// (spec.md §6.4's client-to-peer surface).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: Value },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend { audio: String },
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioCommit,
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioClear,

    #[serde(rename = "response.create")]
    ResponseCreate,
    #[serde(rename = "response.cancel")]
    ResponseCancel,

    #[serde(rename = "conversation.item.create")]
    FunctionCallOutput { item: FunctionCallOutputItem },
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionCallOutputItem {
    #[serde(rename = "type")]
    pub item_type: &'static str,
    pub call_id: String,
    pub output: String,
}

impl FunctionCallOutputItem {
    pub fn new(call_id: String, output: String) -> Self {
        Self { item_type: "function_call_output", call_id, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_audio_delta() {
        let json = r#"{"type":"response.audio.delta","response_id":"r1","item_id":"i1","base64_bytes":"AAA="}"#;
        let event: AiEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            AiEvent::AudioDelta { response_id: "r1".into(), item_id: "i1".into(), base64_bytes: "AAA=".into() }
        );
    }

    #[test]
    fn unrecognized_type_becomes_unknown() {
        let json = r#"{"type":"some.future.event","foo":"bar"}"#;
        let event: AiEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, AiEvent::Unknown);
    }

    #[test]
    fn classifies_error_severity() {
        assert_eq!(ErrorSeverity::classify("server_error"), ErrorSeverity::Fatal);
        assert_eq!(ErrorSeverity::classify("rate_limit_error"), ErrorSeverity::WarnAndPause);
        assert_eq!(ErrorSeverity::classify("invalid_request_error"), ErrorSeverity::Info);
    }
}
