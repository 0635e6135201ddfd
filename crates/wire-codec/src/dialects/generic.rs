//! Generic inbound test dialect (spec.md §4.1): a minimal, stable JSON
//! framing used by conformance tests and local harnesses that don't want
//! to speak a vendor-specific dialect. Mirrors dialect A's event
//! vocabulary closely but keeps field names flat and undotted.

use serde::Serialize;
use serde_json::Value;

use crate::codec::WireCodec;
use crate::error::{CodecError, Result};
use crate::event::{InboundEvent, OutboundAction};
use crate::format::AudioFormat;

pub struct GenericCodec;

impl GenericCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenericCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl WireCodec for GenericCodec {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn decode(&self, frame: &str) -> Result<InboundEvent> {
        let v: Value = serde_json::from_str(frame)?;
        let kind = v
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::Malformed("missing `kind` field".into()))?;
        let call_id = |v: &Value| -> String {
            v.get("call_id").and_then(Value::as_str).unwrap_or_default().to_string()
        };

        let event = match kind {
            "start" => InboundEvent::SessionStart {
                call_id: call_id(&v),
                caller: v.get("caller").and_then(Value::as_str).unwrap_or_default().to_string(),
                bot: v.get("bot").and_then(Value::as_str).unwrap_or_default().to_string(),
                supported_formats: v
                    .get("formats")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .filter_map(|n| AudioFormat::from_wire_name(n, 16000))
                    .collect(),
                expects_audio_replies: v.get("expects_audio").and_then(Value::as_bool).unwrap_or(true),
            },
            "resume" => InboundEvent::SessionResume { call_id: call_id(&v) },
            "end" => InboundEvent::SessionEnd {
                call_id: call_id(&v),
                reason: v.get("reason").and_then(Value::as_str).unwrap_or_default().to_string(),
            },
            "stream_start" => InboundEvent::UserStreamStart { call_id: call_id(&v) },
            "stream_chunk" => InboundEvent::UserStreamChunk {
                call_id: call_id(&v),
                base64_bytes: v.get("audio").and_then(Value::as_str).unwrap_or_default().to_string(),
                format: v.get("format").and_then(Value::as_str).and_then(|n| AudioFormat::from_wire_name(n, 16000)),
            },
            "stream_stop" => InboundEvent::UserStreamStop { call_id: call_id(&v) },
            "dtmf" => InboundEvent::DtmfDigit {
                call_id: call_id(&v),
                digit: v.get("digit").and_then(Value::as_str).and_then(|s| s.chars().next()).unwrap_or('?'),
            },
            "hangup" => InboundEvent::Hangup { call_id: call_id(&v) },
            "hello" => InboundEvent::Hello,
            "ping" => InboundEvent::Ping,
            other => InboundEvent::Unknown { name: other.to_string() },
        };
        Ok(event)
    }

    fn encode(&self, action: &OutboundAction) -> Result<Option<String>> {
        #[derive(Serialize)]
        #[serde(tag = "kind", rename_all = "snake_case")]
        enum Out<'a> {
            Accepted { call_id: &'a str, format: &'a str },
            Rejected { call_id: &'a str, reason: &'a str },
            StreamStart { call_id: &'a str, stream_id: &'a str, format: &'a str },
            StreamChunk { call_id: &'a str, stream_id: &'a str, audio: &'a str },
            StreamStop { call_id: &'a str, stream_id: &'a str },
            UserStreamStarted { call_id: &'a str },
            UserStreamStopped { call_id: &'a str },
            Hangup { call_id: &'a str, reason: &'a str },
            Mark { call_id: &'a str, name: &'a str },
        }

        let out = match action {
            OutboundAction::AcceptSession { call_id, media_format } => {
                Out::Accepted { call_id, format: media_format.wire_name() }
            }
            OutboundAction::RejectSession { call_id, reason } => Out::Rejected { call_id, reason },
            OutboundAction::StartOutputStream { call_id, stream_id, format } => {
                Out::StreamStart { call_id, stream_id, format: format.wire_name() }
            }
            OutboundAction::OutputChunk { call_id, stream_id, base64_bytes } => {
                Out::StreamChunk { call_id, stream_id, audio: base64_bytes }
            }
            OutboundAction::StopOutputStream { call_id, stream_id } => {
                Out::StreamStop { call_id, stream_id }
            }
            OutboundAction::UserStreamStarted { call_id } => Out::UserStreamStarted { call_id },
            OutboundAction::UserStreamStopped { call_id } => Out::UserStreamStopped { call_id },
            OutboundAction::Hangup { call_id, reason } => Out::Hangup { call_id, reason },
            OutboundAction::Mark { call_id, name } => Out::Mark { call_id, name },
            OutboundAction::EndCall { call_id } => Out::Hangup { call_id, reason: "" },
        };
        Ok(Some(serde_json::to_string(&out)?))
    }

    fn max_chunk_bytes(&self) -> usize {
        1024 * 1024
    }

    fn required_inbound_format(&self) -> AudioFormat {
        AudioFormat::LINEAR_16K
    }

    fn preferred_outbound_format(&self) -> AudioFormat {
        AudioFormat::LINEAR_16K
    }
}
