//! Dialect B: a framed protocol in the style of Twilio Media Streams
//! (spec.md §6.2). Frames are discriminated by an `event` field; audio
//! flows continuously after `start` with no explicit per-utterance
//! start/stop framing, so [`WireCodec::has_explicit_user_stream_events`]
//! returns `false` here.

use serde::Serialize;
use serde_json::Value;

use crate::codec::WireCodec;
use crate::error::{CodecError, Result};
use crate::event::{InboundEvent, OutboundAction};
use crate::format::AudioFormat;

pub struct TwilioCodec;

impl TwilioCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TwilioCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl WireCodec for TwilioCodec {
    fn name(&self) -> &'static str {
        "twilio"
    }

    fn decode(&self, frame: &str) -> Result<InboundEvent> {
        let v: Value = serde_json::from_str(frame)?;
        let kind = v
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::Malformed("missing `event` field".into()))?;

        let stream_sid = |v: &Value| -> String {
            v.get("streamSid").and_then(Value::as_str).unwrap_or_default().to_string()
        };

        let event = match kind {
            "connected" => InboundEvent::Hello,
            "start" => {
                let media_format = v.pointer("/start/mediaFormat");
                let encoding = media_format.and_then(|m| m.get("encoding")).and_then(Value::as_str).unwrap_or("audio/x-mulaw");
                let rate = media_format
                    .and_then(|m| m.get("sampleRate"))
                    .and_then(Value::as_u64)
                    .unwrap_or(8000) as u32;
                let format = AudioFormat::from_wire_name(encoding, rate).unwrap_or(AudioFormat::MULAW_8K);
                InboundEvent::SessionStart {
                    call_id: stream_sid(&v),
                    caller: String::new(),
                    bot: String::new(),
                    supported_formats: vec![format],
                    expects_audio_replies: true,
                }
            }
            "media" => InboundEvent::UserStreamChunk {
                call_id: stream_sid(&v),
                base64_bytes: v.pointer("/media/payload").and_then(Value::as_str).unwrap_or_default().to_string(),
                format: Some(AudioFormat::MULAW_8K),
            },
            "stop" => InboundEvent::Hangup { call_id: stream_sid(&v) },
            "dtmf" => InboundEvent::DtmfDigit {
                call_id: stream_sid(&v),
                digit: v.pointer("/dtmf/digit").and_then(Value::as_str).and_then(|s| s.chars().next()).unwrap_or('?'),
            },
            other => InboundEvent::Unknown { name: other.to_string() },
        };
        Ok(event)
    }

    fn encode(&self, action: &OutboundAction) -> Result<Option<String>> {
        #[derive(Serialize)]
        struct MediaPayload<'a> {
            payload: &'a str,
        }
        #[derive(Serialize)]
        struct MarkPayload {
            name: String,
        }
        #[derive(Serialize)]
        #[serde(tag = "event", rename_all = "lowercase")]
        enum Out<'a> {
            Media { stream_sid: &'a str, media: MediaPayload<'a> },
            Mark { stream_sid: &'a str, mark: MarkPayload },
            Clear { stream_sid: &'a str },
        }

        let out = match action {
            OutboundAction::OutputChunk { call_id, base64_bytes, .. } => {
                Out::Media { stream_sid: call_id, media: MediaPayload { payload: base64_bytes } }
            }
            OutboundAction::StartOutputStream { call_id, stream_id, .. } => Out::Mark {
                stream_sid: call_id,
                mark: MarkPayload { name: format!("start:{stream_id}") },
            },
            OutboundAction::StopOutputStream { call_id, stream_id } => Out::Mark {
                stream_sid: call_id,
                mark: MarkPayload { name: format!("stop:{stream_id}") },
            },
            OutboundAction::Mark { call_id, name } => {
                Out::Mark { stream_sid: call_id, mark: MarkPayload { name: name.clone() } }
            }
            // Barge-in / cancellation: Twilio's closest primitive is
            // `clear`, which flushes buffered outbound media.
            OutboundAction::Hangup { call_id, .. } | OutboundAction::EndCall { call_id } => {
                Out::Clear { stream_sid: call_id }
            }
            // No wire representation in this dialect: Twilio has no
            // explicit accept/reject/started/stopped frame.
            OutboundAction::AcceptSession { .. }
            | OutboundAction::RejectSession { .. }
            | OutboundAction::UserStreamStarted { .. }
            | OutboundAction::UserStreamStopped { .. } => return Ok(None),
        };
        Ok(Some(serde_json::to_string(&out)?))
    }

    fn max_chunk_bytes(&self) -> usize {
        // Twilio-style dialects frame much smaller than the AudioCodes cap.
        64 * 1024
    }

    fn required_inbound_format(&self) -> AudioFormat {
        AudioFormat::MULAW_8K
    }

    fn preferred_outbound_format(&self) -> AudioFormat {
        AudioFormat::MULAW_8K
    }

    fn has_explicit_user_stream_events(&self) -> bool {
        false
    }
}
