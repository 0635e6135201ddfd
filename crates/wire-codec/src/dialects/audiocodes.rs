//! Dialect A: a JSON-over-socket protocol in the style of AudioCodes VoiceAI
//! Connect (spec.md §6.1). One JSON object per frame, discriminated by a
//! dotted `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::WireCodec;
use crate::error::{CodecError, Result};
use crate::event::{InboundEvent, OutboundAction};
use crate::format::{AudioEncoding, AudioFormat};

pub struct AudioCodesCodec;

impl AudioCodesCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AudioCodesCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct Activity {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl WireCodec for AudioCodesCodec {
    fn name(&self) -> &'static str {
        "audiocodes"
    }

    fn decode(&self, frame: &str) -> Result<InboundEvent> {
        let v: Value = serde_json::from_str(frame)?;
        let kind = v
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::Malformed("missing `type` field".into()))?;

        let call_id = |v: &Value| -> String {
            v.get("conversationId").and_then(Value::as_str).unwrap_or_default().to_string()
        };

        let event = match kind {
            "session.initiate" => {
                let supported_formats = v
                    .get("supportedMediaFormats")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .filter_map(|name| parse_format_name(name))
                    .collect();
                InboundEvent::SessionStart {
                    call_id: call_id(&v),
                    caller: v.get("caller").and_then(Value::as_str).unwrap_or_default().to_string(),
                    bot: v.get("botName").and_then(Value::as_str).unwrap_or_default().to_string(),
                    supported_formats,
                    expects_audio_replies: v
                        .get("expectAudioMessages")
                        .and_then(Value::as_bool)
                        .unwrap_or(true),
                }
            }
            "session.resume" => InboundEvent::SessionResume { call_id: call_id(&v) },
            "session.end" => InboundEvent::SessionEnd {
                call_id: call_id(&v),
                reason: v.get("reason").and_then(Value::as_str).unwrap_or_default().to_string(),
            },
            "userStream.start" => InboundEvent::UserStreamStart { call_id: call_id(&v) },
            "userStream.chunk" => InboundEvent::UserStreamChunk {
                call_id: call_id(&v),
                base64_bytes: v.get("audioChunk").and_then(Value::as_str).unwrap_or_default().to_string(),
                format: v.get("format").and_then(Value::as_str).and_then(|n| parse_format_name(n)),
            },
            "userStream.stop" => InboundEvent::UserStreamStop { call_id: call_id(&v) },
            "activities" => {
                let activities: Vec<Activity> = serde_json::from_value(
                    v.get("activities").cloned().unwrap_or(Value::Array(vec![])),
                )?;
                let id = call_id(&v);
                match activities.into_iter().find(|a| a.kind == "dtmf" || a.kind == "hangup") {
                    Some(a) if a.kind == "dtmf" => InboundEvent::DtmfDigit {
                        call_id: id,
                        digit: a
                            .value
                            .or(a.name)
                            .and_then(|s| s.chars().next())
                            .unwrap_or('?'),
                    },
                    Some(_) => InboundEvent::Hangup { call_id: id },
                    None => InboundEvent::Unknown { name: "activities".into() },
                }
            }
            "ping" => InboundEvent::Ping,
            "hello" => InboundEvent::Hello,
            other => InboundEvent::Unknown { name: other.to_string() },
        };
        Ok(event)
    }

    fn encode(&self, action: &OutboundAction) -> Result<Option<String>> {
        #[derive(Serialize)]
        #[serde(tag = "type")]
        enum Out<'a> {
            #[serde(rename = "session.accepted")]
            Accepted { conversation_id: &'a str, media_format: &'a str },
            #[serde(rename = "session.error")]
            Error { conversation_id: &'a str, reason: &'a str },
            #[serde(rename = "playStream.start")]
            PlayStart { conversation_id: &'a str, stream_id: &'a str, media_format: &'a str },
            #[serde(rename = "playStream.chunk")]
            PlayChunk { conversation_id: &'a str, stream_id: &'a str, audio_chunk: &'a str },
            #[serde(rename = "playStream.stop")]
            PlayStop { conversation_id: &'a str, stream_id: &'a str },
            #[serde(rename = "userStream.started")]
            UserStarted { conversation_id: &'a str },
            #[serde(rename = "userStream.stopped")]
            UserStopped { conversation_id: &'a str },
            #[serde(rename = "session.end")]
            End { conversation_id: &'a str, reason: &'a str },
        }

        let out = match action {
            OutboundAction::AcceptSession { call_id, media_format } => Out::Accepted {
                conversation_id: call_id,
                media_format: media_format.wire_name(),
            },
            OutboundAction::RejectSession { call_id, reason } => {
                Out::Error { conversation_id: call_id, reason }
            }
            OutboundAction::StartOutputStream { call_id, stream_id, format } => Out::PlayStart {
                conversation_id: call_id,
                stream_id,
                media_format: format.wire_name(),
            },
            OutboundAction::OutputChunk { call_id, stream_id, base64_bytes } => Out::PlayChunk {
                conversation_id: call_id,
                stream_id,
                audio_chunk: base64_bytes,
            },
            OutboundAction::StopOutputStream { call_id, stream_id } => {
                Out::PlayStop { conversation_id: call_id, stream_id }
            }
            OutboundAction::UserStreamStarted { call_id } => Out::UserStarted { conversation_id: call_id },
            OutboundAction::UserStreamStopped { call_id } => Out::UserStopped { conversation_id: call_id },
            OutboundAction::Hangup { call_id, reason } => Out::End { conversation_id: call_id, reason },
            OutboundAction::Mark { .. } => return Ok(None),
            OutboundAction::EndCall { call_id } => Out::End { conversation_id: call_id, reason: "" },
        };
        Ok(Some(serde_json::to_string(&out)?))
    }

    fn max_chunk_bytes(&self) -> usize {
        15 * 1024 * 1024
    }

    fn required_inbound_format(&self) -> AudioFormat {
        AudioFormat::LINEAR_16K
    }

    fn preferred_outbound_format(&self) -> AudioFormat {
        AudioFormat::LINEAR_16K
    }
}

fn parse_format_name(name: &str) -> Option<AudioFormat> {
    // AudioCodes advertises e.g. "raw/lpcm16_16" or plain "audio/x-mulaw";
    // accept both a bare name (assume 16kHz) and a `name_rate` suffix form.
    if let Some((base, rate)) = name.rsplit_once('_') {
        if let Ok(rate) = rate.parse::<u32>() {
            if let Some(fmt) = AudioFormat::from_wire_name(base, rate) {
                return Some(fmt);
            }
        }
    }
    let default_rate = if name.contains("mulaw") { 8000 } else { 16000 };
    AudioFormat::from_wire_name(name, default_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_session_initiate() {
        let codec = AudioCodesCodec::new();
        let frame = r#"{"type":"session.initiate","conversationId":"C1","botName":"bot","caller":"+1555","supportedMediaFormats":["raw/lpcm16"],"expectAudioMessages":true}"#;
        let event = codec.decode(frame).unwrap();
        match event {
            InboundEvent::SessionStart { call_id, expects_audio_replies, .. } => {
                assert_eq!(call_id, "C1");
                assert!(expects_audio_replies);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_unknown_event() {
        let codec = AudioCodesCodec::new();
        let event = codec.decode(r#"{"type":"totally.new","conversationId":"C1"}"#).unwrap();
        assert_eq!(event, InboundEvent::Unknown { name: "totally.new".into() });
    }

    #[test]
    fn encodes_accept_session() {
        let codec = AudioCodesCodec::new();
        let frame = codec
            .encode(&OutboundAction::AcceptSession {
                call_id: "C1".into(),
                media_format: AudioFormat::LINEAR_16K,
            })
            .unwrap()
            .unwrap();
        assert!(frame.contains("session.accepted"));
        assert!(frame.contains("C1"));
    }

    #[test]
    fn mark_has_no_wire_representation() {
        let codec = AudioCodesCodec::new();
        let out = codec.encode(&OutboundAction::Mark { call_id: "C1".into(), name: "x".into() }).unwrap();
        assert!(out.is_none());
    }
}
