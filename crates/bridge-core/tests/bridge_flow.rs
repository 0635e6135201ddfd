//! End-to-end Bridge behavior (spec.md §8's testable scenarios), driven
//! through an in-memory double for the AI peer socket and a direct call
//! into the `Bridge` for the telephony side, standing in for the two real
//! sockets (SPEC_FULL.md §11.4).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use voxbridge_core::{Bridge, Call, CallId, ServerContext, BridgeConfig, Tool, ToolRegistry};
use voxbridge_core::{BridgeError, RouterError};
use voxbridge_realtime_client::{AiEvent, AiPeer, Result as ClientResult, SessionConfig, ToolChoice, TurnDetection};
use voxbridge_wire_codec::dialects::GenericCodec;
use voxbridge_wire_codec::{AudioEncoding, AudioFormat, InboundEvent, OutboundAction};

/// A stand-in for `RealtimePeerClient`: same [`AiPeer`] surface, backed by
/// a channel the test controls directly instead of a live WebSocket.
struct FakeAiPeer {
    incoming: mpsc::Receiver<AiEvent>,
    audio_appends: Vec<String>,
    commits: u32,
    responses_created: u32,
    responses_cancelled: u32,
    function_results: Vec<(String, String)>,
}

impl FakeAiPeer {
    fn new(incoming: mpsc::Receiver<AiEvent>) -> Self {
        Self {
            incoming,
            audio_appends: Vec::new(),
            commits: 0,
            responses_created: 0,
            responses_cancelled: 0,
            function_results: Vec::new(),
        }
    }
}

#[async_trait]
impl AiPeer for FakeAiPeer {
    async fn next_event(&mut self) -> Option<AiEvent> {
        self.incoming.recv().await
    }

    fn unknown_event_count(&self) -> u64 {
        0
    }

    async fn update_session(&mut self, _session: SessionConfig) -> ClientResult<()> {
        Ok(())
    }

    async fn create_conversation_item(&mut self, _item: Value) -> ClientResult<()> {
        Ok(())
    }

    async fn append_input_audio(&mut self, base64_bytes: String) -> ClientResult<()> {
        self.audio_appends.push(base64_bytes);
        Ok(())
    }

    async fn commit_input_audio(&mut self) -> ClientResult<()> {
        self.commits += 1;
        Ok(())
    }

    async fn clear_input_audio(&mut self) -> ClientResult<()> {
        Ok(())
    }

    async fn create_response(&mut self) -> ClientResult<()> {
        self.responses_created += 1;
        Ok(())
    }

    async fn cancel_response(&mut self) -> ClientResult<()> {
        self.responses_cancelled += 1;
        Ok(())
    }

    async fn send_function_result(&mut self, call_id: String, output: String) -> ClientResult<()> {
        self.function_results.push((call_id, output));
        Ok(())
    }
}

fn test_session() -> SessionConfig {
    SessionConfig {
        model: "test-model".into(),
        instructions: String::new(),
        voice: "alloy".into(),
        temperature: 0.8,
        turn_detection: TurnDetection::None,
        tool_choice: ToolChoice::Auto,
        tools: vec![],
    }
}

fn test_config() -> BridgeConfig {
    BridgeConfig {
        realtime_peer_url: "wss://example.invalid".into(),
        realtime_peer_api_key: "test".into(),
        default_session: test_session(),
        commit_threshold_ms: 100,
        rate_limit_backoff: Duration::from_secs(2),
        ai_peer_idle_timeout: Duration::from_secs(60),
        tool_call_timeout: Duration::from_millis(50),
    }
}

fn new_bridge(tools: ToolRegistry) -> (Bridge, mpsc::Receiver<OutboundAction>) {
    let call = Call::new(CallId::from("call-1"), "generic", "caller", "bot");
    let (outbound_tx, outbound_rx) = mpsc::channel(32);
    let bridge = Bridge::with_tool_timeout(
        call,
        Box::new(GenericCodec::new()),
        tools,
        outbound_tx,
        /* auto_follow_response */ true,
        Duration::from_millis(50),
    );
    (bridge, outbound_rx)
}

fn b64_silence(num_bytes: usize) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(vec![0u8; num_bytes])
}

#[tokio::test]
async fn bare_greeting_accepts_session_and_starts_output_stream() {
    let (bridge, mut outbound) = new_bridge(ToolRegistry::new());
    let mut ai = FakeAiPeer::new(mpsc::channel(1).1);
    let ctx = ServerContext::new(test_config());

    bridge
        .handle_inbound(
            InboundEvent::SessionStart {
                call_id: "call-1".into(),
                caller: "caller".into(),
                bot: "bot".into(),
                supported_formats: vec![AudioFormat::LINEAR_16K],
                expects_audio_replies: true,
            },
            &mut ai,
            &ctx,
        )
        .await
        .unwrap();

    let accepted = outbound.recv().await.unwrap();
    assert!(matches!(accepted, OutboundAction::AcceptSession { media_format, .. } if media_format == AudioFormat::LINEAR_16K));
    assert_eq!(bridge.call.lock().await.state, voxbridge_core::CallState::Active);
    assert_eq!(ai.responses_created, 1, "expects_audio_replies must seed a greeting response");
}

#[tokio::test]
async fn short_utterance_is_padded_until_commit_threshold_then_committed() {
    let (bridge, mut outbound) = new_bridge(ToolRegistry::new());
    let mut ai = FakeAiPeer::new(mpsc::channel(1).1);
    let ctx = ServerContext::new(test_config());

    bridge
        .handle_inbound(
            InboundEvent::SessionStart {
                call_id: "call-1".into(),
                caller: "caller".into(),
                bot: "bot".into(),
                supported_formats: vec![AudioFormat::LINEAR_16K],
                expects_audio_replies: true,
            },
            &mut ai,
            &ctx,
        )
        .await
        .unwrap();
    let _ = outbound.recv().await.unwrap();

    // 16kHz * 2 bytes/sample = 32 bytes/ms; 20ms of audio is below the
    // 100ms commit threshold and must not trigger a commit yet.
    bridge
        .handle_inbound(
            InboundEvent::UserStreamChunk {
                call_id: "call-1".into(),
                base64_bytes: b64_silence(32 * 20),
                format: Some(AudioFormat::LINEAR_16K),
            },
            &mut ai,
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(ai.commits, 0, "below-threshold audio must not be committed yet");

    // Explicitly stopping the user stream flushes whatever is buffered,
    // even short of the threshold (spec.md §4.5's end-of-utterance flush).
    bridge
        .handle_inbound(InboundEvent::UserStreamStop { call_id: "call-1".into() }, &mut ai, &ctx)
        .await
        .unwrap();

    assert_eq!(ai.commits, 1);
    assert_eq!(ai.audio_appends.len(), 1);

    use base64::Engine;
    let padded = base64::engine::general_purpose::STANDARD.decode(&ai.audio_appends[0]).unwrap();
    assert_eq!(padded.len(), 32 * 100, "buffer must be padded to the 100ms commit threshold");
}

#[tokio::test]
async fn barge_in_cancels_the_ai_response_and_stops_active_output() {
    let (bridge, mut outbound) = new_bridge(ToolRegistry::new());
    let ctx = ServerContext::new(test_config());
    let (_tx, rx) = mpsc::channel(1);
    let mut ai = FakeAiPeer::new(rx);

    bridge.streams.lock().await.add_output(voxbridge_core::StreamId::from("o1"), "r1", AudioFormat::LINEAR_16K);

    bridge
        .handle_ai_event(AiEvent::InputAudioSpeechStarted { item_id: "i1".into() }, &mut ai, &ctx)
        .await
        .unwrap();

    assert_eq!(ai.responses_cancelled, 1);
    let stop = outbound.recv().await.unwrap();
    assert!(matches!(stop, OutboundAction::StopOutputStream { stream_id, .. } if stream_id == "o1"));
    assert!(!bridge.streams.lock().await.has_active_output());
}

struct Echo;

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn invoke(&self, arguments: Value) -> std::result::Result<Value, String> {
        Ok(arguments)
    }
}

#[tokio::test]
async fn tool_call_round_trip_invokes_the_tool_and_sends_its_output_back() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(Echo));
    let (bridge, _outbound) = new_bridge(tools);
    let ctx = ServerContext::new(test_config());
    let (_tx, rx) = mpsc::channel(1);
    let mut ai = FakeAiPeer::new(rx);

    bridge
        .handle_ai_event(
            AiEvent::FunctionCallArgumentsDelta {
                response_id: "r1".into(),
                item_id: "item1".into(),
                call_id: "call-xyz".into(),
                delta: r#"{"city":"#.into(),
            },
            &mut ai,
            &ctx,
        )
        .await
        .unwrap();
    bridge
        .handle_ai_event(
            AiEvent::FunctionCallArgumentsDelta {
                response_id: "r1".into(),
                item_id: "item1".into(),
                call_id: "call-xyz".into(),
                delta: r#""nyc"}"#.into(),
            },
            &mut ai,
            &ctx,
        )
        .await
        .unwrap();
    bridge
        .handle_ai_event(
            AiEvent::FunctionCallArgumentsDone {
                response_id: "r1".into(),
                item_id: "item1".into(),
                call_id: "call-xyz".into(),
                name: "echo".into(),
                arguments: r#"{"city":"nyc"}"#.into(),
            },
            &mut ai,
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(ai.function_results.len(), 1);
    assert_eq!(ai.function_results[0].0, "call-xyz");
    assert_eq!(ai.function_results[0].1, r#"{"city":"nyc"}"#);
    assert_eq!(ai.responses_created, 1);
}

#[tokio::test]
async fn unknown_tool_gets_an_error_result_sent_back_instead_of_stalling() {
    let (bridge, _outbound) = new_bridge(ToolRegistry::new());
    let ctx = ServerContext::new(test_config());
    let (_tx, rx) = mpsc::channel(1);
    let mut ai = FakeAiPeer::new(rx);

    bridge
        .handle_ai_event(
            AiEvent::FunctionCallArgumentsDelta {
                response_id: "r1".into(),
                item_id: "item1".into(),
                call_id: "call-xyz".into(),
                delta: "{}".into(),
            },
            &mut ai,
            &ctx,
        )
        .await
        .unwrap();

    // handle_ai_event itself never returns an error for a failed tool
    // invocation (spec.md §7: tool errors are caught inside C6 and never
    // propagate to the router) — an error result is sent back instead so
    // the conversation never stalls.
    let result = bridge
        .handle_ai_event(
            AiEvent::FunctionCallArgumentsDone {
                response_id: "r1".into(),
                item_id: "item1".into(),
                call_id: "call-xyz".into(),
                name: "does-not-exist".into(),
                arguments: "{}".into(),
            },
            &mut ai,
            &ctx,
        )
        .await;
    assert!(result.is_ok());

    assert_eq!(ai.function_results.len(), 1);
    assert_eq!(ai.function_results[0].0, "call-xyz");
    let value: Value = serde_json::from_str(&ai.function_results[0].1).unwrap();
    assert_eq!(value["error"], "not_implemented");
    assert_eq!(value["function"], "does-not-exist");
    assert_eq!(ai.responses_created, 1);
}

#[tokio::test]
async fn ai_peer_disconnect_is_observable_as_a_closed_event_stream() {
    let (tx, rx) = mpsc::channel(1);
    let mut ai = FakeAiPeer::new(rx);
    drop(tx);
    assert!(ai.next_event().await.is_none());
}

#[tokio::test]
async fn format_negotiation_failure_rejects_the_session() {
    let (bridge, mut outbound) = new_bridge(ToolRegistry::new());
    let ctx = ServerContext::new(test_config());
    let (_tx, rx) = mpsc::channel(1);
    let mut ai = FakeAiPeer::new(rx);

    let err = bridge
        .handle_inbound(
            InboundEvent::SessionStart {
                call_id: "call-1".into(),
                caller: "caller".into(),
                bot: "bot".into(),
                supported_formats: vec![AudioFormat::new(AudioEncoding::LinearPcm16, 44_100)],
                expects_audio_replies: true,
            },
            &mut ai,
            &ctx,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::Bridge(BridgeError::FormatNegotiationFailed)));
    let rejected = outbound.recv().await.unwrap();
    assert!(matches!(rejected, OutboundAction::RejectSession { .. }));
}
