//! The realtime AI peer client (C3): a typed send/receive surface over the
//! peer's bidirectional event-stream socket.
//!
//! Grounded on the callback-adapter shape the teacher uses for its own
//! peer-facing handler (`UasHandlerAdapter`), but the duck-typed dict
//! dispatch of the original is replaced by the closed [`AiEvent`] union
//! (spec.md §9's redesign point).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::events::{AiEvent, ClientMessage, FunctionCallOutputItem};
use crate::session::SessionConfig;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// The typed send/receive surface C7 drives a call's AI peer through.
///
/// Pulled out of [`RealtimePeerClient`] so the event router can be
/// exercised in tests against an in-memory double instead of a live
/// socket (spec.md §11.4's test-tooling section), without changing a
/// single call site in the router itself.
#[async_trait]
pub trait AiPeer: Send {
    async fn next_event(&mut self) -> Option<AiEvent>;
    fn unknown_event_count(&self) -> u64;

    async fn update_session(&mut self, session: SessionConfig) -> Result<()>;
    async fn create_conversation_item(&mut self, item: serde_json::Value) -> Result<()>;
    async fn append_input_audio(&mut self, base64_bytes: String) -> Result<()>;
    async fn commit_input_audio(&mut self) -> Result<()>;
    async fn clear_input_audio(&mut self) -> Result<()>;
    async fn create_response(&mut self) -> Result<()>;
    async fn cancel_response(&mut self) -> Result<()>;
    async fn send_function_result(&mut self, call_id: String, output: String) -> Result<()>;
}

/// A live connection to the realtime AI peer.
///
/// Reading and writing are split: [`RealtimePeerClient::events`] hands back
/// an `mpsc::Receiver<AiEvent>` fed by a background task, while the typed
/// `send_*` methods write directly. This mirrors how C7 treats the
/// telephony socket — no caller ever touches the raw `WsStream`.
pub struct RealtimePeerClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    events: mpsc::Receiver<AiEvent>,
    unknown_event_count: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl RealtimePeerClient {
    /// Connect to the realtime peer at `url`, authenticating with `api_key`
    /// via the `Authorization: Bearer` header (spec.md §6.4).
    pub async fn connect(url: &str, api_key: &str) -> Result<Self> {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;
        use tokio_tungstenite::tungstenite::http::HeaderValue;

        let mut request = url.into_client_request()?;
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| ClientError::NotConnected)?,
        );

        let (stream, _response) = connect_async(request).await?;
        let (write, mut read) = stream.split();

        let (tx, rx) = mpsc::channel(256);
        let unknown_event_count = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let counter = unknown_event_count.clone();

        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let frame = match frame {
                    Ok(f) => f,
                    Err(err) => {
                        warn!(error = %err, "realtime peer socket error");
                        break;
                    }
                };
                let text = match frame {
                    Message::Text(t) => t,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let event: AiEvent = match serde_json::from_str(&text) {
                    Ok(e) => e,
                    Err(err) => {
                        warn!(error = %err, "failed to parse realtime peer event");
                        continue;
                    }
                };
                if matches!(event, AiEvent::Unknown) {
                    counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    debug!("dropped unrecognized realtime peer event");
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self { write, events: rx, unknown_event_count })
    }

    async fn send(&mut self, message: ClientMessage) -> Result<()> {
        let text = serde_json::to_string(&message)?;
        self.write.send(Message::Text(text)).await?;
        Ok(())
    }
}

#[async_trait]
impl AiPeer for RealtimePeerClient {
    /// Receive the next parsed event, or `None` once the peer has closed.
    async fn next_event(&mut self) -> Option<AiEvent> {
        self.events.recv().await
    }

    fn unknown_event_count(&self) -> u64 {
        self.unknown_event_count.load(std::sync::atomic::Ordering::Relaxed)
    }

    async fn update_session(&mut self, session: SessionConfig) -> Result<()> {
        self.send(ClientMessage::SessionUpdate { session }).await
    }

    async fn create_conversation_item(&mut self, item: serde_json::Value) -> Result<()> {
        self.send(ClientMessage::ConversationItemCreate { item }).await
    }

    async fn append_input_audio(&mut self, base64_bytes: String) -> Result<()> {
        self.send(ClientMessage::InputAudioAppend { audio: base64_bytes }).await
    }

    async fn commit_input_audio(&mut self) -> Result<()> {
        self.send(ClientMessage::InputAudioCommit).await
    }

    async fn clear_input_audio(&mut self) -> Result<()> {
        self.send(ClientMessage::InputAudioClear).await
    }

    async fn create_response(&mut self) -> Result<()> {
        self.send(ClientMessage::ResponseCreate).await
    }

    async fn cancel_response(&mut self) -> Result<()> {
        self.send(ClientMessage::ResponseCancel).await
    }

    async fn send_function_result(&mut self, call_id: String, output: String) -> Result<()> {
        self.send(ClientMessage::FunctionCallOutput { item: FunctionCallOutputItem::new(call_id, output) }).await
    }
}
