//! The telephony-facing WebSocket front-end (C8).
//!
//! One route, `/ws/:dialect`, accepts a connection for any wire codec
//! [`voxbridge_wire_codec::dialects::by_name`] knows. The front-end never
//! parses a wire frame itself (spec.md §4.8) — it hands raw text frames to
//! the dialect's [`WireCodec`] and everything else to a [`Bridge`].

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use voxbridge_core::{Bridge, Call, CallId, ServerContext, ToolRegistry};
use voxbridge_realtime_client::{AiPeer, RealtimePeerClient};
use voxbridge_wire_codec::{dialects, InboundEvent, OutboundAction, WireCodec};

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<ServerContext>,
    pub tools: ToolRegistry,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/ws/:dialect", get(upgrade)).with_state(state)
}

async fn upgrade(Path(dialect): Path<String>, State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if dialects::by_name(&dialect).is_none() {
        return (StatusCode::NOT_FOUND, format!("unknown wire dialect: {dialect}")).into_response();
    }
    ws.on_upgrade(move |socket| handle_connection(socket, dialect, state))
}

/// Drive one telephony connection end to end: connect the realtime peer,
/// build a [`Bridge`] once the telephony peer identifies the call, and
/// multiplex the two sockets plus the Bridge's outbound queue until either
/// side closes (spec.md §5's per-call event loop).
async fn handle_connection(socket: WebSocket, dialect: String, state: AppState) {
    let Some(decode_codec) = dialects::by_name(&dialect) else {
        return;
    };

    let mut ai = match RealtimePeerClient::connect(&state.ctx.config.realtime_peer_url, &state.ctx.config.realtime_peer_api_key).await
    {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, dialect, "failed to connect to realtime peer");
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundAction>(256);
    let idle_timeout = state.ctx.config.ai_peer_idle_timeout;

    let mut bridge: Option<Arc<Bridge>> = None;

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match decode_codec.decode(&text) {
                            Ok(event) => {
                                if bridge.is_none() {
                                    bridge = try_start_bridge(&event, &dialect, &state, outbound_tx.clone());
                                }
                                match &bridge {
                                    Some(b) => {
                                        if let Err(err) = b.handle_inbound(event, &mut ai, &state.ctx).await {
                                            warn!(error = %err, "inbound event handling failed");
                                        }
                                    }
                                    None => debug!("dropping frame received before session start"),
                                }
                            }
                            Err(err) => warn!(error = %err, "failed to decode telephony frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "telephony socket error");
                        break;
                    }
                }
            }
            event = tokio::time::timeout(idle_timeout, ai.next_event()) => {
                match event {
                    Ok(Some(ai_event)) => {
                        if let Some(b) = &bridge {
                            if let Err(err) = b.handle_ai_event(ai_event, &mut ai, &state.ctx).await {
                                warn!(error = %err, "ai peer event handling failed");
                            }
                        }
                    }
                    Ok(None) => {
                        warn!("realtime peer socket closed");
                        break;
                    }
                    Err(_) => {
                        warn!(?idle_timeout, "realtime peer idle timeout exceeded");
                        break;
                    }
                }
            }
            Some(action) = outbound_rx.recv() => {
                if let Ok(Some(frame)) = decode_codec.encode(&action) {
                    if ws_tx.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    if let Some(b) = bridge {
        let call_id = b.call_id().await;
        state.ctx.registry.unregister(&call_id);
        info!(call_id = %call_id, "telephony connection closed");
    }
}

/// Once the first `SessionStart` arrives, build and register the Bridge
/// for this call. A fresh codec instance is constructed for the Bridge to
/// own (the connection loop keeps its own for decode/encode) — dialect
/// codecs carry no per-connection state, so two instances of the same
/// dialect are interchangeable.
fn try_start_bridge(
    event: &InboundEvent,
    dialect: &str,
    state: &AppState,
    outbound_tx: mpsc::Sender<OutboundAction>,
) -> Option<Arc<Bridge>> {
    let InboundEvent::SessionStart { call_id, caller, bot, .. } = event else {
        return None;
    };

    let bridge_codec: Box<dyn WireCodec> = dialects::by_name(dialect)?;
    let auto_follow = matches!(
        state.ctx.config.default_session.turn_detection,
        voxbridge_realtime_client::TurnDetection::None
    );

    let call = Call::new(CallId::from(call_id.clone()), dialect, caller.clone(), bot.clone());
    let bridge = Arc::new(Bridge::with_tool_timeout(
        call,
        bridge_codec,
        state.tools.clone(),
        outbound_tx,
        auto_follow,
        state.ctx.config.tool_call_timeout,
    ));

    state.ctx.registry.register(CallId::from(call_id.clone()), bridge.clone());
    info!(call_id = %call_id, dialect, "call started");
    Some(bridge)
}
