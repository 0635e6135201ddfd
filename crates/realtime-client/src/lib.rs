//! Typed client for the realtime AI peer's bidirectional event-stream
//! socket (C3). Owns session configuration and the AI-peer event
//! vocabulary; knows nothing about telephony framing or call state.

pub mod client;
pub mod error;
pub mod events;
pub mod session;

pub use client::{AiPeer, RealtimePeerClient};
pub use error::{ClientError, ConfigError, Result};
pub use events::{AiEvent, ClientMessage, ErrorSeverity};
pub use session::{SessionConfig, ToolChoice, ToolSpec, TurnDetection};
