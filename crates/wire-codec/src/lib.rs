//! Telephony wire-protocol framing for the realtime voice bridge.
//!
//! This crate knows nothing about audio encodings beyond [`AudioFormat`], the
//! realtime AI peer, or call state. It only turns raw frames from a
//! telephony-facing socket into the closed [`InboundEvent`] vocabulary, and
//! the bridge's [`OutboundAction`]s back into frames.

pub mod codec;
pub mod dialects;
pub mod error;
pub mod event;
pub mod format;

pub use codec::WireCodec;
pub use error::{CodecError, Result};
pub use event::{InboundEvent, OutboundAction};
pub use format::{negotiate_format, AudioEncoding, AudioFormat};
