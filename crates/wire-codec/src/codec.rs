use crate::error::Result;
use crate::event::{InboundEvent, OutboundAction};
use crate::format::AudioFormat;

/// One wire protocol a telephony peer may speak.
///
/// Each dialect (AudioCodes-style, Twilio-style, …) implements this trait
/// once; the bridge (C7) never special-cases a dialect by name — it only
/// calls through this interface (spec.md §4.1).
pub trait WireCodec: Send + Sync {
    /// Human-readable dialect name, used in logs and endpoint routing.
    fn name(&self) -> &'static str;

    /// Parse one raw wire frame into a dialect-agnostic event.
    fn decode(&self, frame: &str) -> Result<InboundEvent>;

    /// Render an internal action as a dialect frame. `Ok(None)` means this
    /// dialect has no wire representation for the action (e.g. Twilio has
    /// no explicit session-accept frame) and the caller should simply
    /// proceed without writing anything.
    fn encode(&self, action: &OutboundAction) -> Result<Option<String>>;

    /// Largest raw (pre-base64) chunk this dialect accepts in one outbound
    /// frame. C5 splits `OutputChunk` payloads that exceed this.
    fn max_chunk_bytes(&self) -> usize;

    /// The audio format this dialect requires on inbound user audio.
    fn required_inbound_format(&self) -> AudioFormat;

    /// The audio format this dialect prefers for outbound bot audio.
    fn preferred_outbound_format(&self) -> AudioFormat;

    /// Whether this dialect sends explicit `userStream.start`/`.stop`
    /// framing around an utterance. When `false` (e.g. Twilio Media
    /// Streams, which streams audio continuously once the call starts),
    /// the router synthesizes the user-stream start/stop transitions from
    /// the call's own start/stop lifecycle instead (spec.md §4.5's input
    /// contract still applies — only the trigger differs).
    fn has_explicit_user_stream_events(&self) -> bool {
        true
    }
}
