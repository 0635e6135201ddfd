//! Audio stream buffering, commit-threshold gating and barge-in (C5).
//!
//! There is no direct teacher module for this — it's new domain logic —
//! so it follows the same small-struct-plus-pure-methods shape as
//! [`crate::call::Call`]'s state machine, which the teacher itself uses
//! for small pieces of session bookkeeping.

use std::collections::HashSet;

use voxbridge_wire_codec::AudioFormat;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(pub String);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Minimum buffered audio before the realtime peer's input buffer is
/// committed (spec.md §13's resolved default; configurable via
/// [`crate::context::ServerConfig`]).
pub const DEFAULT_COMMIT_THRESHOLD_MS: u32 = 100;

/// Buffers inbound telephony audio until enough has accumulated to commit
/// to the realtime peer, and tracks whether the caller has started
/// speaking over an in-flight bot response (barge-in).
pub struct InputStream {
    format: AudioFormat,
    buffered: Vec<u8>,
    commit_threshold_ms: u32,
}

impl InputStream {
    pub fn new(format: AudioFormat) -> Self {
        Self { format, buffered: Vec::new(), commit_threshold_ms: DEFAULT_COMMIT_THRESHOLD_MS }
    }

    pub fn with_commit_threshold_ms(format: AudioFormat, commit_threshold_ms: u32) -> Self {
        Self { format, buffered: Vec::new(), commit_threshold_ms }
    }

    /// Append one chunk of raw (decoded) audio bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffered.extend_from_slice(bytes);
    }

    fn buffered_ms(&self) -> u32 {
        let bytes_per_ms = (self.format.sample_rate as usize * self.format.bytes_per_sample()) / 1000;
        if bytes_per_ms == 0 {
            return 0;
        }
        (self.buffered.len() / bytes_per_ms) as u32
    }

    /// Whether enough audio has buffered to justify an
    /// `input_audio_buffer.commit` (spec.md §4.5).
    pub fn ready_to_commit(&self) -> bool {
        !self.buffered.is_empty() && self.buffered_ms() >= self.commit_threshold_ms
    }

    /// Take the buffered bytes, if any, leaving the buffer empty. Returns
    /// `None` for an empty buffer so callers don't commit a silent turn.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        if self.buffered.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffered))
        }
    }

    /// Take the buffered bytes, padding with silence up to
    /// `commit_threshold_ms` first if the buffer is short (spec.md §4.5:
    /// the realtime peer requires a minimum accumulated duration before a
    /// commit will succeed). `None` only if nothing was ever buffered.
    pub fn take_padded(&mut self) -> Option<Vec<u8>> {
        if self.buffered.is_empty() {
            return None;
        }
        let bytes_per_ms = (self.format.sample_rate as usize * self.format.bytes_per_sample()) / 1000;
        let min_bytes = bytes_per_ms * self.commit_threshold_ms as usize;
        if self.buffered.len() < min_bytes {
            self.buffered.resize(min_bytes, 0);
        }
        Some(std::mem::take(&mut self.buffered))
    }

    pub fn clear(&mut self) {
        self.buffered.clear();
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }
}

/// Tracks one outbound (bot-to-caller) audio stream.
pub struct OutputStream {
    pub id: StreamId,
    /// The realtime peer response this stream is playing out
    /// (spec.md §4.5's response-id → stream-id mapping).
    pub response_id: String,
    pub format: AudioFormat,
    active: bool,
}

impl OutputStream {
    pub fn new(id: StreamId, response_id: impl Into<String>, format: AudioFormat) -> Self {
        Self { id, response_id: response_id.into(), format, active: true }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stop(&mut self) {
        self.active = false;
    }
}

/// Coordinates input buffering and output stream lifecycle for one call,
/// including barge-in: when the caller starts talking while a bot response
/// is still playing, any active output streams are stopped and the
/// realtime peer's in-flight response is cancelled (spec.md §4.5's
/// barge-in behavior).
#[derive(Default)]
pub struct AudioStreamManager {
    input: Option<InputStream>,
    outputs: Vec<OutputStream>,
    /// Response-ids cancelled by a barge-in whose trailing audio deltas
    /// must still be discarded (spec.md §4.5's barge-in contract).
    cancelled_responses: HashSet<String>,
}

impl AudioStreamManager {
    pub fn new() -> Self {
        Self { input: None, outputs: Vec::new(), cancelled_responses: HashSet::new() }
    }

    pub fn start_input(&mut self, format: AudioFormat, commit_threshold_ms: u32) {
        self.input = Some(InputStream::with_commit_threshold_ms(format, commit_threshold_ms));
    }

    /// Reset the buffered bytes of the live input stream, leaving its
    /// format and commit threshold untouched (spec.md §4.5: a fresh
    /// `UserStreamStart` opens a new input stream, it doesn't renegotiate
    /// format).
    pub fn reset_input(&mut self) {
        if let Some(input) = self.input.as_mut() {
            input.clear();
        }
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        if let Some(input) = self.input.as_mut() {
            input.push(bytes);
        }
    }

    pub fn input_ready_to_commit(&self) -> bool {
        self.input.as_ref().map(InputStream::ready_to_commit).unwrap_or(false)
    }

    pub fn take_input(&mut self) -> Option<Vec<u8>> {
        self.input.as_mut().and_then(InputStream::take)
    }

    /// Like [`Self::take_input`] but pads short buffers to the commit
    /// threshold first (spec.md §4.5's end-of-utterance flush).
    pub fn take_input_padded(&mut self) -> Option<Vec<u8>> {
        self.input.as_mut().and_then(InputStream::take_padded)
    }

    pub fn stop_input(&mut self) -> Option<Vec<u8>> {
        self.input.take().and_then(|mut s| s.take())
    }

    pub fn add_output(&mut self, id: StreamId, response_id: impl Into<String>, format: AudioFormat) {
        self.outputs.push(OutputStream::new(id, response_id, format));
    }

    pub fn stop_output(&mut self, id: &StreamId) {
        if let Some(stream) = self.outputs.iter_mut().find(|s| &s.id == id) {
            stream.stop();
        }
    }

    pub fn has_active_output(&self) -> bool {
        self.outputs.iter().any(OutputStream::is_active)
    }

    /// Stop every active output stream, returning the ids that were live
    /// (callers emit `StopOutputStream` wire actions for each and cancel
    /// the realtime peer's response). Each stopped stream's response-id is
    /// marked cancelled so late deltas for it are discarded rather than
    /// opening a new stream (spec.md §4.5).
    pub fn barge_in(&mut self) -> Vec<StreamId> {
        let mut stopped = Vec::new();
        for stream in self.outputs.iter_mut().filter(|s| s.is_active()) {
            stopped.push(stream.id.clone());
            self.cancelled_responses.insert(stream.response_id.clone());
            stream.stop();
        }
        stopped
    }

    /// Whether `response_id` was cancelled by a barge-in and its trailing
    /// audio deltas should be dropped.
    pub fn is_response_cancelled(&self, response_id: &str) -> bool {
        self.cancelled_responses.contains(response_id)
    }

    /// Drop the cancellation marker for a response once it's fully done
    /// (spec.md §4.7's `response.done` row: "clean up per-response state").
    pub fn clear_cancelled_response(&mut self, response_id: &str) {
        self.cancelled_responses.remove(response_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_threshold_reached() {
        let mut input = InputStream::new(AudioFormat::LINEAR_16K);
        // 16kHz * 2 bytes/sample = 32 bytes/ms; 50ms worth is below the 100ms default.
        input.push(&vec![0u8; 32 * 50]);
        assert!(!input.ready_to_commit());
        input.push(&vec![0u8; 32 * 60]);
        assert!(input.ready_to_commit());
    }

    #[test]
    fn take_padded_pads_short_buffers_to_the_commit_threshold() {
        let mut input = InputStream::with_commit_threshold_ms(AudioFormat::LINEAR_16K, 100);
        // 16kHz * 2 bytes/sample = 32 bytes/ms; 20ms is well short of 100ms.
        input.push(&vec![1u8; 32 * 20]);
        let padded = input.take_padded().unwrap();
        assert_eq!(padded.len(), 32 * 100);
        assert!(padded[32 * 20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn take_padded_leaves_already_sufficient_buffers_untouched() {
        let mut input = InputStream::with_commit_threshold_ms(AudioFormat::LINEAR_16K, 100);
        input.push(&vec![1u8; 32 * 150]);
        let padded = input.take_padded().unwrap();
        assert_eq!(padded.len(), 32 * 150);
    }

    #[test]
    fn take_empties_buffer_and_returns_none_when_empty() {
        let mut input = InputStream::new(AudioFormat::LINEAR_16K);
        assert!(input.take().is_none());
        input.push(&[1, 2, 3, 4]);
        assert_eq!(input.take(), Some(vec![1, 2, 3, 4]));
        assert!(input.take().is_none());
    }

    #[test]
    fn barge_in_stops_all_active_outputs() {
        let mut mgr = AudioStreamManager::new();
        mgr.add_output(StreamId::from("o1"), "r1", AudioFormat::LINEAR_16K);
        mgr.add_output(StreamId::from("o2"), "r2", AudioFormat::LINEAR_16K);
        assert!(mgr.has_active_output());
        let stopped = mgr.barge_in();
        assert_eq!(stopped.len(), 2);
        assert!(!mgr.has_active_output());
    }

    #[test]
    fn barge_in_on_no_output_is_a_noop() {
        let mut mgr = AudioStreamManager::new();
        assert!(mgr.barge_in().is_empty());
    }
}
