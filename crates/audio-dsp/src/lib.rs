//! PCM16 <-> mu-law companding and sample-rate conversion.
//!
//! Pure functions over byte buffers; no audio format or call-state
//! concepts leak in here. [`voxbridge_wire_codec::AudioFormat`] and the
//! bridge's stream manager are the callers that know which buffers need
//! which conversion.

pub mod error;
pub mod mulaw;
pub mod resample;

pub use error::{AudioFormatError, Result};
pub use mulaw::{decode_buffer as mulaw_decode_buffer, encode_buffer as mulaw_encode_buffer, linear_to_mulaw, mulaw_to_linear};
pub use resample::resample_linear;
