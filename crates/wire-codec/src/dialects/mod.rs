pub mod audiocodes;
pub mod generic;
pub mod twilio;

pub use audiocodes::AudioCodesCodec;
pub use generic::GenericCodec;
pub use twilio::TwilioCodec;

use crate::codec::WireCodec;

/// Look up a dialect by its [`WireCodec::name`], for server endpoint routing
/// (spec.md §6.5 — one listener path per dialect).
pub fn by_name(name: &str) -> Option<Box<dyn WireCodec>> {
    match name {
        "audiocodes" => Some(Box::new(AudioCodesCodec::new())),
        "twilio" => Some(Box::new(TwilioCodec::new())),
        "generic" => Some(Box::new(GenericCodec::new())),
        _ => None,
    }
}
