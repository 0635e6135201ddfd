//! Audio format negotiation types shared by every wire codec.

use serde::{Deserialize, Serialize};

/// Sample encoding a peer may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioEncoding {
    /// 16-bit signed little-endian linear PCM.
    LinearPcm16,
    /// ITU G.711 μ-law.
    MuLaw,
}

/// One (encoding, sample rate, channel count) triple a peer can use.
///
/// Channels is always 1 for this bridge (spec.md §3) but is kept explicit
/// rather than assumed, matching the wire formats that carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u8,
}

impl AudioFormat {
    pub const fn new(encoding: AudioEncoding, sample_rate: u32) -> Self {
        Self { encoding, sample_rate, channels: 1 }
    }

    pub const LINEAR_8K: Self = Self::new(AudioEncoding::LinearPcm16, 8000);
    pub const LINEAR_16K: Self = Self::new(AudioEncoding::LinearPcm16, 16000);
    pub const LINEAR_24K: Self = Self::new(AudioEncoding::LinearPcm16, 24000);
    pub const MULAW_8K: Self = Self::new(AudioEncoding::MuLaw, 8000);

    /// The formats the bridge advertises to telephony peers (spec.md §6.3).
    pub const ALL_SUPPORTED: [Self; 4] =
        [Self::LINEAR_8K, Self::LINEAR_16K, Self::LINEAR_24K, Self::MULAW_8K];

    /// Bytes per sample for this encoding.
    pub fn bytes_per_sample(&self) -> usize {
        match self.encoding {
            AudioEncoding::LinearPcm16 => 2,
            AudioEncoding::MuLaw => 1,
        }
    }

    /// Parse a dialect's free-form encoding name (`raw/lpcm16`, `audio/x-mulaw`, …).
    pub fn from_wire_name(name: &str, sample_rate: u32) -> Option<Self> {
        let encoding = match name {
            "raw/lpcm16" | "audio/l16" | "linear16" | "lpcm16" => AudioEncoding::LinearPcm16,
            "audio/x-mulaw" | "audio/x-mulaw;rate=8000" | "mulaw" | "pcmu" => AudioEncoding::MuLaw,
            _ => return None,
        };
        Some(Self { encoding, sample_rate, channels: 1 })
    }

    /// The dialect-facing wire name for this format (inverse of [`Self::from_wire_name`]).
    pub fn wire_name(&self) -> &'static str {
        match self.encoding {
            AudioEncoding::LinearPcm16 => "raw/lpcm16",
            AudioEncoding::MuLaw => "audio/x-mulaw",
        }
    }
}

/// Select the best shared format: highest sample rate in `peer_formats` that
/// is also AI-peer-supported, per spec.md §6.3's selection rule. `None` if
/// the intersection is empty — callers must reject the session in that case.
pub fn negotiate_format(peer_formats: &[AudioFormat], ai_peer_formats: &[AudioFormat]) -> Option<AudioFormat> {
    let mut shared: Vec<AudioFormat> = peer_formats
        .iter()
        .copied()
        .filter(|f| ai_peer_formats.contains(f))
        .collect();
    shared.sort_by(|a, b| b.sample_rate.cmp(&a.sample_rate));
    shared.into_iter().next()
}
