use thiserror::Error;

/// Failures raised while reframing audio between peers.
#[derive(Debug, Error)]
pub enum AudioFormatError {
    #[error("buffer length {len} is not a multiple of the sample width {width}")]
    UnalignedBuffer { len: usize, width: usize },

    #[error("unsupported sample rate conversion: {from}Hz -> {to}Hz")]
    UnsupportedRate { from: u32, to: u32 },

    #[error("empty sample buffer")]
    EmptyBuffer,
}

pub type Result<T> = std::result::Result<T, AudioFormatError>;
