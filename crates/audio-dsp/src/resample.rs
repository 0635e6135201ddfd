//! Linear-interpolation sample-rate conversion (spec.md §4.2).
//!
//! No teacher module covers resampling directly, so this is written fresh
//! in the same pure-function, exhaustively-tested style as [`crate::mulaw`]:
//! small standalone functions operating on byte buffers, no hidden state.

use crate::error::{AudioFormatError, Result};

/// Resample a linear PCM16 (little-endian) buffer from `from_hz` to `to_hz`.
///
/// Uses linear interpolation between neighboring samples; exact for
/// rate-preserving calls (`from_hz == to_hz`, which returns a copy).
pub fn resample_linear(pcm: &[u8], from_hz: u32, to_hz: u32) -> Result<Vec<u8>> {
    if pcm.len() % 2 != 0 {
        return Err(AudioFormatError::UnalignedBuffer { len: pcm.len(), width: 2 });
    }
    if from_hz == 0 || to_hz == 0 {
        return Err(AudioFormatError::UnsupportedRate { from: from_hz, to: to_hz });
    }
    if from_hz == to_hz {
        return Ok(pcm.to_vec());
    }

    let input: Vec<i16> = pcm.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let out_len = ((input.len() as u64 * to_hz as u64) / from_hz as u64).max(1) as usize;
    let mut out = Vec::with_capacity(out_len * 2);
    let step = from_hz as f64 / to_hz as f64;

    for i in 0..out_len {
        let src_pos = i as f64 * step;
        let idx = src_pos.floor() as usize;
        let frac = src_pos - idx as f64;

        let a = input[idx.min(input.len() - 1)] as f64;
        let b = input[(idx + 1).min(input.len() - 1)] as f64;
        let interpolated = a + (b - a) * frac;

        out.extend_from_slice(&(interpolated.round() as i16).to_le_bytes());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_rate_is_passthrough() {
        let pcm = vec![1, 2, 3, 4, 5, 6];
        assert_eq!(resample_linear(&pcm, 8000, 8000).unwrap(), pcm);
    }

    #[test]
    fn upsample_doubles_sample_count() {
        let pcm: Vec<u8> = [0i16, 100, 200, 300].iter().flat_map(|s| s.to_le_bytes()).collect();
        let out = resample_linear(&pcm, 8000, 16000).unwrap();
        assert_eq!(out.len() / 2, 8);
    }

    #[test]
    fn downsample_halves_sample_count() {
        let pcm: Vec<u8> = [0i16, 100, 200, 300, 400, 500, 600, 700].iter().flat_map(|s| s.to_le_bytes()).collect();
        let out = resample_linear(&pcm, 16000, 8000).unwrap();
        assert_eq!(out.len() / 2, 4);
    }

    #[test]
    fn constant_signal_is_preserved_under_resampling() {
        let pcm: Vec<u8> = std::iter::repeat(1000i16).take(100).flat_map(|s| s.to_le_bytes()).collect();
        let out = resample_linear(&pcm, 8000, 24000).unwrap();
        for chunk in out.chunks_exact(2) {
            assert_eq!(i16::from_le_bytes([chunk[0], chunk[1]]), 1000);
        }
    }

    #[test]
    fn rejects_zero_rate() {
        assert!(matches!(
            resample_linear(&[0, 0], 0, 8000),
            Err(AudioFormatError::UnsupportedRate { .. })
        ));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(resample_linear(&[], 8000, 16000).unwrap(), Vec::<u8>::new());
    }
}
