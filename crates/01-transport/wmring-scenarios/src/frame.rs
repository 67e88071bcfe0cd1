//! Length-prefixed frames the scenarios push through the ring.
//!
//! The ring itself carries opaque bytes; the harness tags every message with
//! a small header so the consumer can split runs back into messages and check
//! them against what the producer sent.
//!
//! ```text
//! [u32 seq LE][u32 payload_len LE][payload ...]
//! ```

use crate::error::{ScenarioError, ScenarioResult};

pub const FRAME_HEADER_LEN: usize = 8;

/// Identity of one message as seen by either side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageDigest {
    pub seq: u32,
    pub len: u32,
    pub checksum: u32,
}

/// FNV-1a over the payload bytes.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811C_9DC5u32, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(0x0100_0193)
    })
}

/// Writes the header and payload into `dst`, which must be exactly
/// `FRAME_HEADER_LEN + payload.len()` bytes.
pub fn encode(dst: &mut [u8], seq: u32, payload: &[u8]) {
    debug_assert_eq!(dst.len(), FRAME_HEADER_LEN + payload.len());
    dst[..4].copy_from_slice(&seq.to_le_bytes());
    dst[4..8].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    dst[FRAME_HEADER_LEN..].copy_from_slice(payload);
}

/// Decodes the frame at the start of `src`, returning its digest and total length.
///
/// `offset` is only used for error reporting.
pub fn decode(src: &[u8], offset: usize) -> ScenarioResult<(MessageDigest, usize)> {
    if src.len() < FRAME_HEADER_LEN {
        return Err(ScenarioError::Corrupt {
            offset,
            reason: "truncated header",
        });
    }
    let seq = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    let len = u32::from_le_bytes([src[4], src[5], src[6], src[7]]);
    let end = FRAME_HEADER_LEN + len as usize;
    if src.len() < end {
        return Err(ScenarioError::Corrupt {
            offset,
            reason: "payload runs past the readable range",
        });
    }
    let digest = MessageDigest {
        seq,
        len,
        checksum: checksum(&src[FRAME_HEADER_LEN..end]),
    };
    Ok((digest, end))
}
