//! Binary diff frames: bincode payload with optional run-length packing
//!
//! Frame layout: one format byte, then the payload.
//! `FORMAT_RAW` carries the bincode bytes as-is, `FORMAT_RLE` carries them
//! run-length encoded. The encoder picks whichever is smaller.

use bytes::{BufMut, Bytes, BytesMut};

use super::diff::StateDiff;

pub const FORMAT_RAW: u8 = 0;
pub const FORMAT_RLE: u8 = 1;

/// Shortest run worth encoding as a repeat
const MIN_RUN: usize = 3;
/// Longest repeat a single control byte can describe
const MAX_RUN: usize = 0x7f + MIN_RUN;
/// Longest literal block a single control byte can describe
const MAX_LITERAL: usize = 0x80;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode diff: {0}")]
    Serialize(bincode::Error),

    #[error("failed to decode diff: {0}")]
    Deserialize(bincode::Error),

    #[error("frame ended mid-block")]
    Truncated,

    #[error("unknown frame format {0}")]
    UnknownFormat(u8),
}

/// Sizes of one encoded frame, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub raw_len: usize,
    pub wire_len: usize,
    pub format: u8,
}

/// Serialize a diff into a wire frame
pub fn encode_diff(diff: &StateDiff) -> Result<(Bytes, FrameStats), CodecError> {
    let raw = bincode::serialize(diff).map_err(CodecError::Serialize)?;
    let packed = rle_encode(&raw);

    let (format, payload) = if packed.len() < raw.len() {
        (FORMAT_RLE, packed.as_slice())
    } else {
        (FORMAT_RAW, raw.as_slice())
    };

    let mut frame = BytesMut::with_capacity(payload.len() + 1);
    frame.put_u8(format);
    frame.put_slice(payload);

    let stats = FrameStats {
        raw_len: raw.len(),
        wire_len: frame.len(),
        format,
    };
    Ok((frame.freeze(), stats))
}

pub fn decode_diff(frame: &[u8]) -> Result<StateDiff, CodecError> {
    let (&format, payload) = frame.split_first().ok_or(CodecError::Truncated)?;
    let raw = match format {
        FORMAT_RAW => payload.to_vec(),
        FORMAT_RLE => rle_decode(payload)?,
        other => return Err(CodecError::UnknownFormat(other)),
    };
    bincode::deserialize(&raw).map_err(CodecError::Deserialize)
}

/// Run-length encode `input`.
///
/// Control byte `c < 0x80`: the next `c + 1` bytes are literals.
/// Control byte `c >= 0x80`: the next byte repeats `c - 0x80 + 3` times.
pub fn rle_encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() / 2 + 8);
    let mut literal_start = 0;
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        let mut run = 1;
        while i + run < input.len() && input[i + run] == byte && run < MAX_RUN {
            run += 1;
        }

        if run >= MIN_RUN {
            push_literals(&mut out, &input[literal_start..i]);
            out.push(0x80 + (run - MIN_RUN) as u8);
            out.push(byte);
            literal_start = i + run;
        }
        i += run;
    }
    push_literals(&mut out, &input[literal_start..]);
    out
}

fn push_literals(out: &mut Vec<u8>, literals: &[u8]) {
    for block in literals.chunks(MAX_LITERAL) {
        out.push((block.len() - 1) as u8);
        out.extend_from_slice(block);
    }
}

pub fn rle_decode(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut i = 0;

    while i < input.len() {
        let control = input[i];
        i += 1;
        if control < 0x80 {
            let end = i + control as usize + 1;
            let block = input.get(i..end).ok_or(CodecError::Truncated)?;
            out.extend_from_slice(block);
            i = end;
        } else {
            let byte = *input.get(i).ok_or(CodecError::Truncated)?;
            i += 1;
            let count = (control - 0x80) as usize + MIN_RUN;
            out.resize(out.len() + count, byte);
        }
    }
    Ok(out)
}
