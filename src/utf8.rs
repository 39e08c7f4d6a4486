//! UTF-16 to UTF-8 straight into the frame buffer.
//!
//! Long inputs go through a word-at-a-time path: eight code units are packed into a
//! `u64` and, when all of them are ASCII, stored with a single write. Any block holding
//! a non-ASCII unit is re-encoded one code point at a time. Short inputs (and the tail
//! of long ones) are batched through a small scratch array so the buffer sees one
//! bounds check per batch instead of one per unit.

use crate::buffer::FrameBuffer;
use crate::error::Overflow;

/// Inputs shorter than this many units take the scratch-array path.
pub(crate) const UTF8_BUFFER_SIZE: usize = 8;

/// Scratch capacity: every unit encodes to at most four bytes.
pub(crate) const SCRATCH_SIZE: usize = UTF8_BUFFER_SIZE * 4;

const REPLACEMENT: u8 = b'?';
const ASCII_MASK: u64 = 0x8080_8080_8080_8080;

#[inline]
fn is_high_surrogate(u: u16) -> bool {
    (0xD800..=0xDBFF).contains(&u)
}

#[inline]
fn is_low_surrogate(u: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&u)
}

/// Encode the code point starting at `units[*i]` into `dst`, advance `*i` past it and
/// return the number of bytes produced.
#[inline]
fn encode_code_point(units: &[u16], i: &mut usize, dst: &mut [u8; 4]) -> usize {
    let c = units[*i];
    *i += 1;
    if c < 0x80 {
        dst[0] = c as u8;
        1
    } else if c < 0x800 {
        dst[0] = 0xC0 | (c >> 6) as u8;
        dst[1] = 0x80 | (c & 0x3F) as u8;
        2
    } else if is_high_surrogate(c) {
        match units.get(*i) {
            Some(&next) if is_low_surrogate(next) => {
                *i += 1;
                let cp = 0x10000 + (((u32::from(c) - 0xD800) << 10) | (u32::from(next) - 0xDC00));
                dst[0] = 0xF0 | (cp >> 18) as u8;
                dst[1] = 0x80 | ((cp >> 12) & 0x3F) as u8;
                dst[2] = 0x80 | ((cp >> 6) & 0x3F) as u8;
                dst[3] = 0x80 | (cp & 0x3F) as u8;
                4
            }
            // unpaired: the following unit is encoded on its own
            _ => {
                dst[0] = REPLACEMENT;
                1
            }
        }
    } else if is_low_surrogate(c) {
        dst[0] = REPLACEMENT;
        1
    } else {
        dst[0] = 0xE0 | (c >> 12) as u8;
        dst[1] = 0x80 | ((c >> 6) & 0x3F) as u8;
        dst[2] = 0x80 | (c & 0x3F) as u8;
        3
    }
}

/// Pack eight units into a big-endian word if every one of them is ASCII.
#[inline(always)]
fn ascii_word(block: &[u16]) -> Option<u64> {
    let mut word = 0u64;
    let mut wide = 0u16;
    for &c in block {
        word = (word << 8) | u64::from(c as u8);
        wide |= c >> 8;
    }
    if wide == 0 && word & ASCII_MASK == 0 {
        Some(word)
    } else {
        None
    }
}

/// Encode `units` into `out`, returning the number of bytes written.
pub(crate) fn encode(
    units: &[u16],
    out: &mut FrameBuffer,
    scratch: &mut [u8; SCRATCH_SIZE],
) -> Result<usize, Overflow> {
    if units.len() < UTF8_BUFFER_SIZE {
        encode_via_array(units, out, scratch)
    } else {
        encode_swar(units, out, scratch)
    }
}

/// Batch code points through `scratch`, copying each full batch into `out`.
pub(crate) fn encode_via_array(
    units: &[u16],
    out: &mut FrameBuffer,
    scratch: &mut [u8; SCRATCH_SIZE],
) -> Result<usize, Overflow> {
    let mut i = 0;
    let mut written = 0;
    let mut cp = [0u8; 4];
    while i < units.len() {
        let mut n = 0;
        while i < units.len() && n + 4 <= SCRATCH_SIZE {
            let len = encode_code_point(units, &mut i, &mut cp);
            scratch[n..n + len].copy_from_slice(&cp[..len]);
            n += len;
        }
        out.put_slice(&scratch[..n])?;
        written += n;
    }
    Ok(written)
}

/// Word-at-a-time encoding with a per-code-point fallback for non-ASCII blocks.
pub(crate) fn encode_swar(
    units: &[u16],
    out: &mut FrameBuffer,
    scratch: &mut [u8; SCRATCH_SIZE],
) -> Result<usize, Overflow> {
    let mut i = 0;
    let mut written = 0;
    let mut cp = [0u8; 4];
    while i + 8 <= units.len() {
        if let Some(word) = ascii_word(&units[i..i + 8]) {
            out.put_u64(word)?;
            written += 8;
            i += 8;
        } else {
            // a surrogate pair may carry i one past the block end
            let end = i + 8;
            while i < end {
                let len = encode_code_point(units, &mut i, &mut cp);
                out.put_slice(&cp[..len])?;
                written += len;
            }
        }
    }
    if i < units.len() {
        written += encode_via_array(&units[i..], out, scratch)?;
    }
    Ok(written)
}

/// Exact UTF-8 length of `units` under the same replacement rules.
#[cfg(test)]
pub(crate) fn encoded_len(units: &[u16]) -> usize {
    let mut i = 0;
    let mut n = 0;
    let mut cp = [0u8; 4];
    while i < units.len() {
        n += encode_code_point(units, &mut i, &mut cp);
    }
    n
}
