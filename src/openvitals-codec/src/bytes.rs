//! Fixed-width integer <-> byte-sequence conversions shared by the frame
//! and packet decoders.

use crate::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Composes `size` bytes (1..=8) starting at `start` into an unsigned value.
pub fn read_uint(
    data: &[u8],
    start: usize,
    size: usize,
    order: ByteOrder,
) -> Result<u64, CodecError> {
    debug_assert!((1..=8).contains(&size));
    let end = start.checked_add(size).ok_or(CodecError::TruncatedFrame)?;
    let window = data.get(start..end).ok_or(CodecError::TruncatedFrame)?;

    let mut value = 0u64;
    match order {
        ByteOrder::Big => {
            for &byte in window {
                value = value << 8 | u64::from(byte);
            }
        }
        ByteOrder::Little => {
            for &byte in window.iter().rev() {
                value = value << 8 | u64::from(byte);
            }
        }
    }
    Ok(value)
}

/// Like [`read_uint`] but two's-complement: a set sign bit in the
/// most-significant byte yields a negative value.
pub fn read_int(
    data: &[u8],
    start: usize,
    size: usize,
    order: ByteOrder,
) -> Result<i64, CodecError> {
    let value = read_uint(data, start, size, order)?;
    if size == 8 {
        return Ok(value as i64);
    }

    let sign_bit = 1u64 << (size * 8 - 1);
    if value & sign_bit != 0 {
        let mask = !((1u64 << (size * 8)) - 1);
        Ok((value | mask) as i64)
    } else {
        Ok(value as i64)
    }
}

/// Inverse of [`read_uint`], truncating `value` to `size` bytes.
pub fn write_uint(value: u64, size: usize, order: ByteOrder) -> Vec<u8> {
    debug_assert!((1..=8).contains(&size));
    let mut out = vec![0u8; size];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = match order {
            ByteOrder::Big => (size - 1 - i) * 8,
            ByteOrder::Little => i * 8,
        };
        *slot = (value >> shift) as u8;
    }
    out
}

/// Plain buffer-to-buffer copy. Caller guarantees bounds.
pub fn copy_bytes(src: &[u8], src_pos: usize, dst: &mut [u8], dst_pos: usize, len: usize) {
    dst[dst_pos..dst_pos + len].copy_from_slice(&src[src_pos..src_pos + len]);
}

/// Diagnostic rendering: each byte as eight binary digits, `separator`
/// inserted after every `group_every` bytes.
pub fn to_binary_string(
    data: &[u8],
    start: usize,
    size: usize,
    separator: &str,
    group_every: usize,
) -> String {
    let end = usize::min(start + size, data.len());
    let mut out = String::new();
    for (i, &byte) in data[start.min(end)..end].iter().enumerate() {
        if i > 0 && i % group_every.max(1) == 0 {
            out.push_str(separator);
        }
        out.push_str(&format!("{:04b}", byte >> 4));
        out.push_str(&format!("{:04b}", byte & 0x0F));
    }
    out
}
