//! Transport framing: 0x55AA head recognition, declared-length and additive
//! checksum validation, and the reverse path that wraps a captured block
//! into a transmittable UDP datagram.

use crate::{
    DeviceId,
    bytes::{self, ByteOrder},
};

pub const FRAME_HEAD: [u8; 2] = [0x55, 0xAA];
/// Full UDP datagram: 9-byte header + up to 535 payload bytes + checksum.
pub const UDP_FRAME_LEN: usize = 545;
/// Value of the length field: everything after the 2-byte head.
pub const DECLARED_LEN: u16 = 543;
/// Head + length + device id + type, stripped before payload decode.
pub const HEADER_LEN: usize = 9;
pub const MAX_PAYLOAD_LEN: usize = 535;

const FRAME_TYPE: u8 = 0x03;

pub fn has_head(data: &[u8], start: usize) -> bool {
    match data.get(start..start + 2) {
        Some(head) => head == FRAME_HEAD,
        None => false,
    }
}

/// Declared payload length, u16 BE at `start + 2`.
pub fn declared_length(data: &[u8], start: usize) -> Option<u16> {
    let window = data.get(start + 2..start + 4)?;
    Some(u16::from_be_bytes([window[0], window[1]]))
}

pub fn is_length_consistent(data: &[u8], start: usize) -> bool {
    match declared_length(data, start) {
        Some(declared) => 2 + usize::from(declared) == data.len() - start,
        None => false,
    }
}

/// Additive checksum, mod 256, over `[start, min(start + 544, len - 1))`.
/// The window is capped at one byte short of a full datagram so the
/// trailing checksum byte never sums itself.
pub fn checksum(data: &[u8], start: usize) -> u8 {
    let end = usize::min(start + UDP_FRAME_LEN - 1, data.len().saturating_sub(1));
    data.get(start..end)
        .map(|window| window.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)))
        .unwrap_or(0)
}

/// Head, length, and (optionally) checksum validation. A `false` result
/// means the buffer must not be field-extracted as a framed datagram.
pub fn verify(data: &[u8], start: usize, check_sum: bool) -> bool {
    if check_sum {
        let index = usize::min(start + UDP_FRAME_LEN - 1, data.len().saturating_sub(1));
        match data.get(index) {
            Some(&trailing) if checksum(data, start) == trailing => {}
            _ => return false,
        }
    }

    has_head(data, start) && is_length_consistent(data, start)
}

/// Wraps up to 535 bytes of a captured block into a 545-byte UDP datagram,
/// optionally overwriting the sequence number and device timestamp fields
/// inside the copied payload, and appends the checksum.
pub fn build_udp_frame(
    device_id: &DeviceId,
    block: &[u8],
    start: usize,
    sequence: Option<u32>,
    timestamp_ms: Option<u64>,
) -> Vec<u8> {
    let mut frame = vec![0u8; UDP_FRAME_LEN];
    frame[..2].copy_from_slice(&FRAME_HEAD);
    frame[2..4].copy_from_slice(&DECLARED_LEN.to_be_bytes());
    frame[4..8].copy_from_slice(device_id.as_bytes());
    frame[8] = FRAME_TYPE;

    let len = usize::min(MAX_PAYLOAD_LEN, block.len().saturating_sub(start));
    bytes::copy_bytes(block, start, &mut frame, HEADER_LEN, len);

    if let Some(sn) = sequence {
        let sn = bytes::write_uint(u64::from(sn), 4, ByteOrder::Big);
        bytes::copy_bytes(&sn, 0, &mut frame, 9, 4);
    }
    if let Some(ms) = timestamp_ms {
        let seconds = bytes::write_uint(ms / 1000, 4, ByteOrder::Big);
        bytes::copy_bytes(&seconds, 0, &mut frame, 13, 4);
    }

    frame[UDP_FRAME_LEN - 1] = checksum(&frame, 0);
    frame
}
