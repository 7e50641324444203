//! Waveform sample reconstruction.
//!
//! Bit-packed channels store each group as a run of shared "high" bytes
//! followed by a run of full "low" bytes. One shared byte carries the
//! 2-bit high part of four consecutive samples, least-significant pair
//! first: sample `i` of a group takes bits `2*(i % 4)..2*(i % 4)+2` of
//! shared byte `i / 4`, and its low byte sits `high_len + i` into the
//! group. The sample value is `high << 8 | low`.

use crate::{
    CodecError,
    layout::{ChannelLayout, FlatLayout},
};

/// Decodes a bit-packed channel, group-major then sample-minor.
pub fn decode_channel(
    data: &[u8],
    start: usize,
    layout: &ChannelLayout,
) -> Result<Vec<u16>, CodecError> {
    let group_len = layout.samples_per_group + layout.high_len;
    let end = start + layout.offset + layout.groups * group_len;
    if end > data.len() {
        return Err(CodecError::TruncatedFrame);
    }

    let mut samples = Vec::with_capacity(layout.groups * layout.samples_per_group);
    for group in 0..layout.groups {
        let base = start + layout.offset + group * group_len;
        for i in 0..layout.samples_per_group {
            let high = data[base + i / 4] >> (2 * (i % 4)) & 0b11;
            let low = data[base + layout.high_len + i];
            samples.push(u16::from(high) << 8 | u16::from(low));
        }
    }
    Ok(samples)
}

/// Decodes a flat sample run; 2-byte samples are big-endian.
pub fn decode_flat(data: &[u8], start: usize, layout: &FlatLayout) -> Result<Vec<u16>, CodecError> {
    let end = start + layout.end;
    if end > data.len() {
        return Err(CodecError::TruncatedFrame);
    }

    let mut samples = Vec::with_capacity((layout.end - layout.start) / layout.width);
    let mut at = start + layout.start;
    while at + layout.width <= end {
        let value = match layout.width {
            1 => u16::from(data[at]),
            _ => u16::from_be_bytes([data[at], data[at + 1]]),
        };
        samples.push(value);
        at += layout.width;
    }
    Ok(samples)
}
