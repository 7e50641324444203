//! Payload-relative offsets and widths for every field of a collector
//! packet, in one place. The decoder walks this table instead of
//! scattering literal offsets.
//!
//! All offsets are relative to the payload start: byte 0 of a raw captured
//! block, byte 9 of a framed UDP datagram.

use crate::{
    CodecError,
    bytes::{self, ByteOrder},
};

/// A scalar field: payload-relative offset plus width in bytes.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub offset: usize,
    pub width: usize,
}

impl Field {
    pub(crate) fn byte(&self, data: &[u8], start: usize) -> Result<u8, CodecError> {
        data.get(start + self.offset)
            .copied()
            .ok_or(CodecError::TruncatedFrame)
    }

    pub(crate) fn uint(&self, data: &[u8], start: usize) -> Result<u64, CodecError> {
        bytes::read_uint(data, start + self.offset, self.width, ByteOrder::Big)
    }

    pub(crate) fn slice<'a>(&self, data: &'a [u8], start: usize) -> Result<&'a [u8], CodecError> {
        data.get(start + self.offset..start + self.offset + self.width)
            .ok_or(CodecError::TruncatedFrame)
    }
}

/// A bit-packed waveform channel: `groups` runs of `high_len` shared
/// high-bit bytes followed by `samples_per_group` low bytes.
#[derive(Debug, Clone, Copy)]
pub struct ChannelLayout {
    pub offset: usize,
    pub groups: usize,
    pub samples_per_group: usize,
    pub high_len: usize,
}

/// A flat sample run: `[start, end)` at `width` bytes per sample, big-endian.
#[derive(Debug, Clone, Copy)]
pub struct FlatLayout {
    pub start: usize,
    pub end: usize,
    pub width: usize,
}

pub const PACKET_SN: Field = Field { offset: 0, width: 4 };
pub const TIME: Field = Field { offset: 4, width: 4 };
/// Defined as the first byte of a 2-byte sub-second extension of TIME;
/// flow-meter firmwares mark their packets with 0xF3 here.
pub const PACKET_TYPE: Field = Field { offset: 8, width: 1 };

pub const CHEST_RESP: FlatLayout = FlatLayout { start: 10, end: 60, width: 2 };
pub const ABDOMINAL_RESP: FlatLayout = FlatLayout { start: 60, end: 110, width: 2 };
pub const ECG: ChannelLayout = ChannelLayout {
    offset: 110,
    groups: 4,
    samples_per_group: 50,
    high_len: 13,
};
pub const ACCEL_X: ChannelLayout = ChannelLayout {
    offset: 362,
    groups: 1,
    samples_per_group: 25,
    high_len: 7,
};
pub const ACCEL_Y: ChannelLayout = ChannelLayout {
    offset: 394,
    groups: 1,
    samples_per_group: 25,
    high_len: 7,
};
pub const ACCEL_Z: ChannelLayout = ChannelLayout {
    offset: 426,
    groups: 1,
    samples_per_group: 25,
    high_len: 7,
};
pub const SPO2_WAVE: FlatLayout = FlatLayout { start: 458, end: 508, width: 1 };

pub const TEMPERATURE_TIME: Field = Field { offset: 508, width: 4 };
/// High-bit extensions for temperature (bit 2) and pulse rate (bit 1),
/// plus overload and respiration connection flags (bits 5..=7).
pub const PARAM_HIGH: Field = Field { offset: 512, width: 1 };
pub const SPO2_SIGNAL: Field = Field { offset: 513, width: 1 };
pub const RESP_RATIO: Field = Field { offset: 514, width: 1 };
pub const ABDOMINAL_RATIO: Field = Field { offset: 515, width: 1 };
pub const TEMPERATURE_LOW: Field = Field { offset: 516, width: 1 };
pub const SPO2: Field = Field { offset: 517, width: 1 };
pub const DEVICE_STATE: Field = Field { offset: 518, width: 1 };
pub const BATTERY_HINT: Field = Field { offset: 519, width: 1 };
pub const SWITCH_STATE: Field = Field { offset: 520, width: 1 };
pub const BATTERY_KIND: Field = Field { offset: 521, width: 1 };
pub const BATTERY_RAW: Field = Field { offset: 522, width: 1 };
pub const WIFI_SIGNAL: Field = Field { offset: 523, width: 1 };
pub const PULSE_LOW: Field = Field { offset: 524, width: 1 };
/// Access point MAC, or the care-patch temperature sample on
/// "11"-prefixed devices.
pub const PEER_BLOCK: Field = Field { offset: 525, width: 5 };
pub const VERSION: Field = Field { offset: 530, width: 1 };
pub const BATTERY_GRID: Field = Field { offset: 534, width: 1 };

pub const FLOW_START: usize = 544;
pub const FLOW_SAMPLES: usize = 25;
pub const FLOW_SAMPLE_LEN: usize = 5;
pub const FLOW_PACKET_TYPE: u8 = 0xF3;
