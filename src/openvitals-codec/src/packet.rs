//! Single-shot packet decoding: fixed field extraction driven by the
//! [`layout`] table, waveform reconstruction, and cache-resolved battery
//! and temperature state.

use crate::{
    CodecError, DeviceId,
    cache::{BatteryKind, DeviceStateCache},
    frame, layout, waveform,
};

mod record;
pub use record::{
    Batteries, BatteryAlarms, CollectorPacket, DeviceStatus, FirmwareVersion, FlowSample, Peer,
    Switches,
};

impl CollectorPacket {
    /// Decodes a packet from either form: a framed UDP datagram (the
    /// 9-byte header is stripped first) or a raw captured block.
    pub fn parse(
        data: &[u8],
        device_id: DeviceId,
        cache: &mut DeviceStateCache,
    ) -> Result<Self, CodecError> {
        let start = if frame::verify(data, 0, false) {
            frame::HEADER_LEN
        } else {
            0
        };
        Self::decode_at(data, start, device_id, cache)
    }

    /// Strict network path: head and length must validate before any field
    /// is extracted, the checksum optionally so. The device id comes from
    /// the frame header itself.
    pub fn parse_frame(
        data: &[u8],
        cache: &mut DeviceStateCache,
        check_checksum: bool,
    ) -> Result<Self, CodecError> {
        if !frame::has_head(data, 0) || !frame::is_length_consistent(data, 0) {
            return Err(CodecError::MalformedFrame);
        }
        if check_checksum && !frame::verify(data, 0, true) {
            return Err(CodecError::ChecksumMismatch);
        }

        let id = data.get(4..8).ok_or(CodecError::TruncatedFrame)?;
        let device_id = DeviceId::from_bytes([id[0], id[1], id[2], id[3]]);
        Self::decode_at(data, frame::HEADER_LEN, device_id, cache)
    }

    /// Decodes the payload beginning at `start`. All fallible reads happen
    /// before the cache commit at the bottom, so a failed decode never
    /// leaves partial state behind.
    fn decode_at(
        data: &[u8],
        start: usize,
        device_id: DeviceId,
        cache: &mut DeviceStateCache,
    ) -> Result<Self, CodecError> {
        let packet_sn = layout::PACKET_SN.uint(data, start)? as u32;
        let time_ms = layout::TIME.uint(data, start)? * 1000;

        let chest_resp = waveform::decode_flat(data, start, &layout::CHEST_RESP)?;
        let abdominal_resp = waveform::decode_flat(data, start, &layout::ABDOMINAL_RESP)?;
        let ecg = waveform::decode_channel(data, start, &layout::ECG)?;
        let accel_x = waveform::decode_channel(data, start, &layout::ACCEL_X)?;
        let accel_y = waveform::decode_channel(data, start, &layout::ACCEL_Y)?;
        let accel_z = waveform::decode_channel(data, start, &layout::ACCEL_Z)?;
        let spo2_wave = waveform::decode_flat(data, start, &layout::SPO2_WAVE)?;

        let flow = if layout::PACKET_TYPE.byte(data, start)? == layout::FLOW_PACKET_TYPE {
            Some(Self::decode_flow(data, start)?)
        } else {
            None
        };

        let temperature_time_ms = layout::TEMPERATURE_TIME.uint(data, start)? * 1000;

        let param_high = layout::PARAM_HIGH.byte(data, start)?;
        let device_state = layout::DEVICE_STATE.byte(data, start)?;
        let battery_hint = layout::BATTERY_HINT.byte(data, start)?;
        let switch_state = layout::SWITCH_STATE.byte(data, start)?;

        let status = DeviceStatus {
            overload: bit(param_high, 5),
            chest_resp_disconnected: bit(param_high, 6),
            abdominal_resp_disconnected: bit(param_high, 7),
            ecg_lead_off: bit(device_state, 0),
            spo2_probe_off: bit(device_state, 1),
            thermometer_disconnected: bit(device_state, 2),
            oximeter_disconnected: bit(device_state, 3),
            cuff_disconnected: bit(device_state, 4),
            flow_meter_disconnected: bit(device_state, 5),
            clock_unset: bit(device_state, 6),
            power_on: bit(device_state, 7),
        };
        let battery_alarms = BatteryAlarms {
            collector_outer: bit(battery_hint, 0),
            thermometer: bit(battery_hint, 1),
            oximeter: bit(battery_hint, 2),
            cuff: bit(battery_hint, 3),
            flow_meter: bit(battery_hint, 4),
        };
        let switches = Switches {
            bluetooth_blink: bit(switch_state, 0),
            battery_low_blink: bit(switch_state, 1),
            battery_low_vibrate: bit(switch_state, 2),
            peripheral_low_blink: bit(switch_state, 3),
            thermometer: bit(switch_state, 4),
            oximeter: bit(switch_state, 5),
            cuff: bit(switch_state, 6),
            flow_meter: bit(switch_state, 7),
        };

        let spo2_signal = layout::SPO2_SIGNAL.byte(data, start)?;
        let resp_ratio = layout::RESP_RATIO.byte(data, start)?;
        let abdominal_ratio = layout::ABDOMINAL_RATIO.byte(data, start)?;
        let temperature = u16::from(param_high >> 2 & 1) << 8
            | u16::from(layout::TEMPERATURE_LOW.byte(data, start)?);
        let spo2 = layout::SPO2.byte(data, start)?;

        let kind_byte = layout::BATTERY_KIND.byte(data, start)?;
        let battery_kind =
            BatteryKind::from_u8(kind_byte).ok_or(CodecError::UnrecognizedBatteryKind(kind_byte))?;
        let battery_raw = layout::BATTERY_RAW.byte(data, start)?;

        let wifi_signal = -i16::from(layout::WIFI_SIGNAL.byte(data, start)?);
        let pulse_rate =
            u16::from(param_high >> 1 & 1) << 8 | u16::from(layout::PULSE_LOW.byte(data, start)?);

        let peer_block = layout::PEER_BLOCK.slice(data, start)?;
        let firmware = FirmwareVersion::from_byte(layout::VERSION.byte(data, start)?);
        let battery_grid = layout::BATTERY_GRID.byte(data, start)?;

        // Every fallible read is behind us; commit to the cache.
        let batteries = cache.observe_battery(device_id, battery_kind, battery_raw);
        let peer = if device_id.is_care_patch() {
            let sn = peer_block[2];
            let reading = u16::from(peer_block[0]) << 8 | u16::from(peer_block[1]);
            Peer::CarePatch {
                sn,
                temperature: cache.observe_temperature(device_id, sn, reading),
            }
        } else {
            Peer::AccessPoint {
                mac: hex::encode(peer_block),
            }
        };

        Ok(Self {
            device_id,
            device_code: device_id.code(),
            packet_sn,
            time_ms,
            chest_resp,
            abdominal_resp,
            ecg,
            accel_x,
            accel_y,
            accel_z,
            spo2_wave,
            flow,
            temperature_time_ms,
            status,
            battery_alarms,
            switches,
            spo2_signal,
            resp_ratio,
            abdominal_ratio,
            temperature,
            spo2,
            batteries,
            wifi_signal,
            pulse_rate,
            peer,
            battery_grid,
            firmware,
        })
    }

    fn decode_flow(data: &[u8], start: usize) -> Result<Vec<FlowSample>, CodecError> {
        let mut samples = Vec::with_capacity(layout::FLOW_SAMPLES);
        let mut at = start + layout::FLOW_START;
        for _ in 0..layout::FLOW_SAMPLES {
            let triple = data
                .get(at..at + layout::FLOW_SAMPLE_LEN)
                .ok_or(CodecError::TruncatedFrame)?;
            samples.push(FlowSample {
                breath: triple[0],
                velocity: u16::from_be_bytes([triple[1], triple[2]]),
                volume: u16::from_be_bytes([triple[3], triple[4]]),
            });
            at += layout::FLOW_SAMPLE_LEN;
        }
        Ok(samples)
    }
}

fn bit(byte: u8, index: u8) -> bool {
    byte >> index & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::build_udp_frame;

    const BLOCK_LEN: usize = 576;

    fn device(hex: &str) -> DeviceId {
        DeviceId::from_hex(hex).unwrap()
    }

    /// A raw captured block with recognizable values in every fixed field.
    fn sample_block() -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_LEN];
        block[0..4].copy_from_slice(&42u32.to_be_bytes());
        block[4..8].copy_from_slice(&1_700_000_000u32.to_be_bytes());

        // chest resp sample 0
        block[10] = 0x01;
        block[11] = 0x02;
        // ECG group 0: first shared byte and first low byte
        block[110] = 0b0011_0111;
        block[123] = 0xAA;
        // accel X sample 0
        block[362] = 0b01;
        block[369] = 0x55;
        // SpO2 pleth sample 0
        block[458] = 0x7E;

        block[508..512].copy_from_slice(&1_700_000_100u32.to_be_bytes());
        block[512] = 0b0110_0110; // pulse/temperature high bits, overload, chest off
        block[513] = 77; // spo2 signal
        block[514] = 11; // chest resp ratio
        block[515] = 12; // abdominal resp ratio
        block[516] = 0x34; // temperature low byte
        block[517] = 98; // spo2
        block[518] = 0b1000_0001; // ecg lead off + power on
        block[519] = 0b0000_0010; // thermometer battery alarm
        block[520] = 0b0001_0000; // thermometer switch
        block[521] = 2; // battery kind: thermometer
        block[522] = 64;
        block[523] = 70; // wifi, reported negated
        block[524] = 0x10; // pulse low byte
        block[525..530].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01]);
        block[530] = 0b0110_0110; // firmware 3.1.2
        block[534] = 4; // battery grid bars
        block
    }

    #[test]
    fn decodes_fixed_fields_from_raw_block() {
        let mut cache = DeviceStateCache::new();
        let packet =
            CollectorPacket::parse(&sample_block(), device("01000403"), &mut cache).unwrap();

        assert_eq!(packet.device_code, 0x01000403);
        assert_eq!(packet.packet_sn, 42);
        assert_eq!(packet.time_ms, 1_700_000_000_000);
        assert_eq!(packet.temperature_time_ms, 1_700_000_100_000);

        assert_eq!(packet.spo2_signal, 77);
        assert_eq!(packet.resp_ratio, 11);
        assert_eq!(packet.abdominal_ratio, 12);
        assert_eq!(packet.temperature, 0x134); // high bit from the status byte
        assert_eq!(packet.spo2, 98);
        assert_eq!(packet.wifi_signal, -70);
        assert_eq!(packet.pulse_rate, 0x110);
        assert_eq!(packet.battery_grid, 4);
        assert_eq!(packet.firmware.unwrap().to_string(), "3.1.2");
        assert_eq!(
            packet.timestamp().unwrap(),
            chrono::DateTime::from_timestamp(1_700_000_000, 0)
                .unwrap()
                .naive_utc()
        );
    }

    #[test]
    fn decodes_waveform_channels() {
        let mut cache = DeviceStateCache::new();
        let packet =
            CollectorPacket::parse(&sample_block(), device("01000403"), &mut cache).unwrap();

        assert_eq!(packet.chest_resp.len(), 25);
        assert_eq!(packet.chest_resp[0], 0x0102);
        assert_eq!(packet.abdominal_resp.len(), 25);
        assert_eq!(packet.ecg.len(), 200);
        assert_eq!(packet.ecg[0], 0x03AA);
        assert_eq!(packet.accel_x.len(), 25);
        assert_eq!(packet.accel_x[0], 0x0155);
        assert_eq!(packet.accel_y.len(), 25);
        assert_eq!(packet.accel_z.len(), 25);
        assert_eq!(packet.spo2_wave.len(), 50);
        assert_eq!(packet.spo2_wave[0], 0x7E);
    }

    #[test]
    fn decodes_status_bits() {
        let mut cache = DeviceStateCache::new();
        let packet =
            CollectorPacket::parse(&sample_block(), device("01000403"), &mut cache).unwrap();

        assert!(packet.status.overload);
        assert!(packet.status.chest_resp_disconnected);
        assert!(!packet.status.abdominal_resp_disconnected);
        assert!(packet.status.ecg_lead_off);
        assert!(packet.status.power_on);
        assert!(!packet.status.clock_unset);

        assert!(packet.battery_alarms.thermometer);
        assert!(!packet.battery_alarms.collector_outer);

        assert!(packet.switches.thermometer);
        assert!(!packet.switches.oximeter);
    }

    #[test]
    fn battery_resolution_via_cache() {
        let mut cache = DeviceStateCache::new();
        let id = device("01000403");

        let packet = CollectorPacket::parse(&sample_block(), id, &mut cache).unwrap();
        assert_eq!(packet.batteries.thermometer, Some(64));
        assert_eq!(packet.batteries.collector_inner, None);

        // a later packet reporting the inner battery keeps the cached value
        let mut block = sample_block();
        block[521] = 0;
        block[522] = 165;
        let packet = CollectorPacket::parse(&block, id, &mut cache).unwrap();
        assert_eq!(packet.batteries.collector_inner, Some(86));
        assert_eq!(packet.batteries.thermometer, Some(64));
    }

    #[test]
    fn unrecognized_battery_kind_aborts() {
        let mut cache = DeviceStateCache::new();
        let mut block = sample_block();
        block[521] = 9;
        let result = CollectorPacket::parse(&block, device("01000403"), &mut cache);
        assert!(matches!(result, Err(CodecError::UnrecognizedBatteryKind(9))));
    }

    #[test]
    fn access_point_devices_report_mac() {
        let mut cache = DeviceStateCache::new();
        let packet =
            CollectorPacket::parse(&sample_block(), device("01000403"), &mut cache).unwrap();
        assert_eq!(
            packet.peer,
            Peer::AccessPoint { mac: "deadbeef01".into() }
        );
    }

    #[test]
    fn care_patch_temperature_dedup() {
        let mut cache = DeviceStateCache::new();
        let id = device("11000001");
        let block = sample_block();

        // first sighting seeds the sequence cache without a reading
        let packet = CollectorPacket::parse(&block, id, &mut cache).unwrap();
        assert_eq!(
            packet.peer,
            Peer::CarePatch { sn: 0xBE, temperature: None }
        );

        // unchanged sequence: still no reading
        let packet = CollectorPacket::parse(&block, id, &mut cache).unwrap();
        assert_eq!(
            packet.peer,
            Peer::CarePatch { sn: 0xBE, temperature: None }
        );

        // changed sequence surfaces the sample (0xDE 0xAD big-endian)
        let mut changed = block.clone();
        changed[527] = 0xBF;
        let packet = CollectorPacket::parse(&changed, id, &mut cache).unwrap();
        assert_eq!(
            packet.peer,
            Peer::CarePatch { sn: 0xBF, temperature: Some(0xDEAD) }
        );
    }

    #[test]
    fn flow_samples_only_on_flow_packets() {
        let mut cache = DeviceStateCache::new();
        let id = device("01000403");

        let packet = CollectorPacket::parse(&sample_block(), id, &mut cache).unwrap();
        assert_eq!(packet.flow, None);

        let mut block = sample_block();
        block.resize(680, 0);
        block[8] = 0xF3;
        block[544] = 1;
        block[545..549].copy_from_slice(&[0x01, 0x10, 0x02, 0x20]);
        block[549] = 0;
        block[550..554].copy_from_slice(&[0x00, 0x55, 0x00, 0x66]);

        let packet = CollectorPacket::parse(&block, id, &mut cache).unwrap();
        let flow = packet.flow.unwrap();
        assert_eq!(flow.len(), 25);
        assert_eq!(
            flow[0],
            FlowSample { breath: 1, velocity: 0x0110, volume: 0x0220 }
        );
        assert_eq!(
            flow[1],
            FlowSample { breath: 0, velocity: 0x55, volume: 0x66 }
        );
    }

    #[test]
    fn flow_packet_shorter_than_flow_block_truncates() {
        let mut cache = DeviceStateCache::new();
        let mut block = sample_block();
        block[8] = 0xF3;
        let result = CollectorPacket::parse(&block, device("01000403"), &mut cache);
        assert!(matches!(result, Err(CodecError::TruncatedFrame)));
    }

    #[test]
    fn udp_frame_roundtrips_to_same_record() {
        let id = device("01000403");
        let block = sample_block();

        let mut block_cache = DeviceStateCache::new();
        let from_block = CollectorPacket::parse(&block, id, &mut block_cache).unwrap();

        let datagram = build_udp_frame(&id, &block, 0, None, None);
        let mut frame_cache = DeviceStateCache::new();
        let from_frame =
            CollectorPacket::parse_frame(&datagram, &mut frame_cache, true).unwrap();

        assert_eq!(from_frame, from_block);
    }

    #[test]
    fn sequence_override_survives_roundtrip() {
        let id = device("01000403");
        let datagram = build_udp_frame(&id, &sample_block(), 0, Some(9001), None);
        let mut cache = DeviceStateCache::new();
        let packet = CollectorPacket::parse_frame(&datagram, &mut cache, true).unwrap();
        assert_eq!(packet.packet_sn, 9001);
    }

    #[test]
    fn malformed_frame_blocks_extraction() {
        let mut cache = DeviceStateCache::new();
        let result = CollectorPacket::parse_frame(&[0u8; 545], &mut cache, false);
        assert!(matches!(result, Err(CodecError::MalformedFrame)));

        // correct head, inconsistent length
        let mut data = vec![0u8; 100];
        data[0] = 0x55;
        data[1] = 0xAA;
        data[2] = 0x02;
        data[3] = 0x1F;
        let result = CollectorPacket::parse_frame(&data, &mut cache, false);
        assert!(matches!(result, Err(CodecError::MalformedFrame)));
    }

    #[test]
    fn checksum_mismatch_is_optional() {
        let id = device("01000403");
        let mut datagram = build_udp_frame(&id, &sample_block(), 0, None, None);
        datagram[100] ^= 0xFF;

        let mut cache = DeviceStateCache::new();
        let result = CollectorPacket::parse_frame(&datagram, &mut cache, true);
        assert!(matches!(result, Err(CodecError::ChecksumMismatch)));

        // pre-trusted transport skips the check and decodes
        let result = CollectorPacket::parse_frame(&datagram, &mut cache, false);
        assert!(result.is_ok());
    }

    #[test]
    fn truncated_block_leaves_cache_unmodified() {
        let mut cache = DeviceStateCache::new();
        let id = device("01000403");

        // cut after the battery bytes but before the battery grid field
        let mut short = sample_block();
        short.truncate(533);
        let result = CollectorPacket::parse(&short, id, &mut cache);
        assert!(matches!(result, Err(CodecError::TruncatedFrame)));
        assert!(cache.is_empty());

        // the next good packet starts from clean state
        let packet = CollectorPacket::parse(&sample_block(), id, &mut cache).unwrap();
        assert_eq!(packet.batteries.thermometer, Some(64));
        assert_eq!(packet.batteries.collector_inner, None);
    }

    #[test]
    fn record_serializes_to_json() {
        let mut cache = DeviceStateCache::new();
        let packet =
            CollectorPacket::parse(&sample_block(), device("01000403"), &mut cache).unwrap();
        let json = serde_json::to_string(&packet).unwrap();
        assert!(json.contains("\"device_id\":\"01000403\""));
        assert!(json.contains("\"AccessPoint\""));
    }
}
