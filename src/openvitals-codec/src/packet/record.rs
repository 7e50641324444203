use std::fmt;

use chrono::NaiveDateTime;

use crate::DeviceId;

/// One decoded measurement record: everything a collector reports in a
/// single packet, plus the cache-resolved battery and temperature state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorPacket {
    pub device_id: DeviceId,
    pub device_code: u32,
    pub packet_sn: u32,
    /// Device clock, unix milliseconds.
    pub time_ms: u64,
    /// 25 chest respiration samples.
    pub chest_resp: Vec<u16>,
    /// 25 abdominal respiration samples.
    pub abdominal_resp: Vec<u16>,
    /// Four ECG sub-leads concatenated lead-major, 4 x 50 samples.
    pub ecg: Vec<u16>,
    pub accel_x: Vec<u16>,
    pub accel_y: Vec<u16>,
    pub accel_z: Vec<u16>,
    /// 50 SpO2 plethysmogram samples.
    pub spo2_wave: Vec<u16>,
    /// Present only on flow-meter packets (payload type byte 0xF3);
    /// always 25 samples when present.
    pub flow: Option<Vec<FlowSample>>,
    /// Timestamp of the temperature reading, unix milliseconds.
    pub temperature_time_ms: u64,
    pub status: DeviceStatus,
    pub battery_alarms: BatteryAlarms,
    pub switches: Switches,
    pub spo2_signal: u8,
    pub resp_ratio: u8,
    pub abdominal_ratio: u8,
    /// Skin temperature; the ninth bit rides in the status byte.
    pub temperature: u16,
    pub spo2: u8,
    pub batteries: Batteries,
    /// Signal strength as negated dBm, so always <= 0.
    pub wifi_signal: i16,
    /// Pulse rate; the ninth bit rides in the status byte.
    pub pulse_rate: u16,
    pub peer: Peer,
    /// Battery gauge bars shown on the collector display.
    pub battery_grid: u8,
    /// Absent while the version byte reads zero (pre-handshake packets).
    pub firmware: Option<FirmwareVersion>,
}

impl CollectorPacket {
    /// Device clock as a naive UTC timestamp.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        chrono::DateTime::from_timestamp_millis(self.time_ms as i64).map(|dt| dt.naive_utc())
    }
}

/// One spirometer sample: blow/inhale phase, flow velocity in ml/s,
/// accumulated volume in ml.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSample {
    pub breath: u8,
    pub velocity: u16,
    pub volume: u16,
}

/// Connection and lifecycle flags. `true` means disconnected/active alarm,
/// matching the on-wire polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub overload: bool,
    pub chest_resp_disconnected: bool,
    pub abdominal_resp_disconnected: bool,
    pub ecg_lead_off: bool,
    pub spo2_probe_off: bool,
    pub thermometer_disconnected: bool,
    pub oximeter_disconnected: bool,
    pub cuff_disconnected: bool,
    pub flow_meter_disconnected: bool,
    /// Set from boot until the collector receives a set-clock command.
    pub clock_unset: bool,
    /// Set only on the first packet after power-on.
    pub power_on: bool,
}

/// Low-battery alarm bits, one per peripheral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryAlarms {
    pub collector_outer: bool,
    pub thermometer: bool,
    pub oximeter: bool,
    pub cuff: bool,
    pub flow_meter: bool,
}

/// Feature switch bits: notification behaviors and which Bluetooth
/// peripherals are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switches {
    pub bluetooth_blink: bool,
    pub battery_low_blink: bool,
    pub battery_low_vibrate: bool,
    pub peripheral_low_blink: bool,
    pub thermometer: bool,
    pub oximeter: bool,
    pub cuff: bool,
    pub flow_meter: bool,
}

/// Last-known battery percentages, mostly served from the device cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batteries {
    pub collector_inner: Option<u8>,
    pub collector_outer: Option<u8>,
    pub thermometer: Option<u8>,
    pub oximeter: Option<u8>,
    pub cuff: Option<u8>,
    pub flow_meter: Option<u8>,
}

/// The peer block bytes are overloaded: ordinary collectors report the
/// access point MAC there, care-patch devices a temperature sample with
/// its de-dup sequence number. Exactly one variant applies per device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Peer {
    AccessPoint { mac: String },
    CarePatch { sn: u8, temperature: Option<u16> },
}

/// Firmware version packed 3/3/2 bits into a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        if byte == 0 {
            return None;
        }
        Some(Self {
            major: byte >> 5,
            minor: byte >> 2 & 0b111,
            patch: byte & 0b11,
        })
    }

    /// The raw packed byte.
    pub fn code(&self) -> u8 {
        self.major << 5 | self.minor << 2 | self.patch
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
