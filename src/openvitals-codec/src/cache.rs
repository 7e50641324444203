//! Per-device decoder state: battery calibration memory and care-patch
//! temperature de-duplication.
//!
//! A packet only ever reports one battery kind and one temperature sample
//! sequence number, so most battery fields of a record are served from
//! this cache rather than fresh observation. The decoder commits to the
//! cache only after a packet has fully decoded; a failed packet leaves
//! the state of its device untouched.

use std::collections::HashMap;

use crate::{Batteries, DeviceId};

/// Which battery a packet reports on, from the battery-type payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatteryKind {
    CollectorInner = 0,
    CollectorOuter = 1,
    Thermometer = 2,
    Oximeter = 3,
    Cuff = 4,
    FlowMeter = 5,
}

impl BatteryKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::CollectorInner),
            1 => Some(Self::CollectorOuter),
            2 => Some(Self::Thermometer),
            3 => Some(Self::Oximeter),
            4 => Some(Self::Cuff),
            5 => Some(Self::FlowMeter),
            _ => None,
        }
    }

    /// Raw byte to percentage. The collector batteries report a lithium
    /// cell ADC reading calibrated against the 3300-4050 mV range;
    /// peripheral batteries already report a percentage.
    pub fn percentage(self, raw: u8) -> u8 {
        match self {
            Self::CollectorInner | Self::CollectorOuter => {
                let ratio = ((f64::from(raw) - 15.0) * 5.0 + 3200.0 - 3300.0) / (4050.0 - 3300.0);
                (ratio * 100.0).floor().clamp(0.0, 100.0) as u8
            }
            _ => raw,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct DeviceState {
    battery: [Option<u8>; 6],
    temperature_sn: Option<u8>,
}

/// Process-wide per-device memo, keyed by [`DeviceId`]. Methods take
/// `&mut self`, so same-device decodes are serialized by ownership;
/// share one instance behind a mutex when decoding from several threads.
#[derive(Debug, Default)]
pub struct DeviceStateCache {
    devices: HashMap<DeviceId, DeviceState>,
}

impl DeviceStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one battery observation and returns the six last-known
    /// percentages, the fresh reading included.
    pub(crate) fn observe_battery(
        &mut self,
        device: DeviceId,
        kind: BatteryKind,
        raw: u8,
    ) -> Batteries {
        let state = self.devices.entry(device).or_default();
        state.battery[kind as usize] = Some(kind.percentage(raw));
        Batteries {
            collector_inner: state.battery[BatteryKind::CollectorInner as usize],
            collector_outer: state.battery[BatteryKind::CollectorOuter as usize],
            thermometer: state.battery[BatteryKind::Thermometer as usize],
            oximeter: state.battery[BatteryKind::Oximeter as usize],
            cuff: state.battery[BatteryKind::Cuff as usize],
            flow_meter: state.battery[BatteryKind::FlowMeter as usize],
        }
    }

    /// Care-patch temperature de-duplication: a reading surfaces only when
    /// the sample sequence number differs from the cached one. The first
    /// sighting of a device caches the number without surfacing anything.
    pub(crate) fn observe_temperature(
        &mut self,
        device: DeviceId,
        sn: u8,
        reading: u16,
    ) -> Option<u16> {
        let state = self.devices.entry(device).or_default();
        match state.temperature_sn {
            Some(last) if last == sn => None,
            Some(_) => {
                state.temperature_sn = Some(sn);
                Some(reading)
            }
            None => {
                state.temperature_sn = Some(sn);
                None
            }
        }
    }

    /// Drops the state of one device. Retention is otherwise unbounded;
    /// long-running deployments evict stale devices through this.
    pub fn forget(&mut self, device: &DeviceId) {
        self.devices.remove(device);
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(hex: &str) -> DeviceId {
        DeviceId::from_hex(hex).unwrap()
    }

    #[test]
    fn collector_calibration_floor_and_clamp() {
        // raw 15 sits below the calibrated range and floors to 0
        assert_eq!(BatteryKind::CollectorInner.percentage(15), 0);
        assert_eq!(BatteryKind::CollectorInner.percentage(0), 0);
        // raw 255 lands past 100% and clamps
        assert_eq!(BatteryKind::CollectorOuter.percentage(255), 100);
        // mid-range: ((165 - 15) * 5 - 100) / 750 * 100 = 86.67 -> 86
        assert_eq!(BatteryKind::CollectorInner.percentage(165), 86);
    }

    #[test]
    fn peripheral_batteries_pass_through() {
        assert_eq!(BatteryKind::Thermometer.percentage(57), 57);
        assert_eq!(BatteryKind::Oximeter.percentage(0), 0);
        assert_eq!(BatteryKind::FlowMeter.percentage(255), 255);
    }

    #[test]
    fn unknown_kind_byte() {
        assert_eq!(BatteryKind::from_u8(5), Some(BatteryKind::FlowMeter));
        assert_eq!(BatteryKind::from_u8(6), None);
        assert_eq!(BatteryKind::from_u8(0xF3), None);
    }

    #[test]
    fn battery_observations_accumulate_per_kind() {
        let mut cache = DeviceStateCache::new();
        let id = device("01000403");

        let batteries = cache.observe_battery(id, BatteryKind::Thermometer, 64);
        assert_eq!(batteries.thermometer, Some(64));
        assert_eq!(batteries.collector_inner, None);

        let batteries = cache.observe_battery(id, BatteryKind::CollectorInner, 165);
        assert_eq!(batteries.collector_inner, Some(86));
        // previous observation still served from cache
        assert_eq!(batteries.thermometer, Some(64));
    }

    #[test]
    fn batteries_are_per_device() {
        let mut cache = DeviceStateCache::new();
        cache.observe_battery(device("01000403"), BatteryKind::Oximeter, 80);
        let other = cache.observe_battery(device("01000404"), BatteryKind::Cuff, 30);
        assert_eq!(other.oximeter, None);
        assert_eq!(other.cuff, Some(30));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn temperature_surfaces_only_on_sequence_change() {
        let mut cache = DeviceStateCache::new();
        let id = device("11000001");

        assert_eq!(cache.observe_temperature(id, 7, 370), None);
        assert_eq!(cache.observe_temperature(id, 7, 371), None);
        assert_eq!(cache.observe_temperature(id, 8, 372), Some(372));
        assert_eq!(cache.observe_temperature(id, 8, 373), None);
    }

    #[test]
    fn forget_drops_device_state() {
        let mut cache = DeviceStateCache::new();
        let id = device("11000001");
        cache.observe_battery(id, BatteryKind::Thermometer, 50);
        cache.forget(&id);
        assert!(cache.is_empty());

        let batteries = cache.observe_battery(id, BatteryKind::Oximeter, 10);
        assert_eq!(batteries.thermometer, None);
    }
}
