use std::{fmt, str::FromStr};

use crate::CodecError;

/// Four-byte collector identity, canonically an 8-hex-character string.
/// Also the key for per-device decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId([u8; 4]);

impl DeviceId {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| CodecError::InvalidDeviceId)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Numeric form reported as `device_code` in decoded records.
    pub fn code(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Care-patch peripherals occupy the "11"-prefixed id range and report
    /// temperature instead of an access point MAC.
    pub fn is_care_patch(&self) -> bool {
        self.0[0] == 0x11
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for DeviceId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl serde::Serialize for DeviceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for DeviceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
