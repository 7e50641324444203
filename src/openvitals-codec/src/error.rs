use thiserror::Error;

#[derive(Debug, Error)]
#[error("{self:?}")]
pub enum CodecError {
    MalformedFrame,
    ChecksumMismatch,
    TruncatedFrame,
    InvalidDeviceId,
    UnrecognizedBatteryKind(u8),
}
