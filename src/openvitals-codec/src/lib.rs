#[macro_use]
extern crate serde;

mod error;
pub use error::CodecError;

pub mod bytes;

mod device;
pub use device::DeviceId;

pub mod frame;

pub mod layout;

pub mod waveform;

mod cache;
pub use cache::{BatteryKind, DeviceStateCache};

mod packet;
pub use packet::*;
