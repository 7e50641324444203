#[macro_use]
extern crate log;

mod capture;
pub use capture::{BLOCK_LEN, CaptureHeader};

mod listener;
pub use listener::CollectorListener;
