use anyhow::{Context, anyhow};

/// Capture files are a sequence of 576-byte blocks; block 0 is the text
/// header, every later block one raw packet.
pub const BLOCK_LEN: usize = 576;

/// The ASCII header block: underscore-delimited, most fields `key:value`.
/// Its device id is the required input to every block decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHeader {
    pub manufacturer: String,
    pub device_name: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub device_id: String,
    /// Respiration bit depth and sample rate, verbatim.
    pub resp: String,
    pub ecg: String,
    pub axes: String,
    pub spo2: String,
}

impl CaptureHeader {
    pub fn parse(block: &[u8]) -> anyhow::Result<Self> {
        let text = std::str::from_utf8(block).context("capture header is not valid UTF-8")?;
        let text = text.trim_end_matches(['\0', ' ', '\t', '\r', '\n']);

        let fields: Vec<&str> = text.split('_').collect();
        if fields.len() < 10 {
            return Err(anyhow!(
                "capture header has {} fields, expected 10",
                fields.len()
            ));
        }

        let value = |index: usize| -> anyhow::Result<String> {
            fields[index]
                .split_once(':')
                .map(|(_, v)| v.to_string())
                .ok_or_else(|| anyhow!("capture header field {index} is not key:value"))
        };

        Ok(Self {
            manufacturer: fields[0].to_string(),
            device_name: fields[1].to_string(),
            firmware_version: value(3)?,
            hardware_version: value(4)?,
            device_id: value(5)?,
            resp: value(6)?,
            ecg: value(7)?,
            axes: value(8)?,
            spo2: value(9)?,
        })
    }
}
