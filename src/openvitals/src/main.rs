#[macro_use]
extern crate log;

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use openvitals::{BLOCK_LEN, CaptureHeader, CollectorListener};
use openvitals_codec::{CollectorPacket, DeviceId, DeviceStateCache, frame};

#[derive(Parser)]
pub struct OpenVitalsCli {
    #[clap(subcommand)]
    pub subcommand: OpenVitalsCommand,
}

#[derive(Subcommand)]
pub enum OpenVitalsCommand {
    ///
    /// Decode packets from a capture file and print them as JSON lines
    ///
    Parse {
        file: PathBuf,
        /// Blocks to skip past the header
        #[arg(long, default_value_t = 0)]
        skip: u64,
        /// Number of blocks to decode; all remaining when omitted
        #[arg(long)]
        count: Option<u64>,
    },
    ///
    /// Listen for collector datagrams over UDP
    ///
    Listen {
        #[arg(long, env, default_value_t = 62014)]
        port: u16,
        /// Reject datagrams whose trailing checksum does not match
        #[arg(long)]
        check_checksum: bool,
    },
    ///
    /// Re-frame a captured block as a UDP datagram and print it as hex
    ///
    Convert {
        file: PathBuf,
        /// Block index past the header
        #[arg(long, default_value_t = 0)]
        block: u64,
        /// Override the device id from the capture header
        #[arg(long)]
        device_id: Option<DeviceId>,
        /// Overwrite the packet sequence number
        #[arg(long)]
        sequence: Option<u32>,
        /// Overwrite the device timestamp, unix milliseconds
        #[arg(long)]
        timestamp: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(error) = dotenv() {
        println!("{}", error);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = OpenVitalsCli::parse();
    match cli.subcommand {
        OpenVitalsCommand::Parse { file, skip, count } => parse_command(file, skip, count),
        OpenVitalsCommand::Listen { port, check_checksum } => {
            let listener = CollectorListener::bind(port, check_checksum).await?;
            listener.run().await
        }
        OpenVitalsCommand::Convert {
            file,
            block,
            device_id,
            sequence,
            timestamp,
        } => convert_command(file, block, device_id, sequence, timestamp),
    }
}

fn read_block(file: &mut File, index: u64) -> anyhow::Result<Vec<u8>> {
    let mut block = vec![0u8; BLOCK_LEN];
    file.seek(SeekFrom::Start(index * BLOCK_LEN as u64))?;
    file.read_exact(&mut block)
        .with_context(|| format!("reading block {index}"))?;
    Ok(block)
}

fn parse_command(path: PathBuf, skip: u64, count: Option<u64>) -> anyhow::Result<()> {
    let mut file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let header = CaptureHeader::parse(&read_block(&mut file, 0)?)?;
    info!(
        "capture from {} {} (device {})",
        header.manufacturer, header.device_name, header.device_id
    );

    let device_id = DeviceId::from_hex(&header.device_id)?;
    let mut cache = DeviceStateCache::new();
    let mut index = 1 + skip;
    let mut remaining = count;

    loop {
        if remaining == Some(0) {
            break;
        }
        let Ok(block) = read_block(&mut file, index) else {
            break;
        };

        match CollectorPacket::parse(&block, device_id, &mut cache) {
            Ok(packet) => println!("{}", serde_json::to_string(&packet)?),
            Err(error) => warn!("skipping block {index}: {error}"),
        }

        index += 1;
        if let Some(left) = remaining.as_mut() {
            *left -= 1;
        }
    }

    Ok(())
}

fn convert_command(
    path: PathBuf,
    block: u64,
    device_id: Option<DeviceId>,
    sequence: Option<u32>,
    timestamp: Option<u64>,
) -> anyhow::Result<()> {
    let mut file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let header = CaptureHeader::parse(&read_block(&mut file, 0)?)?;
    let device_id = match device_id {
        Some(id) => id,
        None => DeviceId::from_hex(&header.device_id)?,
    };

    let data = read_block(&mut file, 1 + block)?;
    let datagram = frame::build_udp_frame(&device_id, &data, 0, sequence, timestamp);
    println!("{}", hex::encode_upper(datagram));
    Ok(())
}
