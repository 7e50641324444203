use openvitals_codec::{CollectorPacket, DeviceStateCache};
use tokio::net::UdpSocket;

/// UDP front door for live collectors: one datagram in, one decoded
/// record out. Bad frames are logged and dropped; the shared device cache
/// survives them untouched.
pub struct CollectorListener {
    socket: UdpSocket,
    cache: DeviceStateCache,
    check_checksum: bool,
}

impl CollectorListener {
    pub async fn bind(port: u16, check_checksum: bool) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        info!("listening on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            cache: DeviceStateCache::new(),
            check_checksum,
        })
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; 2048];
        loop {
            let (len, addr) = self.socket.recv_from(&mut buf).await?;
            match CollectorPacket::parse_frame(&buf[..len], &mut self.cache, self.check_checksum) {
                Ok(packet) => {
                    debug!("{} #{} from {}", packet.device_id, packet.packet_sn, addr);
                    println!("{}", serde_json::to_string(&packet)?);
                }
                Err(error) => {
                    warn!("dropping {len} byte datagram from {addr}: {error}");
                }
            }
        }
    }
}
