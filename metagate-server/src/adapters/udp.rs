use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::codec::CMD_DISCOVERY;

use super::PacketSink;

/// UDP transport for the detector protocol. One socket serves both
/// directions: periodic discovery pings broadcast out, announcements and
/// event packets come back in.
pub struct UdpAdapter {
    port: u16,
    ping_interval: Duration,
    sink: Arc<dyn PacketSink>,
}

impl UdpAdapter {
    pub fn new(port: u16, ping_interval: Duration, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            port,
            ping_interval,
            sink,
        }
    }

    pub async fn start(self) -> io::Result<oneshot::Sender<()>> {
        let socket = UdpSocket::bind(("0.0.0.0", self.port)).await?;
        socket.set_broadcast(true)?;
        info!(port = self.port, "udp adapter listening");

        let ping_target = SocketAddr::from((Ipv4Addr::BROADCAST, self.port));
        let (stop_tx, mut stop_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut ping = tokio::time::interval(self.ping_interval);
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        info!("udp adapter stopped");
                        break;
                    }
                    _ = ping.tick() => {
                        if let Err(err) = socket.send_to(&[CMD_DISCOVERY], ping_target).await {
                            warn!(%err, "discovery ping failed");
                        }
                    }
                    received = socket.recv_from(&mut buf) => {
                        match received {
                            // A lone command byte is our own broadcast ping
                            // looping back on the shared port.
                            Ok((1, _)) => {}
                            Ok((len, peer)) => self.sink.on_packet(&buf[..len], peer).await,
                            Err(err) => warn!(%err, "udp recv failed"),
                        }
                    }
                }
            }
        });

        Ok(stop_tx)
    }
}
