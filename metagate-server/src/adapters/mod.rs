use std::net::SocketAddr;

use async_trait::async_trait;

use crate::services::PacketIngest;

mod tcp;
mod udp;

pub use tcp::TcpAdapter;
pub use udp::UdpAdapter;

/// Where the transport adapters deliver raw detector datagrams.
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn on_packet(&self, buf: &[u8], peer: SocketAddr);
}

#[async_trait]
impl PacketSink for PacketIngest {
    async fn on_packet(&self, buf: &[u8], peer: SocketAddr) {
        self.handle_packet(buf, peer).await;
    }
}
