use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::PacketSink;

const BACKOFF_MIN: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(10);

/// TCP transport for detectors that stream packets over a persistent
/// connection instead of UDP. Reconnects with doubling backoff; each read
/// is treated as one packet.
pub struct TcpAdapter {
    device_id: String,
    addr: String,
    sink: Arc<dyn PacketSink>,
}

impl TcpAdapter {
    pub fn new(device_id: String, addr: String, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            device_id,
            addr,
            sink,
        }
    }

    pub fn start(self) -> oneshot::Sender<()> {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut backoff = BACKOFF_MIN;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    connected = TcpStream::connect(&self.addr) => {
                        match connected {
                            Ok(stream) => {
                                info!(device_id = %self.device_id, addr = %self.addr, "tcp adapter connected");
                                backoff = BACKOFF_MIN;
                                if self.pump(stream, &mut stop_rx).await {
                                    break;
                                }
                            }
                            Err(err) => {
                                warn!(device_id = %self.device_id, addr = %self.addr, %err, "tcp connect failed");
                            }
                        }
                    }
                }
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(BACKOFF_MAX);
            }
            info!(device_id = %self.device_id, "tcp adapter stopped");
        });

        stop_tx
    }

    /// Reads until the peer closes or the stop signal fires. Returns true
    /// on stop.
    async fn pump(&self, mut stream: TcpStream, stop_rx: &mut oneshot::Receiver<()>) -> bool {
        let peer: SocketAddr = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(err) => {
                warn!(device_id = %self.device_id, %err, "peer address unavailable");
                return false;
            }
        };

        let mut buf = vec![0u8; 4096];
        loop {
            tokio::select! {
                _ = &mut *stop_rx => return true,
                read = stream.read(&mut buf) => {
                    match read {
                        Ok(0) => {
                            warn!(device_id = %self.device_id, "tcp connection closed by peer");
                            return false;
                        }
                        Ok(len) => self.sink.on_packet(&buf[..len], peer).await,
                        Err(err) => {
                            warn!(device_id = %self.device_id, %err, "tcp read failed");
                            return false;
                        }
                    }
                }
            }
        }
    }
}
