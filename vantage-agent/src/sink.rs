//! UDP delivery sink
//!
//! Each target vector goes out as one datagram of the form
//! `"<delta_x>,<delta_y>,<flag>"`. No acknowledgement, no retry.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::info;
use vantage_core::{DeliverySink, Error, Result, TargetVector};

pub struct UdpSink {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpSink {
    /// Bind `bind` locally and resolve `peer` once, up front.
    pub fn connect(bind: &str, peer: &str) -> Result<Self> {
        let peer = peer
            .to_socket_addrs()
            .map_err(|e| Error::Config(format!("failed to resolve sink peer '{}': {}", peer, e)))?
            .next()
            .ok_or_else(|| Error::Config(format!("sink peer '{}' resolved to nothing", peer)))?;

        let socket = UdpSocket::bind(bind)
            .map_err(|e| Error::Config(format!("failed to bind sink socket '{}': {}", bind, e)))?;

        info!(
            "Delivering target vectors from {} to {}",
            socket.local_addr().map(|a| a.to_string()).unwrap_or_else(|_| bind.to_string()),
            peer
        );

        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl DeliverySink for UdpSink {
    fn send(&mut self, vector: &TargetVector) -> io::Result<()> {
        self.socket.send_to(&vector.to_datagram(), self.peer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sends_one_datagram_per_vector() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let peer = receiver.local_addr().unwrap().to_string();

        let mut sink = UdpSink::connect("127.0.0.1:0", &peer).unwrap();
        sink.send(&TargetVector::new(12, -7)).unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"12,-7,false");
    }

    #[test]
    fn test_unresolvable_peer_is_config_error() {
        let result = UdpSink::connect("127.0.0.1:0", "not a socket address");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
