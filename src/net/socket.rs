use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Mutex;
use std::time::Duration;

use crate::{Error, Result};

/// Sentinel send port meaning "learn the destination from the first
/// inbound datagram" instead of resolving it up front.
pub const DYNAMIC_SEND_PORT: &str = "dynamic";

pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest datagram the simulator protocol produces.
const MAX_DATAGRAM_BYTES: usize = 1024;

/// UDP endpoint carrying the simulator's text protocol.
///
/// The socket is closed when the value is dropped, on every exit path
/// including a failure partway through `open`.
#[derive(Debug)]
pub struct SimSocket {
    socket: UdpSocket,
    /// Send destination. `None` until either configured or learned from
    /// the first sender, after which `send` becomes effective.
    destination: Mutex<Option<SocketAddr>>,
}

impl SimSocket {
    /// Bind a local UDP endpoint for the simulator link.
    ///
    /// All four identifiers must be non-empty. A `send_port` of
    /// `"dynamic"` leaves the destination undetermined until the first
    /// datagram arrives.
    pub fn open(
        local_address: &str,
        peer_address: &str,
        receive_port: &str,
        send_port: &str,
    ) -> Result<Self> {
        Self::open_with_timeout(
            local_address,
            peer_address,
            receive_port,
            send_port,
            DEFAULT_RECEIVE_TIMEOUT,
        )
    }

    pub fn open_with_timeout(
        local_address: &str,
        peer_address: &str,
        receive_port: &str,
        send_port: &str,
        receive_timeout: Duration,
    ) -> Result<Self> {
        if local_address.is_empty()
            || peer_address.is_empty()
            || receive_port.is_empty()
            || send_port.is_empty()
        {
            return Err(Error::Config(format!(
                "missing connection identifiers: local '{local_address}' peer '{peer_address}' \
                 rx '{receive_port}' tx '{send_port}'"
            )));
        }

        let local = resolve(local_address, receive_port)?;
        let socket = UdpSocket::bind(local)
            .map_err(|err| Error::Transport(format!("could not bind {local}: {err}")))?;
        socket
            .set_read_timeout(Some(receive_timeout))
            .map_err(|err| Error::Transport(format!("could not set receive timeout: {err}")))?;

        let destination = if send_port == DYNAMIC_SEND_PORT {
            None
        } else {
            Some(resolve(peer_address, send_port)?)
        };

        Ok(Self {
            socket,
            destination: Mutex::new(destination),
        })
    }

    /// Block up to the receive timeout for the next datagram; returns the
    /// decoded text, or an empty string when nothing arrived.
    ///
    /// If the destination is still undetermined, the sender of this first
    /// datagram becomes the send destination.
    pub fn receive(&self) -> String {
        let mut buf = [0u8; MAX_DATAGRAM_BYTES];
        match self.socket.recv_from(&mut buf) {
            Ok((len, sender)) => {
                if let Ok(mut destination) = self.destination.lock() {
                    if destination.is_none() {
                        *destination = Some(sender);
                    }
                }
                String::from_utf8_lossy(&buf[..len]).into_owned()
            }
            Err(_) => String::new(),
        }
    }

    /// Best-effort datagram write to the current destination; a silent
    /// no-op while no destination is known.
    pub fn send(&self, text: &str) {
        let destination = match self.destination.lock() {
            Ok(guard) => *guard,
            Err(_) => return,
        };
        if let Some(addr) = destination {
            let _ = self.socket.send_to(text.as_bytes(), addr);
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination.lock().ok().and_then(|guard| *guard)
    }
}

fn resolve(host: &str, port: &str) -> Result<SocketAddr> {
    let target = format!("{host}:{port}");
    target
        .to_socket_addrs()
        .map_err(|err| Error::Transport(format!("could not resolve '{target}': {err}")))?
        .next()
        .ok_or_else(|| Error::Transport(format!("no usable address for '{target}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_identifiers() {
        let err = SimSocket::open("", "127.0.0.1", "0", "dynamic").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
        let err = SimSocket::open("127.0.0.1", "127.0.0.1", "0", "").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[test]
    fn unresolvable_address_is_a_transport_error() {
        let err = SimSocket::open("no.such.host.invalid", "127.0.0.1", "0", "dynamic").unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    }

    #[test]
    fn dynamic_send_port_starts_with_no_destination() {
        let socket = SimSocket::open("127.0.0.1", "127.0.0.1", "0", "dynamic").unwrap();
        assert!(socket.destination().is_none());
        // Nothing to send to yet; must not panic or error.
        socket.send("ignored");
    }

    #[test]
    fn receive_times_out_with_empty_result() {
        let socket = SimSocket::open_with_timeout(
            "127.0.0.1",
            "127.0.0.1",
            "0",
            "dynamic",
            Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(socket.receive(), "");
    }

    #[test]
    fn static_send_port_resolves_destination_up_front() {
        let socket = SimSocket::open("127.0.0.1", "127.0.0.1", "0", "26027").unwrap();
        let destination = socket.destination().unwrap();
        assert_eq!(destination.port(), 26027);
    }
}
