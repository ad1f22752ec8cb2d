use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::net::SimSocket;
use crate::Result;

/// Interface to the simulator's identifier→value map, as consumed by the
/// button contexts. Kept as a trait so tests can substitute a fake feed.
pub trait TelemetryService: Send + Sync {
    /// Current value for a telemetry id; empty when never reported.
    /// Values may be empty or non-numeric at any time.
    fn lookup(&self, id: u32) -> String;

    /// Fire-and-forget command to the simulator.
    fn send_command(&self, button_id: i32, device_id: &str, value: &str);

    /// Pull the newest snapshot from the transport into the value map.
    fn refresh(&self);

    /// Ordered copy of the id→value map for debug output.
    fn snapshot(&self) -> BTreeMap<u32, String>;
}

/// Live telemetry over the UDP link.
///
/// Inbound datagrams are `:`-separated `id=value` tokens; tokens that do
/// not fit that shape are skipped. Outbound commands are a single
/// `C<device>,<button>,<value>` line.
pub struct SimTelemetry {
    socket: SimSocket,
    settings: ConnectionConfig,
    values: Mutex<HashMap<u32, String>>,
}

impl SimTelemetry {
    pub fn open(settings: ConnectionConfig) -> Result<Self> {
        Self::open_with_timeout(settings, crate::net::socket::DEFAULT_RECEIVE_TIMEOUT)
    }

    pub fn open_with_timeout(settings: ConnectionConfig, timeout: Duration) -> Result<Self> {
        let socket = SimSocket::open_with_timeout(
            &settings.local_address,
            &settings.peer_address,
            &settings.receive_port,
            &settings.send_port,
            timeout,
        )?;
        Ok(Self {
            socket,
            settings,
            values: Mutex::new(HashMap::new()),
        })
    }

    /// True when the live link was opened with exactly these identifiers;
    /// used to decide whether a settings change requires a reopen.
    pub fn settings_match(&self, candidate: &ConnectionConfig) -> bool {
        self.settings == *candidate
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    fn ingest(&self, text: &str) {
        let mut values = match self.values.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        for token in text.split([':', '*', '\n']) {
            let Some((id, value)) = token.split_once('=') else {
                continue;
            };
            let Ok(id) = id.trim().parse::<u32>() else {
                continue;
            };
            values.insert(id, value.to_string());
        }
    }
}

impl TelemetryService for SimTelemetry {
    fn lookup(&self, id: u32) -> String {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(&id).cloned())
            .unwrap_or_default()
    }

    fn send_command(&self, button_id: i32, device_id: &str, value: &str) {
        self.socket
            .send(&format!("C{device_id},{button_id},{value}\n"));
    }

    fn refresh(&self) {
        let text = self.socket.receive();
        if !text.is_empty() {
            self.ingest(&text);
        }
    }

    fn snapshot(&self) -> BTreeMap<u32, String> {
        self.values
            .lock()
            .map(|values| values.iter().map(|(k, v)| (*k, v.clone())).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_loopback() -> SimTelemetry {
        let settings = ConnectionConfig {
            local_address: "127.0.0.1".into(),
            peer_address: "127.0.0.1".into(),
            receive_port: "0".into(),
            send_port: "dynamic".into(),
        };
        SimTelemetry::open_with_timeout(settings, Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn ingests_id_value_tokens() {
        let telemetry = open_loopback();
        telemetry.ingest("*25=1:404=TACAN:garbage:=5:9000=0.75");
        assert_eq!(telemetry.lookup(25), "1");
        assert_eq!(telemetry.lookup(404), "TACAN");
        assert_eq!(telemetry.lookup(9000), "0.75");
        assert_eq!(telemetry.lookup(12345), "");
    }

    #[test]
    fn newer_tokens_replace_older_values() {
        let telemetry = open_loopback();
        telemetry.ingest("25=1");
        telemetry.ingest("25=0");
        assert_eq!(telemetry.lookup(25), "0");
    }

    #[test]
    fn snapshot_is_ordered() {
        let telemetry = open_loopback();
        telemetry.ingest("9=c:1=a:5=b");
        let ids: Vec<u32> = telemetry.snapshot().keys().copied().collect();
        assert_eq!(ids, vec![1, 5, 9]);
    }

    #[test]
    fn settings_match_compares_identifiers() {
        let telemetry = open_loopback();
        let mut candidate = ConnectionConfig {
            local_address: "127.0.0.1".into(),
            peer_address: "127.0.0.1".into(),
            receive_port: "0".into(),
            send_port: "dynamic".into(),
        };
        assert!(telemetry.settings_match(&candidate));
        candidate.send_port = "26027".into();
        assert!(!telemetry.settings_match(&candidate));
    }
}
