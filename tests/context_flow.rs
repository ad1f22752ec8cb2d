use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use simdeck::app::{DeckBridge, LogLevel, Logger};
use simdeck::config::ConnectionConfig;
use simdeck::deck::{stdio::decode_event, ButtonState, DeckDisplay};

#[derive(Default)]
struct RecordingDisplay {
    states: Mutex<Vec<(String, ButtonState)>>,
    titles: Mutex<Vec<(String, String)>>,
}

impl RecordingDisplay {
    fn states(&self) -> Vec<(String, ButtonState)> {
        self.states.lock().unwrap().clone()
    }

    fn titles(&self) -> Vec<(String, String)> {
        self.titles.lock().unwrap().clone()
    }
}

impl DeckDisplay for RecordingDisplay {
    fn set_state(&self, context: &str, state: ButtonState) {
        self.states.lock().unwrap().push((context.to_string(), state));
    }

    fn set_title(&self, context: &str, title: &str) {
        self.titles.lock().unwrap().push((context.to_string(), title.to_string()));
    }
}

struct Harness {
    bridge: DeckBridge,
    display: Arc<RecordingDisplay>,
    simulator: UdpSocket,
}

/// Bridge wired to a loopback "simulator" socket, with the poll tick
/// driven by hand so tests stay deterministic.
fn harness() -> Harness {
    let display = Arc::new(RecordingDisplay::default());
    let bridge = DeckBridge::new(
        display.clone(),
        Arc::new(Logger::new(LogLevel::Error, None)),
        Duration::from_millis(60),
        Duration::from_millis(200),
    );
    bridge.connect(ConnectionConfig {
        local_address: "127.0.0.1".into(),
        peer_address: "127.0.0.1".into(),
        receive_port: "0".into(),
        send_port: "dynamic".into(),
    });
    assert!(bridge.is_connected());

    let simulator = UdpSocket::bind("127.0.0.1:0").unwrap();
    simulator
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    Harness {
        bridge,
        display,
        simulator,
    }
}

impl Harness {
    fn export(&self, payload: &str) {
        self.simulator
            .send_to(payload.as_bytes(), self.bridge.local_addr().unwrap())
            .unwrap();
    }

    fn recv_command(&self) -> String {
        let mut buf = [0u8; 1024];
        let (len, _) = self.simulator.recv_from(&mut buf).expect("command");
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }
}

#[test]
fn telemetry_drives_state_and_title_once_per_change() {
    let h = harness();
    h.bridge.will_appear(
        "ctx".into(),
        "com.simdeck.switch",
        &json!({
            "dcs_id_compare_monitor": "25",
            "dcs_id_compare_condition": "GREATER_THAN",
            "dcs_id_comparison_value": "10",
            "dcs_id_string_monitor": "2000",
        }),
    );
    // Appearance pushes the initial state once.
    assert_eq!(h.display.states(), vec![("ctx".to_string(), ButtonState::First)]);

    h.export("25=15:2000=MASTER ARM");
    h.bridge.tick();
    assert_eq!(
        h.display.states(),
        vec![
            ("ctx".to_string(), ButtonState::First),
            ("ctx".to_string(), ButtonState::Second),
        ]
    );
    assert_eq!(
        h.display.titles(),
        vec![("ctx".to_string(), "MASTER ARM".to_string())]
    );

    // Same snapshot again: nothing new to say.
    h.bridge.tick();
    assert_eq!(h.display.states().len(), 2);
    assert_eq!(h.display.titles().len(), 1);
}

#[test]
fn momentary_press_and_release_reach_the_simulator() {
    let h = harness();
    let settings = json!({
        "button_id": "3001",
        "device_id": "24",
        "press_value": "1",
        "release_value": "0",
    });
    h.bridge
        .will_appear("ctx".into(), "com.simdeck.momentary", &settings);

    h.bridge
        .key_down("ctx", &json!({"state": 0, "settings": settings}));
    // The command socket learns its peer from the first export datagram.
    h.export("1=1");
    h.bridge.tick();

    h.bridge
        .key_down("ctx", &json!({"state": 0, "settings": settings}));
    assert_eq!(h.recv_command(), "C24,3001,1\n");
    h.bridge
        .key_up("ctx", &json!({"state": 0, "settings": settings}));
    assert_eq!(h.recv_command(), "C24,3001,0\n");
}

#[test]
fn switch_release_resyncs_state_after_three_ticks() {
    let h = harness();
    let settings = json!({
        "button_id": "3001",
        "device_id": "24",
        "send_when_first_state_value": "1",
        "send_when_second_state_value": "-1",
    });
    h.bridge
        .will_appear("ctx".into(), "com.simdeck.switch", &settings);
    let pushes_before = h.display.states().len();

    h.bridge
        .key_up("ctx", &json!({"state": 0, "settings": settings}));
    // Release itself pushes nothing; the resync is tick-counted.
    assert_eq!(h.display.states().len(), pushes_before);
    for _ in 0..3 {
        h.bridge.tick();
        assert_eq!(h.display.states().len(), pushes_before);
    }
    h.bridge.tick();
    assert_eq!(h.display.states().len(), pushes_before + 1);
    // One-shot: further ticks stay quiet.
    h.bridge.tick();
    assert_eq!(h.display.states().len(), pushes_before + 1);
}

#[test]
fn settings_change_keeps_the_context_alive() {
    let h = harness();
    h.bridge.will_appear(
        "ctx".into(),
        "com.simdeck.switch",
        &json!({"dcs_id_compare_monitor": "25", "dcs_id_comparison_value": "10"}),
    );
    h.export("25=15");
    h.bridge.tick();
    assert_eq!(h.display.states().last().unwrap().1, ButtonState::Second);

    // Retarget the monitor; the handle and link survive.
    h.bridge.settings_changed(
        "ctx",
        None,
        &json!({"dcs_id_compare_monitor": "26", "dcs_id_comparison_value": "10"}),
    );
    h.export("26=3");
    h.bridge.tick();
    assert_eq!(h.display.states().last().unwrap().1, ButtonState::First);
    assert_eq!(h.bridge.context_count(), 1);
}

#[test]
fn wire_events_flow_through_the_bridge() {
    let h = harness();
    let appear = decode_event(
        r#"{"event":"willAppear","context":"ctx9","action":"com.simdeck.momentary","payload":{"settings":{}}}"#,
    )
    .unwrap();
    h.bridge.handle_host_event(appear);
    assert_eq!(h.bridge.context_count(), 1);

    let vanish = decode_event(r#"{"event":"willDisappear","context":"ctx9"}"#).unwrap();
    h.bridge.handle_host_event(vanish);
    assert_eq!(h.bridge.context_count(), 0);
}
