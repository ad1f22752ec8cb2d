use std::io::{self, BufRead, Write};
use std::thread;

use crossbeam::channel::{self, Receiver};
use serde_json::{json, Value};

use super::{ButtonState, DeckDisplay, HostEvent};

/// Host adapter speaking one JSON object per line: events in on stdin,
/// display updates out on stdout.
#[derive(Default)]
pub struct StdioHost;

impl StdioHost {
    pub fn new() -> Self {
        StdioHost
    }
}

impl DeckDisplay for StdioHost {
    fn set_state(&self, context: &str, state: ButtonState) {
        write_line(&json!({
            "event": "setState",
            "context": context,
            "state": state.as_int(),
        }));
    }

    fn set_title(&self, context: &str, title: &str) {
        write_line(&json!({
            "event": "setTitle",
            "context": context,
            "title": title,
        }));
    }
}

fn write_line(value: &Value) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{value}");
    let _ = handle.flush();
}

/// Spawn the stdin reader. The channel closes when stdin reaches EOF.
/// Lines that are not valid events are dropped.
pub fn spawn_event_reader() -> Receiver<HostEvent> {
    let (tx, rx) = channel::unbounded();
    thread::Builder::new()
        .name("simdeck-host-reader".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if let Some(event) = decode_event(&line) {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
        })
        .expect("failed to spawn host reader thread");
    rx
}

/// Decode one wire line into a host event. Returns `None` for blank
/// lines, unknown events, and frames missing their context handle.
pub fn decode_event(line: &str) -> Option<HostEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let frame: Value = serde_json::from_str(trimmed).ok()?;
    let event = frame.get("event")?.as_str()?;
    let payload = frame.get("payload").cloned().unwrap_or(Value::Null);

    if event == "globalSettings" {
        let settings = payload.get("settings").cloned().unwrap_or(Value::Null);
        return Some(HostEvent::GlobalSettings { settings });
    }

    let context = frame.get("context")?.as_str()?.to_string();
    let action = frame
        .get("action")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    match event {
        "keyDown" => Some(HostEvent::KeyDown { context, payload }),
        "keyUp" => Some(HostEvent::KeyUp { context, payload }),
        "willAppear" => Some(HostEvent::WillAppear {
            context,
            action: action.unwrap_or_default(),
            settings: payload.get("settings").cloned().unwrap_or(Value::Null),
        }),
        "willDisappear" => Some(HostEvent::WillDisappear { context }),
        "didReceiveSettings" => Some(HostEvent::SettingsChanged {
            context,
            action,
            settings: payload.get("settings").cloned().unwrap_or(Value::Null),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_key_events() {
        let event = decode_event(
            r#"{"event":"keyDown","context":"ctx1","action":"com.simdeck.momentary","payload":{"state":0,"settings":{}}}"#,
        )
        .unwrap();
        assert!(matches!(event, HostEvent::KeyDown { ref context, .. } if context == "ctx1"));
    }

    #[test]
    fn decodes_lifecycle_and_settings_events() {
        let event = decode_event(
            r#"{"event":"willAppear","context":"ctx2","action":"com.simdeck.switch","payload":{"settings":{"press_value":"1"}}}"#,
        )
        .unwrap();
        match event {
            HostEvent::WillAppear {
                context,
                action,
                settings,
            } => {
                assert_eq!(context, "ctx2");
                assert_eq!(action, "com.simdeck.switch");
                assert_eq!(settings["press_value"], "1");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let event = decode_event(r#"{"event":"willDisappear","context":"ctx2"}"#).unwrap();
        assert_eq!(
            event,
            HostEvent::WillDisappear {
                context: "ctx2".into()
            }
        );
    }

    #[test]
    fn decodes_global_settings_without_context() {
        let event = decode_event(
            r#"{"event":"globalSettings","payload":{"settings":{"ip_address":"127.0.0.1"}}}"#,
        )
        .unwrap();
        assert!(matches!(event, HostEvent::GlobalSettings { .. }));
    }

    #[test]
    fn ignores_unknown_and_malformed_lines() {
        assert_eq!(decode_event(""), None);
        assert_eq!(decode_event("not json"), None);
        assert_eq!(decode_event(r#"{"event":"mystery","context":"c"}"#), None);
        assert_eq!(decode_event(r#"{"event":"keyDown"}"#), None);
    }
}
