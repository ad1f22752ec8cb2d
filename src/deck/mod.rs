pub mod stdio;

use serde_json::Value;

/// Two-valued display state of a button face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    First,
    Second,
}

impl ButtonState {
    pub fn from_host(state: i64) -> Self {
        if state == 0 {
            ButtonState::First
        } else {
            ButtonState::Second
        }
    }

    pub fn as_int(self) -> i64 {
        match self {
            ButtonState::First => 0,
            ButtonState::Second => 1,
        }
    }
}

/// Key transition reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down,
    Up,
}

/// Payload attached to a key event: the state the host shows at the time
/// of the event plus the context's current settings.
#[derive(Debug, Clone)]
pub struct EventPayload {
    pub state: ButtonState,
    pub settings: Value,
}

impl EventPayload {
    pub fn from_json(payload: &Value) -> Self {
        let state = payload.get("state").and_then(|v| v.as_i64()).unwrap_or(0);
        let settings = payload.get("settings").cloned().unwrap_or(Value::Null);
        Self {
            state: ButtonState::from_host(state),
            settings,
        }
    }
}

/// Sink for display updates pushed back to the host.
pub trait DeckDisplay: Send + Sync {
    fn set_state(&self, context: &str, state: ButtonState);
    fn set_title(&self, context: &str, title: &str);
}

/// Host-driven event, decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    KeyDown {
        context: String,
        payload: EventPayloadRaw,
    },
    KeyUp {
        context: String,
        payload: EventPayloadRaw,
    },
    WillAppear {
        context: String,
        action: String,
        settings: Value,
    },
    WillDisappear {
        context: String,
    },
    SettingsChanged {
        context: String,
        action: Option<String>,
        settings: Value,
    },
    GlobalSettings {
        settings: Value,
    },
}

/// Raw event payload kept as JSON until the context interprets it.
pub type EventPayloadRaw = Value;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_state_maps_zero_to_first() {
        assert_eq!(ButtonState::from_host(0), ButtonState::First);
        assert_eq!(ButtonState::from_host(1), ButtonState::Second);
        assert_eq!(ButtonState::from_host(7), ButtonState::Second);
    }

    #[test]
    fn event_payload_defaults_when_fields_missing() {
        let payload = EventPayload::from_json(&json!({}));
        assert_eq!(payload.state, ButtonState::First);
        assert!(payload.settings.is_null());

        let payload = EventPayload::from_json(&json!({"state": 1, "settings": {"press_value": "1"}}));
        assert_eq!(payload.state, ButtonState::Second);
        assert_eq!(payload.settings["press_value"], "1");
    }
}
