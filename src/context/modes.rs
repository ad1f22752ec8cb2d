use serde_json::Value;

use crate::deck::{ButtonState, KeyEvent};
use crate::decimal::Decimal;

use super::monitors::{settings_bool, settings_str};

/// Button behavior, selected once when settings are parsed rather than
/// re-matched on every event. Each variant carries the settings it needs
/// and exposes one "decide whether to send, and what" operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ButtonMode {
    Momentary(Momentary),
    Switch(Switch),
    ThreeState(ThreeState),
    Increment(Increment),
}

impl ButtonMode {
    /// Classify the action kind. Anything unrecognized behaves as a
    /// momentary button.
    pub fn from_action(action: &str, settings: &Value) -> Self {
        if action.contains("switch") {
            ButtonMode::Switch(Switch::from_settings(settings))
        } else if action.contains("3states") {
            ButtonMode::ThreeState(ThreeState::from_settings(settings))
        } else if action.contains("increment") {
            ButtonMode::Increment(Increment::from_settings(settings))
        } else {
            ButtonMode::Momentary(Momentary::from_settings(settings))
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(self, ButtonMode::Switch(_))
    }
}

/// Press sends the press value; release sends the release value unless
/// disabled. Empty values suppress the send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Momentary {
    pub press_value: String,
    pub release_value: String,
    pub disable_release: bool,
}

impl Momentary {
    pub fn from_settings(settings: &Value) -> Self {
        Self {
            press_value: settings_str(settings, "press_value"),
            release_value: settings_str(settings, "release_value"),
            disable_release: settings_bool(settings, "disable_release_check", false),
        }
    }

    pub fn decide(&self, event: KeyEvent) -> Option<String> {
        let value = match event {
            KeyEvent::Down => self.press_value.clone(),
            KeyEvent::Up => {
                if self.disable_release {
                    return None;
                }
                self.release_value.clone()
            }
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Sends only on release; the value depends on the state the host shows
/// at the time of the event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Switch {
    pub first_value: String,
    pub second_value: String,
}

impl Switch {
    pub fn from_settings(settings: &Value) -> Self {
        Self {
            first_value: settings_str(settings, "send_when_first_state_value"),
            second_value: settings_str(settings, "send_when_second_state_value"),
        }
    }

    pub fn decide(&self, event: KeyEvent, host_state: ButtonState) -> Option<String> {
        if event != KeyEvent::Up {
            return None;
        }
        let value = match host_state {
            ButtonState::First => self.first_value.clone(),
            ButtonState::Second => self.second_value.clone(),
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Switch behavior with a hold gesture: holding past the delay sends the
/// hold value instead of the release value. Timer orchestration lives in
/// the owning context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreeState {
    pub first_value: String,
    pub second_value: String,
    pub hold_value: String,
}

impl ThreeState {
    pub fn from_settings(settings: &Value) -> Self {
        Self {
            first_value: settings_str(settings, "send_when_first_state_value"),
            second_value: settings_str(settings, "send_when_second_state_value"),
            hold_value: settings_str(settings, "send_when_holding_down_state_value"),
        }
    }

    /// Value for a release that beat the hold timer; same resolution as
    /// a plain switch.
    pub fn resolve_release(&self, host_state: ButtonState) -> Option<String> {
        let value = match host_state {
            ButtonState::First => self.first_value.clone(),
            ButtonState::Second => self.second_value.clone(),
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Press steps a running accumulator and sends the result. All three of
/// step/min/max must parse as numeric or the press sends nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Increment {
    pub params: Option<IncrementParams>,
    pub cycle: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementParams {
    pub step: Decimal,
    pub min: Decimal,
    pub max: Decimal,
}

impl Increment {
    pub fn from_settings(settings: &Value) -> Self {
        let step = Decimal::parse(&settings_str(settings, "increment_value"));
        let min = Decimal::parse(&settings_str(settings, "increment_min"));
        let max = Decimal::parse(&settings_str(settings, "increment_max"));
        let params = match (step, min, max) {
            (Some(step), Some(min), Some(max)) => Some(IncrementParams { step, min, max }),
            _ => None,
        };
        Self {
            params,
            cycle: settings_bool(settings, "increment_cycle_allowed_check", false),
        }
    }

    /// Next accumulator value for a press, clamped into `[min, max]`, or
    /// wrapped to the opposite bound when cycling is allowed.
    pub fn next_value(&self, accumulator: Decimal) -> Option<Decimal> {
        let params = self.params.as_ref()?;
        let mut next = accumulator + params.step;
        if next < params.min {
            next = if self.cycle { params.max } else { params.min };
        } else if next > params.max {
            next = if self.cycle { params.min } else { params.max };
        }
        Some(next)
    }
}
