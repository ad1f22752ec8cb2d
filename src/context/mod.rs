pub mod modes;
pub mod monitors;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::deck::{ButtonState, DeckDisplay, EventPayload, KeyEvent};
use crate::decimal::Decimal;
use crate::telemetry::TelemetryService;
use crate::timer::CallbackTimer;

pub use modes::ButtonMode;
pub use monitors::MonitorSet;

use monitors::settings_str;

pub const DEFAULT_HOLD_DELAY: Duration = Duration::from_millis(1500);

/// One visible button: its monitor configuration plus the runtime state
/// derived from telemetry.
///
/// Identity is the opaque handle the host assigned; settings updates
/// mutate in place so the accumulator and current display survive them.
pub struct ButtonContext {
    context: String,
    action: String,
    monitors: MonitorSet,
    mode: ButtonMode,

    current_state: ButtonState,
    current_title: String,
    accumulator: Decimal,
    /// When set, counts refresh ticks down to a one-shot unconditional
    /// state push.
    resend_countdown: Option<i32>,
    /// Live hold timer for the three-state mode; at most one per context.
    hold_timer: Option<CallbackTimer>,
    hold_delay: Duration,
}

impl ButtonContext {
    pub fn new(context: impl Into<String>, action: &str, settings: &Value) -> Self {
        Self::with_hold_delay(context, action, settings, DEFAULT_HOLD_DELAY)
    }

    pub fn with_hold_delay(
        context: impl Into<String>,
        action: &str,
        settings: &Value,
        hold_delay: Duration,
    ) -> Self {
        Self {
            context: context.into(),
            action: action.to_string(),
            monitors: MonitorSet::from_settings(settings),
            mode: ButtonMode::from_action(action, settings),
            current_state: ButtonState::First,
            current_title: String::new(),
            accumulator: Decimal::ZERO,
            resend_countdown: None,
            hold_timer: None,
            hold_delay,
        }
    }

    pub fn handle(&self) -> &str {
        &self.context
    }

    pub fn is_switch(&self) -> bool {
        self.mode.is_switch()
    }

    /// Re-parse monitors and mode parameters from a settings payload.
    /// Runtime display state and the accumulator are left untouched.
    pub fn apply_settings(&mut self, action: Option<&str>, settings: &Value) {
        if let Some(action) = action {
            self.action = action.to_string();
        }
        self.monitors = MonitorSet::from_settings(settings);
        self.mode = ButtonMode::from_action(&self.action, settings);
    }

    /// Pull the monitored telemetry values and push any resulting display
    /// changes to the host. Notifications go out only on change, except
    /// for an armed forced resend reaching zero, which pushes the current
    /// state once unconditionally.
    pub fn refresh(&mut self, telemetry: &dyn TelemetryService, display: &dyn DeckDisplay) {
        let mut updated_state = ButtonState::First;
        let mut updated_title = String::new();

        if let Some(monitor) = &self.monitors.increment {
            // Non-numeric and absent values are ignored, not treated as zero.
            if let Some(value) = Decimal::parse(&telemetry.lookup(monitor.telemetry_id)) {
                self.accumulator = value;
            }
        }
        if let Some(monitor) = &self.monitors.compare {
            if let Some(value) = Decimal::parse(&telemetry.lookup(monitor.telemetry_id)) {
                updated_state = monitor.state_for(value);
            }
        }
        if let Some(monitor) = &self.monitors.string {
            let value = telemetry.lookup(monitor.telemetry_id);
            if !value.is_empty() {
                updated_title = monitor.title_for(&value);
            }
        }

        if updated_state != self.current_state {
            self.current_state = updated_state;
            display.set_state(&self.context, self.current_state);
        }
        if updated_title != self.current_title {
            self.current_title = updated_title;
            display.set_title(&self.context, &self.current_title);
        }

        if let Some(count) = self.resend_countdown {
            if count <= 0 {
                display.set_state(&self.context, self.current_state);
                self.resend_countdown = None;
            } else {
                self.resend_countdown = Some(count - 1);
            }
        }
    }

    /// Push the current state to the host immediately.
    pub fn force_resend(&self, display: &dyn DeckDisplay) {
        display.set_state(&self.context, self.current_state);
    }

    /// Arm a countdown so a later refresh pushes the current state once,
    /// measured in poll ticks rather than wall time.
    pub fn force_resend_after_delay(&mut self, ticks: i32) {
        self.resend_countdown = Some(ticks);
    }

    /// Apply a key event: decide per the configured mode whether a
    /// command fires and send it through the telemetry service.
    ///
    /// Both `button_id` and `device_id` must parse as integers or the
    /// event is dropped; `device_id` still travels as a string.
    pub fn handle_event(
        &mut self,
        event: KeyEvent,
        payload: &EventPayload,
        telemetry: &Arc<dyn TelemetryService>,
    ) {
        let button_id_raw = settings_str(&payload.settings, "button_id");
        let device_id = settings_str(&payload.settings, "device_id");
        let Ok(button_id) = button_id_raw.trim().parse::<i32>() else {
            return;
        };
        if device_id.trim().parse::<i64>().is_err() {
            return;
        }

        let mode = self.mode.clone();
        match mode {
            ButtonMode::Momentary(momentary) => {
                if let Some(value) = momentary.decide(event) {
                    telemetry.send_command(button_id, &device_id, &value);
                }
            }
            ButtonMode::Switch(switch) => {
                if let Some(value) = switch.decide(event, payload.state) {
                    telemetry.send_command(button_id, &device_id, &value);
                }
            }
            ButtonMode::ThreeState(three_state) => {
                self.handle_three_state(three_state, event, payload, telemetry, button_id, device_id);
            }
            ButtonMode::Increment(increment) => {
                if event == KeyEvent::Down {
                    if let Some(next) = increment.next_value(self.accumulator) {
                        self.accumulator = next;
                        telemetry.send_command(button_id, &device_id, &next.to_string());
                    }
                }
            }
        }
    }

    fn handle_three_state(
        &mut self,
        three_state: modes::ThreeState,
        event: KeyEvent,
        payload: &EventPayload,
        telemetry: &Arc<dyn TelemetryService>,
        button_id: i32,
        device_id: String,
    ) {
        match event {
            KeyEvent::Down => {
                // A second key-down while a hold cycle is in flight is a no-op.
                if self.hold_timer.is_some() {
                    return;
                }
                let hold_value = three_state.hold_value;
                let telemetry = Arc::clone(telemetry);
                let mut timer = CallbackTimer::new();
                timer.start_once(self.hold_delay, move || {
                    if !hold_value.is_empty() {
                        telemetry.send_command(button_id, &device_id, &hold_value);
                    }
                });
                self.hold_timer = Some(timer);
            }
            KeyEvent::Up => {
                let Some(mut timer) = self.hold_timer.take() else {
                    return;
                };
                timer.stop();
                // The hold fires at most once per press/release pair: a
                // release after expiry sends nothing further.
                if !timer.timed_out() {
                    if let Some(value) = three_state.resolve_release(payload.state) {
                        telemetry.send_command(button_id, &device_id, &value);
                    }
                }
            }
        }
    }
}
