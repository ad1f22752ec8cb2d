use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::Value;

use crate::config::ConnectionConfig;
use crate::context::ButtonContext;
use crate::deck::{DeckDisplay, EventPayload, HostEvent, KeyEvent};
use crate::telemetry::{SimTelemetry, TelemetryService};

use super::Logger;

/// Ticks a switch-mode context waits before resyncing its state after a
/// release, dodging the host/plugin race on who flips the shown state.
const SWITCH_RESEND_DELAY_TICKS: i32 = 3;

/// Owns the visible contexts and fans telemetry and host events into
/// them. One lock serializes every per-context transition, whether it
/// came from the poll tick or from a host callback.
pub struct DeckBridge {
    contexts: Mutex<HashMap<String, ButtonContext>>,
    /// Live simulator link; `None` until a connection has been opened
    /// and after a failed reopen.
    telemetry: RwLock<Option<Arc<SimTelemetry>>>,
    display: Arc<dyn DeckDisplay>,
    logger: Arc<Logger>,
    hold_delay: Duration,
    receive_timeout: Duration,
}

impl DeckBridge {
    pub fn new(
        display: Arc<dyn DeckDisplay>,
        logger: Arc<Logger>,
        hold_delay: Duration,
        receive_timeout: Duration,
    ) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            telemetry: RwLock::new(None),
            display,
            logger,
            hold_delay,
            receive_timeout,
        }
    }

    /// Open (or reopen) the simulator link. A candidate matching the
    /// live link's identifiers is a no-op; otherwise the old socket is
    /// released before the new one binds. On failure telemetry stays
    /// unavailable until the next settings change.
    pub fn connect(&self, candidate: ConnectionConfig) {
        if let Ok(guard) = self.telemetry.read() {
            if let Some(live) = guard.as_ref() {
                if live.settings_match(&candidate) {
                    return;
                }
            }
        }

        let Ok(mut guard) = self.telemetry.write() else {
            return;
        };
        guard.take();
        match SimTelemetry::open_with_timeout(candidate, self.receive_timeout) {
            Ok(telemetry) => {
                match telemetry.local_addr() {
                    Some(addr) => self.logger.info(format!("telemetry link open on {addr}")),
                    None => self.logger.info("telemetry link open"),
                }
                *guard = Some(Arc::new(telemetry));
            }
            Err(err) => {
                self.logger
                    .error(format!("could not open telemetry link: {err}"));
            }
        }
    }

    /// One poll tick: refresh the telemetry snapshot outside the context
    /// lock, then update every live context under it.
    pub fn tick(&self) {
        let Some(service) = self.service() else {
            return;
        };
        service.refresh();

        if let Ok(mut contexts) = self.contexts.lock() {
            for context in contexts.values_mut() {
                context.refresh(service.as_ref(), self.display.as_ref());
            }
        }
    }

    pub fn handle_host_event(&self, event: HostEvent) {
        match event {
            HostEvent::KeyDown { context, payload } => self.key_down(&context, &payload),
            HostEvent::KeyUp { context, payload } => self.key_up(&context, &payload),
            HostEvent::WillAppear {
                context,
                action,
                settings,
            } => self.will_appear(context, &action, &settings),
            HostEvent::WillDisappear { context } => self.will_disappear(&context),
            HostEvent::SettingsChanged {
                context,
                action,
                settings,
            } => self.settings_changed(&context, action.as_deref(), &settings),
            HostEvent::GlobalSettings { settings } => {
                self.connect(ConnectionConfig::from_host_settings(&settings));
            }
        }
    }

    pub fn key_down(&self, context: &str, payload_raw: &Value) {
        let Some(service) = self.service() else {
            return;
        };
        let payload = EventPayload::from_json(payload_raw);
        if let Ok(mut contexts) = self.contexts.lock() {
            if let Some(ctx) = contexts.get_mut(context) {
                ctx.handle_event(KeyEvent::Down, &payload, &service);
            } else {
                self.logger.debug(format!("key down for unknown context {context}"));
            }
        }
    }

    pub fn key_up(&self, context: &str, payload_raw: &Value) {
        let Some(service) = self.service() else {
            return;
        };
        let payload = EventPayload::from_json(payload_raw);
        if let Ok(mut contexts) = self.contexts.lock() {
            if let Some(ctx) = contexts.get_mut(context) {
                // The host flips the shown state on its own after key-up;
                // resend ours so host and plugin stay in sync.
                if ctx.is_switch() {
                    ctx.force_resend_after_delay(SWITCH_RESEND_DELAY_TICKS);
                } else {
                    ctx.force_resend(self.display.as_ref());
                }
                ctx.handle_event(KeyEvent::Up, &payload, &service);
            } else {
                self.logger.debug(format!("key up for unknown context {context}"));
            }
        }
    }

    pub fn will_appear(&self, context: String, action: &str, settings: &Value) {
        let connected = self.service().is_some();
        if let Ok(mut contexts) = self.contexts.lock() {
            let ctx = ButtonContext::with_hold_delay(context.clone(), action, settings, self.hold_delay);
            if connected {
                ctx.force_resend(self.display.as_ref());
            }
            contexts.insert(context, ctx);
        }
    }

    pub fn will_disappear(&self, context: &str) {
        if let Ok(mut contexts) = self.contexts.lock() {
            // Dropping the context stops any live hold timer.
            contexts.remove(context);
        }
    }

    pub fn settings_changed(&self, context: &str, action: Option<&str>, settings: &Value) {
        if let Ok(mut contexts) = self.contexts.lock() {
            if let Some(ctx) = contexts.get_mut(context) {
                ctx.apply_settings(action, settings);
            }
        }
    }

    /// Debug copy of the current telemetry map; `None` while the link is
    /// not open.
    pub fn snapshot_for_debug(&self) -> Option<BTreeMap<u32, String>> {
        self.service().map(|service| service.snapshot())
    }

    pub fn context_count(&self) -> usize {
        self.contexts.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_connected(&self) -> bool {
        self.service().is_some()
    }

    /// Bound address of the live link, when open.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        let guard = self.telemetry.read().ok()?;
        guard.as_ref().and_then(|telemetry| telemetry.local_addr())
    }

    fn service(&self) -> Option<Arc<dyn TelemetryService>> {
        let guard = self.telemetry.read().ok()?;
        guard
            .as_ref()
            .map(|telemetry| telemetry.clone() as Arc<dyn TelemetryService>)
    }
}
