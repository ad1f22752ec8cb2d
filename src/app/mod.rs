use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    cli::RunOptions,
    config::{Config, ConnectionConfig},
    deck::{stdio, DeckDisplay},
    telemetry::{SimTelemetry, TelemetryService},
    timer::CallbackTimer,
    Error, Result,
};

mod bridge;
mod logger;

pub use bridge::DeckBridge;
pub use logger::{LogLevel, Logger};

/// Config for the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub poll_interval: Duration,
    pub hold_delay: Duration,
    pub receive_timeout: Duration,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_sources(Config::default(), RunOptions::default())
    }
}

impl AppConfig {
    /// Merge CLI options over config-file values.
    pub fn from_sources(cfg: Config, opts: RunOptions) -> Self {
        let connection = ConnectionConfig {
            local_address: opts.local_address.unwrap_or(cfg.connection.local_address),
            peer_address: opts.peer_address.unwrap_or(cfg.connection.peer_address),
            receive_port: opts.receive_port.unwrap_or(cfg.connection.receive_port),
            send_port: opts.send_port.unwrap_or(cfg.connection.send_port),
        };
        Self {
            connection,
            poll_interval: opts
                .poll_interval
                .unwrap_or(Duration::from_millis(cfg.poll_interval_ms)),
            hold_delay: opts
                .hold_delay
                .unwrap_or(Duration::from_millis(cfg.hold_delay_ms)),
            receive_timeout: Duration::from_millis(cfg.receive_timeout_ms),
            log_level: opts
                .log_level
                .or_else(|| LogLevel::from_str(&cfg.log_level).ok())
                .unwrap_or_default(),
            log_file: opts.log_file.or(cfg.log_file),
        }
    }
}

pub struct App {
    config: AppConfig,
    logger: Arc<Logger>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let logger = Arc::new(Logger::new(config.log_level, config.log_file.clone()));
        Self { config, logger }
    }

    pub fn from_options(opts: RunOptions) -> Result<Self> {
        let cfg_file = Config::load_or_default()?;
        Ok(Self::new(AppConfig::from_sources(cfg_file, opts)))
    }

    /// Entry point for the daemon: wire the host boundary to the bridge
    /// and run until ctrl-c or the host closes stdin.
    pub fn run(&self) -> Result<()> {
        let display: Arc<dyn DeckDisplay> = Arc::new(stdio::StdioHost::new());
        let bridge = Arc::new(DeckBridge::new(
            display,
            self.logger.clone(),
            self.config.hold_delay,
            self.config.receive_timeout,
        ));
        bridge.connect(self.config.connection.clone());

        let mut poll = CallbackTimer::new();
        let tick_bridge = bridge.clone();
        poll.start_interval(self.config.poll_interval, move || tick_bridge.tick());
        self.logger.info(format!(
            "polling every {}",
            humantime::format_duration(self.config.poll_interval)
        ));

        let events = stdio::spawn_event_reader();
        let running = create_shutdown_flag()?;
        while running.load(Ordering::SeqCst) {
            match events.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => bridge.handle_host_event(event),
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam::channel::RecvTimeoutError::Disconnected) => {
                    self.logger.info("host closed the event stream");
                    break;
                }
            }
        }

        poll.stop();
        self.logger.info("shutting down");
        Ok(())
    }

    /// Listen for roughly `window` and print the telemetry map, for
    /// checking the simulator export feed from a terminal.
    pub fn snapshot(&self, window: Duration) -> Result<()> {
        let telemetry = SimTelemetry::open_with_timeout(
            self.config.connection.clone(),
            self.config.receive_timeout,
        )?;
        let deadline = Instant::now() + window;
        while Instant::now() < deadline {
            telemetry.refresh();
        }
        let snapshot = telemetry.snapshot();
        if snapshot.is_empty() {
            self.logger.warn("no telemetry received");
        }
        for (id, value) in snapshot {
            println!("{id} = {value}");
        }
        Ok(())
    }
}

/// Install a ctrl-c handler that flips the shared running flag instead of
/// exiting immediately.
fn create_shutdown_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let running_handle = running.clone();

    ctrlc::set_handler(move || {
        running_handle.store(false, Ordering::SeqCst);
    })
    .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_options_override_config_file() {
        let mut cfg = Config::default();
        cfg.poll_interval_ms = 10;
        cfg.connection.peer_address = "10.0.0.2".into();

        let opts = RunOptions {
            poll_interval: Some(Duration::from_millis(50)),
            receive_port: Some("1800".into()),
            ..RunOptions::default()
        };
        let merged = AppConfig::from_sources(cfg, opts);
        assert_eq!(merged.poll_interval, Duration::from_millis(50));
        assert_eq!(merged.connection.receive_port, "1800");
        // Untouched values fall through from the file.
        assert_eq!(merged.connection.peer_address, "10.0.0.2");
    }

    #[test]
    fn defaults_give_the_stock_simulator_link() {
        let config = AppConfig::default();
        assert_eq!(config.connection.receive_port, "1725");
        assert_eq!(config.connection.send_port, "26027");
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.hold_delay, Duration::from_millis(1500));
    }
}
