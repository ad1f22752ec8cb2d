use std::str::FromStr;
use std::time::Duration;

use crate::app::LogLevel;
use crate::{Error, Result};

pub const DEFAULT_SNAPSHOT_WINDOW: Duration = Duration::from_secs(2);

/// Options for the `run` and `snapshot` commands; values are `None` when
/// not provided on the CLI and fall through to the config file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub local_address: Option<String>,
    pub peer_address: Option<String>,
    pub receive_port: Option<String>,
    pub send_port: Option<String>,
    pub poll_interval: Option<Duration>,
    pub hold_delay: Option<Duration>,
    pub log_level: Option<LogLevel>,
    pub log_file: Option<String>,
    pub snapshot_window: Option<Duration>,
}

/// Parsed command-line intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    Snapshot(RunOptions),
    ShowHelp,
    ShowVersion,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        if args.is_empty() {
            return Ok(Command::Run(RunOptions::default()));
        }

        let mut iter = args.iter();
        match iter.next().map(|s| s.as_str()) {
            Some("run") => Ok(Command::Run(parse_options(&mut iter)?)),
            Some("snapshot") => Ok(Command::Snapshot(parse_options(&mut iter)?)),
            Some("--help") | Some("-h") => Ok(Command::ShowHelp),
            Some("--version") | Some("-V") => Ok(Command::ShowVersion),
            Some(flag) if flag.starts_with('-') => {
                // Allow omitting the explicit `run` subcommand: pass the
                // consumed flag plus the remaining args into the parser.
                let mut flags: Vec<String> = Vec::with_capacity(args.len());
                flags.push(flag.to_string());
                flags.extend(iter.map(|s| s.to_string()));
                let mut iter = flags.iter();
                Ok(Command::Run(parse_options(&mut iter)?))
            }
            Some(cmd) => Err(Error::Config(format!(
                "unknown command '{cmd}', try --help"
            ))),
            None => Ok(Command::Run(RunOptions::default())),
        }
    }

    pub fn print_help() {
        println!("{}", Self::help());
    }

    pub fn help() -> &'static str {
        concat!(
            "simdeck - key deck to flight simulator bridge daemon\n",
            "\n",
            "USAGE:\n",
            "  simdeck run [options]\n",
            "  simdeck snapshot [options]\n",
            "  simdeck --help\n",
            "  simdeck --version\n",
            "\n",
            "COMMANDS:\n",
            "  run        Bridge host events on stdin to the simulator (default)\n",
            "  snapshot   Listen briefly and print the telemetry map\n",
            "\n",
            "OPTIONS:\n",
            "  --local-address <addr>   Local bind address (default: 127.0.0.1)\n",
            "  --peer-address <addr>    Simulator address (default: 127.0.0.1)\n",
            "  --receive-port <port>    UDP port the simulator exports to (default: 1725)\n",
            "  --send-port <port>       Simulator command port, or 'dynamic' (default: 26027)\n",
            "  --poll-interval <dur>    Telemetry poll cadence, e.g. 10ms\n",
            "  --hold-delay <dur>       Hold gesture threshold, e.g. 1500ms\n",
            "  --window <dur>           Listen window for snapshot (default: 2s)\n",
            "  --log-level <level>      error|warn|info|debug|trace\n",
            "  --log-file <path>        Append logs to a file\n",
        )
    }
}

fn parse_options<'a, I>(iter: &mut I) -> Result<RunOptions>
where
    I: Iterator<Item = &'a String>,
{
    let mut opts = RunOptions::default();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--local-address" => opts.local_address = Some(required(iter, flag)?),
            "--peer-address" => opts.peer_address = Some(required(iter, flag)?),
            "--receive-port" => opts.receive_port = Some(required(iter, flag)?),
            "--send-port" => opts.send_port = Some(required(iter, flag)?),
            "--poll-interval" => opts.poll_interval = Some(duration(iter, flag)?),
            "--hold-delay" => opts.hold_delay = Some(duration(iter, flag)?),
            "--window" => opts.snapshot_window = Some(duration(iter, flag)?),
            "--log-level" => {
                let raw = required(iter, flag)?;
                opts.log_level = Some(LogLevel::from_str(&raw).map_err(|_| {
                    Error::Config(format!("invalid log level '{raw}'"))
                })?);
            }
            "--log-file" => opts.log_file = Some(required(iter, flag)?),
            other => {
                return Err(Error::Config(format!("unknown option '{other}'")));
            }
        }
    }
    Ok(opts)
}

fn required<'a, I>(iter: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = &'a String>,
{
    iter.next()
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Config(format!("missing value for '{flag}'")))
}

fn duration<'a, I>(iter: &mut I, flag: &str) -> Result<Duration>
where
    I: Iterator<Item = &'a String>,
{
    let raw = required(iter, flag)?;
    humantime::parse_duration(&raw)
        .map_err(|err| Error::Config(format!("invalid duration for '{flag}': {err}")))
}
