use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

use crate::{Error, Result};

use super::{Config, CONFIG_DIR_NAME, CONFIG_FILE_NAME};

pub fn load_or_default() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        cfg.save_to_path(&path)?;
        super::validate(&cfg)?;
        return Ok(cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(path)?;
    let cfg = parse(&raw)?;
    super::validate(&cfg)?;
    Ok(cfg)
}

pub fn save(config: &Config) -> Result<()> {
    let path = config_path()?;
    save_to_path(config, &path)
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = format!(
        "# simdeck config\n\
local_address = \"{}\"\n\
peer_address = \"{}\"\n\
receive_port = \"{}\"\n\
send_port = \"{}\"\n\
poll_interval = \"{}\"\n\
hold_delay = \"{}\"\n\
receive_timeout = \"{}\"\n\
log_level = \"{}\"\n\
log_file = {}\n",
        config.connection.local_address,
        config.connection.peer_address,
        config.connection.receive_port,
        config.connection.send_port,
        humantime::format_duration(Duration::from_millis(config.poll_interval_ms)),
        humantime::format_duration(Duration::from_millis(config.hold_delay_ms)),
        humantime::format_duration(Duration::from_millis(config.receive_timeout_ms)),
        config.log_level,
        config
            .log_file
            .as_deref()
            .map(|p| format!("\"{p}\""))
            .unwrap_or_else(|| "null".into()),
    );
    fs::write(path, contents)?;
    Ok(())
}

pub fn parse(raw: &str) -> Result<Config> {
    let mut cfg = Config::default();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            Error::Parse(format!("invalid config line {}: '{}'", idx + 1, line))
        })?;

        let key = key.trim();
        let value = value.trim().trim_matches('"');
        match key {
            "local_address" => cfg.connection.local_address = value.to_string(),
            "peer_address" => cfg.connection.peer_address = value.to_string(),
            "receive_port" => cfg.connection.receive_port = value.to_string(),
            "send_port" => cfg.connection.send_port = value.to_string(),
            "poll_interval" => cfg.poll_interval_ms = parse_duration_ms(value, idx + 1)?,
            "hold_delay" => cfg.hold_delay_ms = parse_duration_ms(value, idx + 1)?,
            "receive_timeout" => cfg.receive_timeout_ms = parse_duration_ms(value, idx + 1)?,
            "log_level" => cfg.log_level = value.to_string(),
            "log_file" => {
                cfg.log_file = if value == "null" || value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            other => {
                return Err(Error::Parse(format!(
                    "unknown config key '{other}' on line {}",
                    idx + 1
                )));
            }
        }
    }

    Ok(cfg)
}

/// Accept either a bare millisecond count (`10`) or a humantime span
/// (`10ms`, `1s 500ms`).
fn parse_duration_ms(value: &str, line: usize) -> Result<u64> {
    if let Ok(ms) = value.parse::<u64>() {
        return Ok(ms);
    }
    humantime::parse_duration(value)
        .map(|d| d.as_millis() as u64)
        .map_err(|err| Error::Parse(format!("invalid duration on line {line}: {err}")))
}

fn config_path() -> Result<PathBuf> {
    let base = BaseDirs::new()
        .ok_or_else(|| Error::Config("could not determine home directory".to_string()))?;
    Ok(base
        .home_dir()
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = Config::default();
        cfg.connection.peer_address = "192.168.0.5".into();
        cfg.connection.send_port = "dynamic".into();
        cfg.poll_interval_ms = 25;
        cfg.log_file = Some("/tmp/simdeck.log".into());
        cfg.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn parses_durations_in_both_forms() {
        let cfg = parse("poll_interval = 25\nhold_delay = \"2s\"\n").unwrap();
        assert_eq!(cfg.poll_interval_ms, 25);
        assert_eq!(cfg.hold_delay_ms, 2000);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_lines() {
        assert!(parse("bogus_key = 1\n").is_err());
        assert!(parse("no equals sign\n").is_err());
        assert!(parse("poll_interval = \"soon\"\n").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
