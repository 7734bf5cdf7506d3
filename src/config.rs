use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use tracing::warn;

use crate::limits::DEFAULT_EFFECT_QUEUE_CAPACITY;

/// Runtime settings, read once at startup from `STAYD_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Persist the store to `data_dir/stayd.journal` and replay it on start.
    pub journal: bool,
    /// UTC time of day the expiration sweep runs.
    pub sweep_at: NaiveTime,
    pub effect_queue_capacity: usize,
    /// Upper bound on waiting for queued effects at shutdown.
    pub shutdown_drain: Duration,
    pub metrics_port: Option<u16>,
    /// Journal appends between compactions.
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            journal: true,
            sweep_at: NaiveTime::MIN,
            effect_queue_capacity: DEFAULT_EFFECT_QUEUE_CAPACITY,
            shutdown_drain: Duration::from_secs(10),
            metrics_port: None,
            compact_threshold: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset variables take the
    /// default; unparseable ones are logged and take the default too.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let sweep_at = match lookup("STAYD_SWEEP_AT") {
            Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").unwrap_or_else(|_| {
                warn!(var = "STAYD_SWEEP_AT", value = %raw, "expected HH:MM, using default");
                defaults.sweep_at
            }),
            None => defaults.sweep_at,
        };
        let journal = match lookup("STAYD_JOURNAL") {
            Some(raw) => parse_switch(&raw).unwrap_or_else(|| {
                warn!(var = "STAYD_JOURNAL", value = %raw, "expected on/off, using default");
                defaults.journal
            }),
            None => defaults.journal,
        };

        Self {
            data_dir: lookup("STAYD_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            journal,
            sweep_at,
            effect_queue_capacity: parsed(&lookup, "STAYD_EFFECT_QUEUE")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.effect_queue_capacity),
            shutdown_drain: parsed(&lookup, "STAYD_SHUTDOWN_DRAIN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_drain),
            metrics_port: parsed(&lookup, "STAYD_METRICS_PORT"),
            compact_threshold: parsed(&lookup, "STAYD_COMPACT_THRESHOLD")
                .filter(|&n: &u64| n > 0)
                .unwrap_or(defaults.compact_threshold),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("stayd.journal")
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "invalid value, using default");
            None
        }
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" => Some(false),
        _ => None,
    }
}
