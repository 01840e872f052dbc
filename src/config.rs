//! Hunter configuration: accounts, target subnets, pacing and notification settings.
//!
//! Stored as pretty-printed JSON. Every field has a default so partial files load.

use crate::error::{HunterError, Result};
use crate::models::{Account, TargetSubnets};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "hunter_config.json";
pub const DB_FILE: &str = "hunter_stats.db";
pub const CONFIG_ENV: &str = "FIP_HUNTER_CONFIG";
pub const DB_ENV: &str = "FIP_HUNTER_DB";

/// Pacing between calls. All values in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Delays {
    pub attempt_min: f64,
    pub attempt_max: f64,
    /// Random spread applied to the attempt delay, in percent.
    pub jitter: f64,
    /// Lower bound for the attempt delay after jitter.
    pub attempt_floor: f64,
    pub error_min: f64,
    pub error_max: f64,
    /// Wait when every account is cooling down or at its floating IP limit.
    pub idle_wait_secs: u64,
    pub bind_poll_attempts: u32,
    pub bind_poll_interval_secs: f64,
}

impl Default for Delays {
    fn default() -> Self {
        Delays {
            attempt_min: 15.0,
            attempt_max: 35.0,
            jitter: 25.0,
            attempt_floor: 10.0,
            error_min: 60.0,
            error_max: 180.0,
            idle_wait_secs: 60,
            bind_poll_attempts: 10,
            bind_poll_interval_secs: 1.0,
        }
    }
}

/// Longest single wait; larger configured values are capped.
pub const MAX_DELAY_SECS: f64 = 86_400.0;

fn bounded(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_DELAY_SECS)
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if hi - lo <= f64::EPSILON {
        lo
    } else {
        rng.random_range(lo..=hi)
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(bounded(value)).unwrap_or(Duration::ZERO)
}

impl Delays {
    /// Delay between iterations, with jitter, never below `attempt_floor`.
    pub fn attempt<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let base = uniform(rng, bounded(self.attempt_min), bounded(self.attempt_max));
        let spread = base * (self.jitter / 100.0) * uniform(rng, -1.0, 1.0);
        secs((base + spread).max(self.attempt_floor))
    }

    /// Backoff after an unclassified provider error.
    pub fn error<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        secs(uniform(rng, bounded(self.error_min), bounded(self.error_max)))
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_wait_secs)
    }

    pub fn bind_poll_interval(&self) -> Duration {
        secs(self.bind_poll_interval_secs)
    }

    /// No waiting at all; used by tests and dry runs.
    pub fn zero() -> Delays {
        Delays {
            attempt_min: 0.0,
            attempt_max: 0.0,
            jitter: 0.0,
            attempt_floor: 0.0,
            error_min: 0.0,
            error_max: 0.0,
            idle_wait_secs: 0,
            bind_poll_attempts: 3,
            bind_poll_interval_secs: 0.0,
        }
    }
}

/// Telegram bot settings; both fields empty disables notifications.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Telegram {
    pub token: String,
    pub chat: String,
}

impl Telegram {
    pub fn is_configured(&self) -> bool {
        !self.token.trim().is_empty() && !self.chat.trim().is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HunterConfig {
    pub accounts: Vec<Account>,
    /// Target CIDRs used to filter allocated addresses.
    pub subnets: Vec<String>,
    /// External subnet ids to request from directly.
    pub subnet_ids: Vec<String>,
    pub use_subnet_id: bool,
    pub telegram: Telegram,
    pub stop_on_success: bool,
    /// Total attempts before the hunt gives up; `None` runs until stopped.
    pub max_attempts: Option<u64>,
    pub delays: Delays,
}

impl Default for HunterConfig {
    fn default() -> Self {
        HunterConfig {
            accounts: vec![],
            subnets: vec![],
            subnet_ids: vec![],
            use_subnet_id: false,
            telegram: Telegram::default(),
            stop_on_success: true,
            max_attempts: None,
            delays: Delays::default(),
        }
    }
}

impl HunterConfig {
    /// Read a config file, reporting the JSON path of any parse error.
    pub fn load(path: &Path) -> Result<HunterConfig> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            HunterError::Config(format!("Cannot read config {}: {e}", path.display()))
        })?;
        let mut de = serde_json::Deserializer::from_str(&json);
        let cfg: HunterConfig = serde_path_to_error::deserialize(&mut de).map_err(|e| {
            HunterError::Config(format!(
                "Error parsing {}: path={} error={}",
                path.display(),
                e.path(),
                e
            ))
        })?;
        log::info!(
            "Loaded config {}: {} accounts, {} subnets",
            path.display(),
            cfg.accounts.len(),
            cfg.subnets.len()
        );
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Wrote config {}", path.display());
        Ok(())
    }

    pub fn targets(&self) -> TargetSubnets {
        TargetSubnets::parse(&self.subnets)
    }

    pub fn enabled_accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter().filter(|a| a.enabled)
    }

    /// Check what the hunt cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.enabled_accounts().next().is_none() {
            return Err(HunterError::Config("no enabled accounts configured".into()));
        }
        if self.targets().is_empty() {
            return Err(HunterError::Config("no valid target subnets configured".into()));
        }
        let d = &self.delays;
        let delays = [
            ("attempt_min", d.attempt_min),
            ("attempt_max", d.attempt_max),
            ("jitter", d.jitter),
            ("attempt_floor", d.attempt_floor),
            ("error_min", d.error_min),
            ("error_max", d.error_max),
            ("bind_poll_interval_secs", d.bind_poll_interval_secs),
        ];
        for (name, value) in delays {
            if !(0.0..=MAX_DELAY_SECS).contains(&value) {
                return Err(HunterError::Config(format!(
                    "delays.{name} must be between 0 and {MAX_DELAY_SECS}, got {value}"
                )));
            }
        }
        if self.use_subnet_id && self.subnet_ids.is_empty() {
            log::warn!("use_subnet_id is set but subnet_ids is empty, allocating without subnet");
        }
        Ok(())
    }

    /// A starting config for `init`, with one placeholder account.
    pub fn example() -> HunterConfig {
        let mut acc = Account::new("main");
        acc.username = "user@example.com".to_string();
        acc.project_id = "project-id".to_string();
        acc.server = "my-vm".to_string();
        HunterConfig {
            accounts: vec![acc],
            subnets: vec!["95.163.248.0/24".to_string()],
            ..Default::default()
        }
    }
}
