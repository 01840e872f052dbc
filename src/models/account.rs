//! Cloud account data model and runtime counters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_auth_url() -> String {
    "https://infra.mail.ru:35357/v3/".to_string()
}

fn default_user_domain() -> String {
    "users".to_string()
}

fn default_region() -> String {
    "RegionOne".to_string()
}

fn default_max_fip() -> usize {
    2
}

fn default_enabled() -> bool {
    true
}

/// Credentials and target VM for one cloud project, as stored in the config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub project_id: String,
    /// VM name or id the captured address is bound to.
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_user_domain")]
    pub user_domain: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// External network name; empty means auto-detect.
    #[serde(default)]
    pub ext_net: String,
    /// Port id; empty means the VM's first (preferably ACTIVE) port.
    #[serde(default)]
    pub port_id: String,
    #[serde(default = "default_max_fip")]
    pub max_fip: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Account {
    pub fn new(name: &str) -> Account {
        Account {
            name: name.to_string(),
            username: String::new(),
            password: String::new(),
            project_id: String::new(),
            server: String::new(),
            auth_url: default_auth_url(),
            user_domain: default_user_domain(),
            region: default_region(),
            ext_net: String::new(),
            port_id: String::new(),
            max_fip: default_max_fip(),
            enabled: default_enabled(),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}@{}, vm={}, max_fip={}{})",
            self.name,
            self.username,
            self.project_id,
            self.server,
            self.max_fip,
            if self.enabled { "" } else { ", disabled" }
        )
    }
}

/// Runtime counters for an account. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct AccountStats {
    pub attempts: u64,
    pub successes: u64,
    pub errors: u64,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl AccountStats {
    pub fn on_cooldown(&self, now: DateTime<Utc>) -> bool {
        matches!(self.cooldown_until, Some(until) if now < until)
    }

    /// Suspend the account for `minutes` from `now`.
    ///
    /// An existing longer cooldown is kept.
    pub fn set_cooldown(&mut self, now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        let until = now + Duration::minutes(minutes);
        let until = match self.cooldown_until {
            Some(current) if current > until => current,
            _ => until,
        };
        self.cooldown_until = Some(until);
        until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_defaults_from_json() {
        let acc: Account = serde_json::from_str(r#"{"name": "main"}"#).unwrap();
        assert_eq!(acc, Account::new("main"));
        assert_eq!(acc.auth_url, "https://infra.mail.ru:35357/v3/");
        assert_eq!(acc.max_fip, 2);
        assert!(acc.enabled);
    }

    #[test]
    fn test_cooldown_window() {
        let now = Utc::now();
        let mut stats = AccountStats::default();
        assert!(!stats.on_cooldown(now));

        let until = stats.set_cooldown(now, 20);
        assert_eq!(until, now + Duration::minutes(20));
        assert!(stats.on_cooldown(now));
        assert!(stats.on_cooldown(now + Duration::minutes(19)));
        assert!(!stats.on_cooldown(now + Duration::minutes(20)));
    }

    #[test]
    fn test_cooldown_keeps_longer_window() {
        let now = Utc::now();
        let mut stats = AccountStats::default();
        stats.set_cooldown(now, 40);
        stats.set_cooldown(now, 15);
        assert!(stats.on_cooldown(now + Duration::minutes(30)));
    }
}
