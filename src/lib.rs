//! fip-hunter library
//!
//! Requests floating IPs from an OpenStack cloud until one falls inside a
//! target subnet, then binds it to a VM port. Non-matching addresses are
//! released.
//!
//! # Module Structure
//!
//! - [`models`] - IPv4/CIDR handling, accounts and cloud resource types
//! - [`openstack`] - Keystone/Neutron/Nova client behind the [`openstack::NetworkProvider`] trait
//! - [`hunt`] - the allocation loop
//! - [`storage`] - SQLite statistics
//! - [`notify`] - Telegram notifications
//! - [`output`] - report formatting
//! - [`config`] - JSON config
//! - [`cli`] - command line definitions

pub mod cli;
pub mod config;
pub mod error;
pub mod hunt;
pub mod models;
pub mod notify;
pub mod openstack;
pub mod output;
pub mod storage;

use cli::{Cli, Command};
use config::HunterConfig;
use error::{HunterError, Result};
use hunt::{connect_accounts, external_subnets, HuntSummary, Hunter};
use notify::Notifier;
use openstack::OpenStackClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storage::{Action, StatsDb};

/// Load and validate the config for a hunt.
pub fn load_hunt_config(cli: &Cli) -> Result<HunterConfig> {
    let cfg = HunterConfig::load(&cli.config)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Connect every account and run the loop until capture, max attempts or Ctrl-C.
pub async fn hunt(cfg: HunterConfig, db: StatsDb, stop: Arc<AtomicBool>) -> Result<HuntSummary> {
    let slots = connect_accounts(&cfg.accounts, OpenStackClient::new).await;
    if slots.is_empty() {
        return Err(HunterError::NoAccounts(
            "none of the enabled accounts could connect".into(),
        ));
    }
    log::info!("Connected accounts: {}", slots.len());
    let notifier = Notifier::new(&cfg.telegram);
    let mut hunter = Hunter::new(cfg, slots, db, notifier, stop)?;
    Ok(hunter.run().await)
}

/// Raise `stop` on Ctrl-C.
pub fn spawn_ctrl_c(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Stopping (Ctrl+C) ...");
            stop.store(true, Ordering::SeqCst);
        }
    });
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command() {
        Command::Hunt {
            max_attempts,
            no_stop,
        } => {
            let mut cfg = load_hunt_config(&cli)?;
            if max_attempts.is_some() {
                cfg.max_attempts = max_attempts;
            }
            if no_stop {
                cfg.stop_on_success = false;
            }
            let db = StatsDb::open(&cli.db)?;
            let stop = Arc::new(AtomicBool::new(false));
            spawn_ctrl_c(stop.clone());
            let summary = hunt(cfg, db, stop).await?;
            for ip in &summary.captured {
                println!("{ip}");
            }
        }
        Command::Check { ips } => {
            let cfg = HunterConfig::load(&cli.config)?;
            let targets = cfg.targets();
            if targets.is_empty() {
                return Err(HunterError::Config("no valid target subnets configured".into()));
            }
            for ip in &ips {
                println!("{}", output::check_line(&targets, ip));
            }
        }
        Command::Subnets => {
            let cfg = HunterConfig::load(&cli.config)?;
            let targets = cfg.targets();
            let mut slots = connect_accounts(&cfg.accounts, OpenStackClient::new).await;
            if slots.is_empty() {
                return Err(HunterError::NoAccounts("no account could connect".into()));
            }
            for slot in slots.iter_mut() {
                let subnets = external_subnets(&mut slot.provider, &slot.target.ext_net).await;
                for line in output::subnet_lines(&slot.account.name, &subnets, &targets) {
                    println!("{line}");
                }
            }
        }
        Command::Stats => {
            let db = StatsDb::open(&cli.db)?;
            output::print_stats(
                &db.subnet_hits()?,
                db.count_action(Action::Get)?,
                db.count_action(Action::Del)?,
                db.count_captures()?,
            );
        }
        Command::Captures { limit } => {
            let db = StatsDb::open(&cli.db)?;
            output::print_captures(&db.recent_captures(limit)?);
        }
        Command::Init { force } => {
            if cli.config.exists() && !force {
                return Err(HunterError::Config(format!(
                    "{} already exists, use --force to overwrite",
                    cli.config.display()
                )));
            }
            HunterConfig::example().save(&cli.config)?;
            println!("Wrote {}", cli.config.display());
        }
    }
    Ok(())
}
