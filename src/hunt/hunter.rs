//! The allocation loop.
//!
//! Sequential by construction: one provider call in flight at a time, a
//! cooperative stop flag checked between iterations and on every sleep tick.

use super::connect::AccountSlot;
use super::state::{HuntState, ReleaseReason};
use crate::config::HunterConfig;
use crate::error::{HunterError, Result};
use crate::models::{Classification, FloatingIp, TargetSubnets};
use crate::notify::Notifier;
use crate::openstack::{NetworkProvider, ProviderError};
use crate::storage::{Action, StatsDb};
use chrono::{DateTime, Utc};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLEEP_TICK: Duration = Duration::from_secs(1);

/// Sleep for `duration` in 1s ticks. Returns false if `stop` was raised.
pub async fn sleep_or_stop(duration: Duration, stop: &AtomicBool) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let tick = remaining.min(SLEEP_TICK);
        tokio::time::sleep(tick).await;
        remaining -= tick;
    }
    !stop.load(Ordering::SeqCst)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HuntSummary {
    pub attempts: u64,
    pub captured: Vec<String>,
    pub elapsed: Duration,
    /// True when the stop flag ended the hunt.
    pub stopped: bool,
}

pub struct Hunter<P> {
    cfg: HunterConfig,
    targets: TargetSubnets,
    slots: Vec<AccountSlot<P>>,
    next_slot: usize,
    db: StatsDb,
    notifier: Notifier,
    stop: Arc<AtomicBool>,
    rng: StdRng,
    total: u64,
    /// Extra wait requested by the last unclassified error.
    backoff: Option<Duration>,
}

impl<P: NetworkProvider> Hunter<P> {
    pub fn new(
        cfg: HunterConfig,
        slots: Vec<AccountSlot<P>>,
        db: StatsDb,
        notifier: Notifier,
        stop: Arc<AtomicBool>,
    ) -> Result<Hunter<P>> {
        let targets = cfg.targets();
        if targets.is_empty() {
            return Err(HunterError::Config("no valid target subnets configured".into()));
        }
        if slots.is_empty() {
            return Err(HunterError::NoAccounts("no account connected".into()));
        }
        Ok(Hunter {
            cfg,
            targets,
            slots,
            next_slot: 0,
            db,
            notifier,
            stop,
            rng: StdRng::from_os_rng(),
            total: 0,
            backoff: None,
        })
    }

    pub fn slots(&self) -> &[AccountSlot<P>] {
        &self.slots
    }

    pub fn db(&self) -> &StatsDb {
        &self.db
    }

    pub fn total_attempts(&self) -> u64 {
        self.total
    }

    /// Error backoff waiting to be slept before the next attempt.
    pub fn pending_backoff(&self) -> Option<Duration> {
        self.backoff
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) -> bool {
        if !duration.is_zero() {
            log::debug!("sleep {:.0}s ...", duration.as_secs_f64());
        }
        sleep_or_stop(duration, &self.stop).await
    }

    /// Pick the next account that is not cooling down and is below its floating IP limit.
    pub async fn select_account(&mut self) -> Option<usize> {
        self.select_account_at(Utc::now()).await
    }

    pub async fn select_account_at(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let n = self.slots.len();
        for offset in 0..n {
            let idx = (self.next_slot + offset) % n;
            let slot = &mut self.slots[idx];
            if slot.stats.on_cooldown(now) {
                log::debug!("[{}] on cooldown", slot.account.name);
                continue;
            }
            let name = slot.account.name.clone();
            let max_fip = slot.account.max_fip;
            let counted = slot.provider.list_floating_ips().await;
            match counted {
                Ok(fips) if fips.len() < max_fip => {
                    log::debug!("[{name}] FIP: {}/{max_fip}", fips.len());
                    self.next_slot = idx + 1;
                    return Some(idx);
                }
                Ok(fips) => log::info!("[{name}] FIP limit reached: {}/{max_fip}", fips.len()),
                Err(e) if e.cooldown_minutes().is_some() => self.record_error(idx, &e),
                Err(e) => log::warn!("[{name}] cannot count floating IPs: {e}"),
            }
        }
        None
    }

    fn pick_subnet_id(&mut self) -> Option<String> {
        if !self.cfg.use_subnet_id || self.cfg.subnet_ids.is_empty() {
            return None;
        }
        let i = self.rng.random_range(0..self.cfg.subnet_ids.len());
        Some(self.cfg.subnet_ids[i].clone())
    }

    /// Count the error against the account: cooldown for auth/quota, backoff otherwise.
    fn record_error(&mut self, idx: usize, e: &ProviderError) {
        let slot = &mut self.slots[idx];
        slot.stats.errors += 1;
        match e.cooldown_minutes() {
            Some(window) => {
                let minutes = self.rng.random_range(window);
                let until = slot.stats.set_cooldown(Utc::now(), minutes);
                log::warn!(
                    "[{}] {e} -> cooldown {minutes} min (until {})",
                    slot.account.name,
                    until.format("%H:%M:%S")
                );
            }
            None => {
                log::error!("[{}] {}: {e}", slot.account.name, "provider error".red());
                self.backoff = Some(self.cfg.delays.error(&mut self.rng));
            }
        }
    }

    fn record(&self, ip: &str, account: &str, action: Action, subnet: Option<&str>) {
        if let Err(e) = self.db.log_ip(ip, account, action, subnet) {
            log::warn!("stats db: {e}");
        }
    }

    /// Advance one state.
    ///
    /// # Arguments
    ///
    /// * `state` - Current state of the attempt; `Idle` and `Done` are returned unchanged
    ///
    /// # Returns
    ///
    /// The next state. Provider errors never escape: they are counted against the
    /// account and turn into `Idle` or `Releasing`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use fip_hunter::hunt::{HuntState, Hunter};
    /// # use fip_hunter::openstack::OpenStackClient;
    /// # async fn demo(hunter: &mut Hunter<OpenStackClient>) {
    /// let mut state = HuntState::Requesting { slot: 0 };
    /// while !state.is_settled() {
    ///     state = hunter.step(state).await;
    /// }
    /// # }
    /// ```
    pub async fn step(&mut self, state: HuntState) -> HuntState {
        log::trace!("state {state}");
        match state {
            HuntState::Idle => HuntState::Idle,
            HuntState::Requesting { slot } => self.request(slot).await,
            HuntState::Classifying { slot, fip } => self.classify(slot, fip),
            HuntState::Binding { slot, fip, subnet } => {
                let bound = self.bind(slot, &fip).await;
                match bound {
                    Ok(true) => {
                        let ip = fip.address().unwrap_or_default().to_string();
                        self.captured(slot, &ip, &subnet.to_string()).await;
                        HuntState::Done { ip }
                    }
                    Ok(false) => {
                        log::warn!(
                            "[{}] bind of {} not confirmed",
                            self.slots[slot].account.name,
                            fip.address().unwrap_or("-")
                        );
                        HuntState::Releasing {
                            slot,
                            fip,
                            reason: ReleaseReason::BindFailed,
                        }
                    }
                    Err(e) => {
                        self.record_error(slot, &e);
                        HuntState::Releasing {
                            slot,
                            fip,
                            reason: ReleaseReason::BindFailed,
                        }
                    }
                }
            }
            HuntState::Releasing { slot, fip, reason } => {
                self.release(slot, &fip, reason).await;
                HuntState::Idle
            }
            HuntState::Done { ip } => HuntState::Done { ip },
        }
    }

    async fn request(&mut self, idx: usize) -> HuntState {
        let subnet_id = self.pick_subnet_id();
        self.total += 1;
        let total = self.total;
        let slot = &mut self.slots[idx];
        slot.stats.attempts += 1;
        log::info!(
            "[{}] attempt #{} (total {total}){}",
            slot.account.name,
            slot.stats.attempts,
            subnet_id
                .as_deref()
                .map(|s| format!(" -> subnet {s}"))
                .unwrap_or_default()
        );
        let net_id = slot.target.ext_net.id.clone();
        let created = slot
            .provider
            .create_floating_ip(&net_id, subnet_id.as_deref())
            .await;
        match created {
            Ok(fip) => HuntState::Classifying { slot: idx, fip },
            Err(e) => {
                self.record_error(idx, &e);
                HuntState::Idle
            }
        }
    }

    fn classify(&mut self, idx: usize, fip: FloatingIp) -> HuntState {
        let name = self.slots[idx].account.name.clone();
        let classification = fip.address().and_then(|ip| self.targets.classify_str(ip));
        let Some(classification) = classification else {
            log::warn!("[{name}] floating IP {} without a valid address", fip.id);
            return HuntState::Releasing {
                slot: idx,
                fip,
                reason: ReleaseReason::Malformed,
            };
        };
        let ip = fip.address().unwrap_or_default().to_string();
        let subnet = classification.subnet().map(|s| s.to_string());
        log::info!(
            "[{name}] got {} (subnet: {})",
            ip.yellow(),
            subnet.as_deref().unwrap_or("???")
        );
        self.record(&ip, &name, Action::Get, subnet.as_deref());

        match classification {
            Classification::Target(subnet) => {
                log::info!("[{name}] {} {ip} in {subnet}", "TARGET".green());
                HuntState::Binding {
                    slot: idx,
                    fip,
                    subnet,
                }
            }
            Classification::NotTarget => HuntState::Releasing {
                slot: idx,
                fip,
                reason: ReleaseReason::NotTarget,
            },
        }
    }

    /// Associate and poll until the provider reports the port.
    async fn bind(&mut self, idx: usize, fip: &FloatingIp) -> std::result::Result<bool, ProviderError> {
        let polls = self.cfg.delays.bind_poll_attempts;
        let interval = self.cfg.delays.bind_poll_interval();
        let slot = &mut self.slots[idx];
        let port_id = slot.target.port.id.clone();
        log::info!(
            "[{}] binding {} to {} (port {port_id})",
            slot.account.name,
            fip.address().unwrap_or("-"),
            slot.target.server.name
        );
        slot.provider.update_floating_ip(&fip.id, &port_id).await?;
        for _ in 0..polls {
            tokio::time::sleep(interval).await;
            let current = slot.provider.get_floating_ip(&fip.id).await?;
            if current.is_bound_to(&port_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn captured(&mut self, idx: usize, ip: &str, subnet: &str) {
        let slot = &mut self.slots[idx];
        slot.stats.successes += 1;
        let name = slot.account.name.clone();
        let server = slot.target.server.name.clone();
        log::info!("[{name}] {} {} bound to {server}", "SUCCESS".green().bold(), ip);

        self.record(ip, &name, Action::Bind, Some(subnet));
        if let Err(e) = self.db.capture(ip, &name, &server, subnet) {
            log::warn!("stats db: {e}");
        }
        self.notifier
            .send(
                "IP captured",
                &format!("IP: {ip}\nSubnet: {subnet}\nAccount: {name}\nVM: {server}"),
                true,
            )
            .await;
    }

    /// Best-effort delete; errors are logged and swallowed.
    ///
    /// Only confirmed releases of a known address are written to the stats log.
    async fn release(&mut self, idx: usize, fip: &FloatingIp, reason: ReleaseReason) {
        let slot = &mut self.slots[idx];
        let name = slot.account.name.clone();
        let shown = fip.address().unwrap_or(&fip.id).to_string();
        let deleted = slot.provider.delete_floating_ip(&fip.id).await;
        let released = match deleted {
            Ok(()) => {
                log::info!("[{name}] released {shown} ({reason})");
                true
            }
            Err(e) if e.is_not_found() => {
                log::debug!("[{name}] {shown} already gone");
                true
            }
            Err(e) => {
                log::warn!("[{name}] release of {shown} failed: {e}");
                false
            }
        };
        if let (true, Some(ip)) = (released, fip.address()) {
            self.record(ip, &name, Action::Del, None);
        }
    }

    /// Run one attempt on `slot` from allocation to a settled state.
    ///
    /// Returns the captured address on a successful bind.
    pub async fn attempt(&mut self, slot: usize) -> Option<String> {
        let mut state = HuntState::Requesting { slot };
        loop {
            state = self.step(state).await;
            match state {
                HuntState::Idle => return None,
                HuntState::Done { ip } => return Some(ip),
                _ => {}
            }
        }
    }

    /// Hunt until a capture (with `stop_on_success`), `max_attempts`, or the stop flag.
    ///
    /// Waits `idle_wait_secs` when no account is available, the pending error
    /// backoff after a failed attempt, and a jittered attempt delay between iterations.
    ///
    /// # Returns
    ///
    /// A [`HuntSummary`] with the attempt count and every captured address.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo() -> fip_hunter::error::Result<()> {
    /// use fip_hunter::config::HunterConfig;
    /// use fip_hunter::hunt::{connect_accounts, Hunter};
    /// use fip_hunter::notify::Notifier;
    /// use fip_hunter::openstack::OpenStackClient;
    /// use fip_hunter::storage::StatsDb;
    /// use std::path::Path;
    /// use std::sync::{atomic::AtomicBool, Arc};
    ///
    /// let cfg = HunterConfig::load(Path::new("hunter_config.json"))?;
    /// let slots = connect_accounts(&cfg.accounts, OpenStackClient::new).await;
    /// let db = StatsDb::open(Path::new("hunter_stats.db"))?;
    /// let notifier = Notifier::new(&cfg.telegram);
    /// let stop = Arc::new(AtomicBool::new(false));
    /// let mut hunter = Hunter::new(cfg, slots, db, notifier, stop)?;
    /// let summary = hunter.run().await;
    /// println!("{} attempts, captured {:?}", summary.attempts, summary.captured);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&mut self) -> HuntSummary {
        let started = Instant::now();
        let mut captured = Vec::new();
        log::info!(
            "Hunting {} with {} accounts",
            self.targets.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", "),
            self.slots.len()
        );
        self.notifier
            .send(
                "Hunt started",
                &format!("Accounts: {}", self.slots.len()),
                false,
            )
            .await;

        loop {
            if self.is_stopped() {
                break;
            }
            if let Some(max) = self.cfg.max_attempts {
                if self.total >= max {
                    log::info!("Reached max attempts ({max})");
                    break;
                }
            }
            let Some(slot) = self.select_account().await else {
                let idle = self.cfg.delays.idle().max(SLEEP_TICK);
                log::warn!("All accounts busy, waiting {}s ...", idle.as_secs());
                if !self.sleep(idle).await {
                    break;
                }
                continue;
            };

            if let Some(ip) = self.attempt(slot).await {
                captured.push(ip.clone());
                if self.cfg.stop_on_success {
                    log::info!("{} {ip}", "CAPTURED:".green().bold());
                    break;
                }
            }

            if let Some(backoff) = self.backoff.take() {
                if !self.sleep(backoff).await {
                    break;
                }
            }
            let delay = self.cfg.delays.attempt(&mut self.rng);
            if !self.sleep(delay).await {
                break;
            }
        }

        let summary = HuntSummary {
            attempts: self.total,
            captured,
            elapsed: started.elapsed(),
            stopped: self.is_stopped(),
        };
        log::info!(
            "Total: {} attempts, {} captured in {:.0}s",
            summary.attempts,
            summary.captured.len(),
            summary.elapsed.as_secs_f64()
        );
        summary
    }
}
