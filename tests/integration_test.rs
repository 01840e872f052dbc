//! Integration tests for fip-hunter
//!
//! These run the allocation loop against a scripted in-memory provider.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use fip_hunter::config::{Delays, HunterConfig};
use fip_hunter::hunt::{
    connect_accounts, find_subnet_by_cidr, resolve_target, AccountSlot, HuntState, Hunter,
    ReleaseReason, Target,
};
use fip_hunter::models::{Account, AccountStats, FloatingIp, Network, Port, Server, Subnet};
use fip_hunter::notify::Notifier;
use fip_hunter::openstack::{NetworkProvider, ProviderError};
use fip_hunter::storage::{Action, StatsDb};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

const PORT_ID: &str = "p-active";
const EXT_NET: &str = "298a-ext";

/// What the next allocation returns.
enum Alloc {
    Addr(&'static str),
    NoAddr,
    Quota,
    Auth,
    ServerError,
}

struct ScriptedProvider {
    script: VecDeque<Alloc>,
    held: Vec<FloatingIp>,
    created: Vec<String>,
    deleted: Vec<String>,
    updates: Vec<(String, String)>,
    subnet_requests: Vec<Option<String>>,
    bind_confirms: bool,
    fail_update: bool,
    fail_poll: bool,
    fail_delete: bool,
    next_id: u32,
}

impl ScriptedProvider {
    fn new(script: Vec<Alloc>) -> ScriptedProvider {
        ScriptedProvider {
            script: script.into(),
            held: vec![],
            created: vec![],
            deleted: vec![],
            updates: vec![],
            subnet_requests: vec![],
            bind_confirms: true,
            fail_update: false,
            fail_poll: false,
            fail_delete: false,
            next_id: 0,
        }
    }

    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("fip-{:04}", self.next_id)
    }
}

#[async_trait]
impl NetworkProvider for ScriptedProvider {
    async fn authorize(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn find_server(&mut self, name_or_id: &str) -> Result<Option<Server>, ProviderError> {
        if name_or_id == "missing-vm" {
            return Ok(None);
        }
        Ok(Some(Server {
            id: "srv-1".into(),
            name: name_or_id.into(),
            status: Some("ACTIVE".into()),
        }))
    }

    async fn get_port(&mut self, port_id: &str) -> Result<Port, ProviderError> {
        Ok(Port {
            id: port_id.into(),
            status: "ACTIVE".into(),
            ..Default::default()
        })
    }

    async fn list_ports(&mut self, device_id: &str) -> Result<Vec<Port>, ProviderError> {
        Ok(vec![
            Port {
                id: "p-down".into(),
                status: "DOWN".into(),
                device_id: device_id.into(),
                ..Default::default()
            },
            Port {
                id: PORT_ID.into(),
                status: "ACTIVE".into(),
                device_id: device_id.into(),
                ..Default::default()
            },
        ])
    }

    async fn list_networks(&mut self) -> Result<Vec<Network>, ProviderError> {
        let json = std::fs::read_to_string("src/tests/test_data/neutron_networks_01.json")
            .expect("Error reading networks fixture");
        let value: serde_json::Value = serde_json::from_str(&json).expect("Error parsing fixture");
        Ok(serde_json::from_value(value["networks"].clone()).expect("Error parsing networks"))
    }

    async fn get_subnet(&mut self, subnet_id: &str) -> Result<Subnet, ProviderError> {
        let cidr = match subnet_id {
            "s-ext-1" => "95.163.248.0/24",
            "s-ext-2" => "89.208.84.0/22",
            _ => return Err(ProviderError::NotFound(subnet_id.into())),
        };
        Ok(Subnet {
            id: subnet_id.into(),
            cidr: cidr.into(),
            network_id: EXT_NET.into(),
            ..Default::default()
        })
    }

    async fn list_floating_ips(&mut self) -> Result<Vec<FloatingIp>, ProviderError> {
        Ok(self.held.clone())
    }

    async fn create_floating_ip(
        &mut self,
        network_id: &str,
        subnet_id: Option<&str>,
    ) -> Result<FloatingIp, ProviderError> {
        assert_eq!(network_id, EXT_NET);
        self.subnet_requests.push(subnet_id.map(str::to_string));
        let next = self.script.pop_front().unwrap_or(Alloc::Addr("10.0.0.99"));
        let address = match next {
            Alloc::Addr(ip) => Some(ip.to_string()),
            Alloc::NoAddr => None,
            Alloc::Quota => {
                return Err(ProviderError::from_status(
                    409,
                    r#"{"NeutronError": {"message": "Quota exceeded for resources: ['floatingip']."}}"#,
                    false,
                ))
            }
            Alloc::Auth => return Err(ProviderError::from_status(401, "", false)),
            Alloc::ServerError => return Err(ProviderError::from_status(500, "boom", false)),
        };
        let fip = FloatingIp {
            id: self.fresh_id(),
            floating_ip_address: address,
            floating_network_id: network_id.into(),
            status: Some("DOWN".into()),
            ..Default::default()
        };
        self.created.push(fip.id.clone());
        self.held.push(fip.clone());
        Ok(fip)
    }

    async fn get_floating_ip(&mut self, fip_id: &str) -> Result<FloatingIp, ProviderError> {
        if self.fail_poll {
            return Err(ProviderError::from_status(503, "service unavailable", false));
        }
        self.held
            .iter()
            .find(|f| f.id == fip_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(fip_id.into()))
    }

    async fn update_floating_ip(
        &mut self,
        fip_id: &str,
        port_id: &str,
    ) -> Result<FloatingIp, ProviderError> {
        self.updates.push((fip_id.into(), port_id.into()));
        if self.fail_update {
            return Err(ProviderError::from_status(
                409,
                r#"{"NeutronError": {"type": "FloatingIPPortAlreadyAssociated", "message": "Cannot associate floating IP, it is already associated"}}"#,
                false,
            ));
        }
        let confirms = self.bind_confirms;
        let fip = self
            .held
            .iter_mut()
            .find(|f| f.id == fip_id)
            .ok_or_else(|| ProviderError::NotFound(fip_id.into()))?;
        if confirms {
            fip.port_id = Some(port_id.into());
        }
        Ok(fip.clone())
    }

    async fn delete_floating_ip(&mut self, fip_id: &str) -> Result<(), ProviderError> {
        if self.fail_delete {
            return Err(ProviderError::from_status(500, "delete exploded", false));
        }
        let before = self.held.len();
        self.held.retain(|f| f.id != fip_id);
        if self.held.len() == before {
            return Err(ProviderError::NotFound(fip_id.into()));
        }
        self.deleted.push(fip_id.into());
        Ok(())
    }
}

fn test_config() -> HunterConfig {
    HunterConfig {
        subnets: vec!["95.163.248.0/24".to_string()],
        delays: Delays::zero(),
        ..Default::default()
    }
}

fn slot(provider: ScriptedProvider, max_fip: usize) -> AccountSlot<ScriptedProvider> {
    let mut account = Account::new("main");
    account.server = "edge-vm-01".into();
    account.max_fip = max_fip;
    AccountSlot {
        account,
        provider,
        target: Target {
            server: Server {
                id: "srv-1".into(),
                name: "edge-vm-01".into(),
                status: None,
            },
            port: Port {
                id: PORT_ID.into(),
                status: "ACTIVE".into(),
                ..Default::default()
            },
            ext_net: Network {
                id: EXT_NET.into(),
                name: "ext-net".into(),
                is_router_external: true,
                ..Default::default()
            },
        },
        stats: AccountStats::default(),
    }
}

fn hunter(
    cfg: HunterConfig,
    slots: Vec<AccountSlot<ScriptedProvider>>,
) -> Hunter<ScriptedProvider> {
    Hunter::new(
        cfg,
        slots,
        StatsDb::open_in_memory().expect("Error opening stats db"),
        Notifier::disabled(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("Error creating hunter")
}

#[tokio::test]
async fn test_target_is_bound_and_hunt_stops() {
    let provider = ScriptedProvider::new(vec![Alloc::Addr("10.0.0.5"), Alloc::Addr("95.163.248.17")]);
    let mut h = hunter(test_config(), vec![slot(provider, 2)]);

    let summary = h.run().await;

    assert_eq!(summary.captured, vec!["95.163.248.17".to_string()]);
    assert_eq!(summary.attempts, 2);
    assert!(!summary.stopped);

    let p = &h.slots()[0].provider;
    assert_eq!(p.deleted, vec!["fip-0001".to_string()], "non-target released");
    assert_eq!(p.updates, vec![("fip-0002".to_string(), PORT_ID.to_string())]);
    assert_eq!(p.held.len(), 1);
    assert!(p.held[0].is_bound_to(PORT_ID));

    let stats = &h.slots()[0].stats;
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.successes, 1);

    let db = h.db();
    assert_eq!(db.count_action(Action::Get).unwrap(), 2);
    assert_eq!(db.count_action(Action::Del).unwrap(), 1);
    assert_eq!(db.count_action(Action::Bind).unwrap(), 1);
    let captures = db.recent_captures(10).unwrap();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].server, "edge-vm-01");
    assert_eq!(captures[0].subnet, "95.163.248.0/24");
}

#[tokio::test]
async fn test_no_stop_keeps_polling_after_capture() {
    let provider = ScriptedProvider::new(vec![
        Alloc::Addr("95.163.248.17"),
        Alloc::Addr("10.0.0.5"),
        Alloc::Addr("95.163.248.20"),
    ]);
    let mut cfg = test_config();
    cfg.stop_on_success = false;
    cfg.max_attempts = Some(3);
    let mut h = hunter(cfg, vec![slot(provider, 5)]);

    let summary = h.run().await;

    assert_eq!(summary.attempts, 3);
    assert_eq!(
        summary.captured,
        vec!["95.163.248.17".to_string(), "95.163.248.20".to_string()]
    );
    assert_eq!(h.slots()[0].provider.deleted, vec!["fip-0002".to_string()]);
}

#[tokio::test]
async fn test_released_addresses_are_never_reused() {
    let provider = ScriptedProvider::new(vec![
        Alloc::Addr("10.0.0.5"),
        Alloc::Addr("10.0.0.5"),
        Alloc::Addr("172.16.0.1"),
        Alloc::Addr("8.8.8.8"),
    ]);
    let mut cfg = test_config();
    cfg.max_attempts = Some(4);
    let mut h = hunter(cfg, vec![slot(provider, 2)]);

    let summary = h.run().await;

    assert!(summary.captured.is_empty());
    let p = &h.slots()[0].provider;
    assert_eq!(p.created.len(), 4, "every iteration allocates fresh");
    let mut unique = p.created.clone();
    unique.dedup();
    assert_eq!(unique.len(), 4);
    assert_eq!(p.deleted, p.created);
    assert!(p.updates.is_empty());
    assert!(p.held.is_empty());
}

#[tokio::test]
async fn test_quota_error_puts_account_in_cooldown() {
    let provider = ScriptedProvider::new(vec![Alloc::Quota]);
    let mut h = hunter(test_config(), vec![slot(provider, 2)]);
    let before = Utc::now();

    assert_eq!(h.attempt(0).await, None);

    let stats = &h.slots()[0].stats;
    assert_eq!(stats.errors, 1);
    let until = stats.cooldown_until.expect("cooldown should be set");
    assert!(until >= before + ChronoDuration::minutes(20));
    assert!(until <= Utc::now() + ChronoDuration::minutes(40));
    assert!(h.slots()[0].provider.created.is_empty());

    assert_eq!(h.select_account_at(Utc::now()).await, None);
    assert_eq!(h.select_account_at(until - ChronoDuration::seconds(1)).await, None);
    assert_eq!(h.select_account_at(until + ChronoDuration::seconds(1)).await, Some(0));
}

#[tokio::test]
async fn test_auth_error_cooldown_and_other_account_used() {
    let failing = ScriptedProvider::new(vec![Alloc::Auth]);
    let healthy = ScriptedProvider::new(vec![Alloc::Addr("10.0.0.5")]);
    let mut second = slot(healthy, 2);
    second.account.name = "backup".into();
    let mut h = hunter(test_config(), vec![slot(failing, 2), second]);

    assert_eq!(h.select_account().await, Some(0));
    assert_eq!(h.attempt(0).await, None);
    let until = h.slots()[0].stats.cooldown_until.expect("cooldown should be set");
    assert!(until > Utc::now() + ChronoDuration::minutes(14));

    // round robin moves on, and the cooling account is skipped afterwards too
    assert_eq!(h.select_account().await, Some(1));
    assert_eq!(h.select_account().await, Some(1));
}

#[tokio::test]
async fn test_other_errors_do_not_cool_down() {
    let provider = ScriptedProvider::new(vec![Alloc::ServerError, Alloc::Addr("10.0.0.5")]);
    let mut h = hunter(test_config(), vec![slot(provider, 2)]);

    assert_eq!(h.attempt(0).await, None);
    assert_eq!(h.slots()[0].stats.errors, 1);
    assert!(h.slots()[0].stats.cooldown_until.is_none());
    assert_eq!(h.select_account().await, Some(0));
    assert_eq!(h.attempt(0).await, None);
    assert_eq!(h.slots()[0].provider.deleted.len(), 1);
}

#[tokio::test]
async fn test_missing_address_is_released() {
    let provider = ScriptedProvider::new(vec![Alloc::NoAddr]);
    let mut h = hunter(test_config(), vec![slot(provider, 2)]);

    let state = h.step(HuntState::Requesting { slot: 0 }).await;
    let fip = match &state {
        HuntState::Classifying { fip, .. } => fip.clone(),
        other => panic!("unexpected {other}"),
    };
    let state = h.step(state).await;
    assert_eq!(
        state,
        HuntState::Releasing {
            slot: 0,
            fip,
            reason: ReleaseReason::Malformed
        }
    );
    assert_eq!(h.step(state).await, HuntState::Idle);
    assert_eq!(h.slots()[0].provider.deleted, vec!["fip-0001".to_string()]);
    assert_eq!(h.db().count_action(Action::Get).unwrap(), 0);
    assert_eq!(h.db().count_action(Action::Del).unwrap(), 0);
}

#[tokio::test]
async fn test_unconfirmed_bind_is_released() {
    let mut provider = ScriptedProvider::new(vec![Alloc::Addr("95.163.248.17")]);
    provider.bind_confirms = false;
    let mut h = hunter(test_config(), vec![slot(provider, 2)]);

    assert_eq!(h.attempt(0).await, None);

    let p = &h.slots()[0].provider;
    assert_eq!(p.updates.len(), 1);
    assert_eq!(p.deleted, vec!["fip-0001".to_string()]);
    assert_eq!(h.slots()[0].stats.successes, 0);
    assert_eq!(h.db().count_captures().unwrap(), 0);
}

#[tokio::test]
async fn test_account_at_fip_limit_is_skipped() {
    let mut provider = ScriptedProvider::new(vec![]);
    provider.held.push(FloatingIp {
        id: "existing".into(),
        floating_ip_address: Some("95.163.248.5".into()),
        port_id: Some(PORT_ID.into()),
        ..Default::default()
    });
    let mut h = hunter(test_config(), vec![slot(provider, 1)]);
    assert_eq!(h.select_account().await, None);
}

#[tokio::test]
async fn test_subnet_id_requested_when_configured() {
    let provider = ScriptedProvider::new(vec![Alloc::Addr("10.0.0.5")]);
    let mut cfg = test_config();
    cfg.use_subnet_id = true;
    cfg.subnet_ids = vec!["s-ext-1".to_string()];
    let mut h = hunter(cfg, vec![slot(provider, 2)]);

    h.attempt(0).await;
    assert_eq!(
        h.slots()[0].provider.subnet_requests,
        vec![Some("s-ext-1".to_string())]
    );
}

#[tokio::test]
async fn test_stop_flag_ends_hunt_before_first_attempt() {
    let stop = Arc::new(AtomicBool::new(true));
    let mut h = Hunter::new(
        test_config(),
        vec![slot(ScriptedProvider::new(vec![]), 2)],
        StatsDb::open_in_memory().unwrap(),
        Notifier::disabled(),
        stop,
    )
    .unwrap();
    let summary = h.run().await;
    assert_eq!(summary.attempts, 0);
    assert!(summary.stopped);
}

#[tokio::test]
async fn test_hunter_requires_targets_and_slots() {
    let mut cfg = test_config();
    cfg.subnets = vec!["bogus".to_string()];
    let err = Hunter::new(
        cfg,
        vec![slot(ScriptedProvider::new(vec![]), 2)],
        StatsDb::open_in_memory().unwrap(),
        Notifier::disabled(),
        Arc::new(AtomicBool::new(false)),
    );
    assert!(err.is_err());

    let err = Hunter::<ScriptedProvider>::new(
        test_config(),
        vec![],
        StatsDb::open_in_memory().unwrap(),
        Notifier::disabled(),
        Arc::new(AtomicBool::new(false)),
    );
    assert!(err.is_err());
}

#[tokio::test]
async fn test_failed_release_is_swallowed() {
    let mut provider = ScriptedProvider::new(vec![Alloc::Addr("10.0.0.5"), Alloc::Addr("10.0.0.6")]);
    provider.fail_delete = true;
    let mut cfg = test_config();
    cfg.max_attempts = Some(2);
    let mut h = hunter(cfg, vec![slot(provider, 5)]);

    let summary = h.run().await;

    assert_eq!(summary.attempts, 2);
    assert!(summary.captured.is_empty());
    let p = &h.slots()[0].provider;
    assert!(p.deleted.is_empty());
    assert_eq!(p.held.len(), 2, "undeleted addresses are still held");
    assert_eq!(h.slots()[0].stats.errors, 0);
    // nothing was released, so nothing is counted as released
    assert_eq!(h.db().count_action(Action::Get).unwrap(), 2);
    assert_eq!(h.db().count_action(Action::Del).unwrap(), 0);
}

#[tokio::test]
async fn test_bind_conflict_releases_and_backs_off() {
    let mut provider = ScriptedProvider::new(vec![Alloc::Addr("95.163.248.17")]);
    provider.fail_update = true;
    let mut h = hunter(test_config(), vec![slot(provider, 2)]);

    assert_eq!(h.attempt(0).await, None);

    let p = &h.slots()[0].provider;
    assert_eq!(p.updates.len(), 1);
    assert_eq!(p.deleted, vec!["fip-0001".to_string()]);
    let stats = &h.slots()[0].stats;
    assert_eq!(stats.errors, 1);
    assert!(stats.cooldown_until.is_none(), "a conflict is not a quota error");
    assert!(h.pending_backoff().is_some());
    assert_eq!(h.db().count_captures().unwrap(), 0);
}

#[tokio::test]
async fn test_bind_poll_error_releases_and_backs_off() {
    let mut provider = ScriptedProvider::new(vec![Alloc::Addr("95.163.248.17")]);
    provider.fail_poll = true;
    let mut h = hunter(test_config(), vec![slot(provider, 2)]);

    assert_eq!(h.attempt(0).await, None);

    assert_eq!(h.slots()[0].provider.deleted, vec!["fip-0001".to_string()]);
    assert_eq!(h.slots()[0].stats.errors, 1);
    assert!(h.slots()[0].stats.cooldown_until.is_none());
    assert!(h.pending_backoff().is_some());
}

#[tokio::test]
async fn test_stop_during_attempt_delay_ends_hunt() {
    let mut cfg = test_config();
    cfg.delays = Delays {
        attempt_min: 30.0,
        attempt_max: 30.0,
        jitter: 0.0,
        attempt_floor: 30.0,
        ..Delays::zero()
    };
    let stop = Arc::new(AtomicBool::new(false));
    let mut h = Hunter::new(
        cfg,
        vec![slot(ScriptedProvider::new(vec![Alloc::Addr("10.0.0.5")]), 2)],
        StatsDb::open_in_memory().unwrap(),
        Notifier::disabled(),
        stop.clone(),
    )
    .unwrap();

    let raiser = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        stop.store(true, Ordering::SeqCst);
    });
    let started = Instant::now();
    let summary = h.run().await;
    raiser.await.unwrap();

    assert_eq!(summary.attempts, 1);
    assert!(summary.stopped);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn test_resolve_target_by_network_name_or_id() {
    let mut provider = ScriptedProvider::new(vec![]);
    let mut account = Account::new("main");
    account.server = "edge-vm-01".into();

    account.ext_net = EXT_NET.into();
    let target = resolve_target(&mut provider, &account).await.unwrap();
    assert_eq!(target.ext_net.name, "ext-net");

    account.ext_net = "ext-net".into();
    let target = resolve_target(&mut provider, &account).await.unwrap();
    assert_eq!(target.ext_net.id, EXT_NET);

    account.ext_net = "no-such-net".into();
    let err = resolve_target(&mut provider, &account).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_connect_accounts_resolves_targets() {
    let cfg = HunterConfig::load(Path::new("src/tests/test_data/hunter_config_01.json"))
        .expect("Error loading config");
    let mut missing = Account::new("ghost");
    missing.server = "missing-vm".into();
    let mut accounts = cfg.accounts.clone();
    accounts.push(missing);

    let mut slots = connect_accounts(&accounts, |_| Ok(ScriptedProvider::new(vec![]))).await;

    // "backup" is disabled and "ghost" has no VM
    assert_eq!(slots.len(), 1);
    let s = &mut slots[0];
    assert_eq!(s.account.name, "main");
    assert_eq!(s.target.server.name, "edge-vm-01");
    assert_eq!(s.target.port.id, PORT_ID);
    assert_eq!(s.target.ext_net.id, EXT_NET);

    let found = find_subnet_by_cidr(&mut s.provider, &s.target.ext_net, "95.163.248.0/24").await;
    assert_eq!(found.as_deref(), Some("s-ext-1"));
    let none = find_subnet_by_cidr(&mut s.provider, &s.target.ext_net, "1.2.3.0/24").await;
    assert_eq!(none, None);
}

#[test]
fn test_config_targets_classify_examples() {
    let cfg = HunterConfig::load(Path::new("src/tests/test_data/hunter_config_01.json"))
        .expect("Error loading config");
    let targets = cfg.targets();
    assert!(targets.classify_str("95.163.248.17").unwrap().is_target());
    assert!(targets.classify_str("212.111.87.250").unwrap().is_target());
    assert!(!targets.classify_str("10.0.0.5").unwrap().is_target());
}
