//! Resolving an account's VM, port and external network before hunting.

use crate::models::{Account, AccountStats, Network, Port, Server, Subnet};
use crate::openstack::{NetworkProvider, ProviderError};
use colored::Colorize;

/// Everything a bind needs, resolved once per account.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub server: Server,
    pub port: Port,
    pub ext_net: Network,
}

/// A connected account: its provider, resolved target and runtime counters.
pub struct AccountSlot<P> {
    pub account: Account,
    pub provider: P,
    pub target: Target,
    pub stats: AccountStats,
}

/// Prefer an ACTIVE port, otherwise the first one listed.
pub fn pick_port(ports: Vec<Port>) -> Option<Port> {
    let mut ports = ports;
    ports.sort_by_key(|p| !p.is_active());
    ports.into_iter().next()
}

pub async fn resolve_target<P: NetworkProvider + ?Sized>(
    provider: &mut P,
    account: &Account,
) -> Result<Target, ProviderError> {
    provider.authorize().await?;

    let server = provider
        .find_server(&account.server)
        .await?
        .ok_or_else(|| ProviderError::NotFound(format!("server '{}'", account.server)))?;

    let port = if account.port_id.is_empty() {
        let ports = provider.list_ports(&server.id).await?;
        pick_port(ports)
            .ok_or_else(|| ProviderError::NotFound(format!("no ports on server '{}'", server.name)))?
    } else {
        provider.get_port(&account.port_id).await?
    };

    let networks = provider.list_networks().await?;
    let found = if account.ext_net.is_empty() {
        networks.into_iter().find(|n| n.is_router_external)
    } else {
        networks
            .into_iter()
            .find(|n| n.name == account.ext_net || n.id == account.ext_net)
    };
    let ext_net = found.ok_or_else(|| {
        let wanted = if account.ext_net.is_empty() {
            "external"
        } else {
            account.ext_net.as_str()
        };
        ProviderError::NotFound(format!("network '{wanted}'"))
    })?;

    Ok(Target {
        server,
        port,
        ext_net,
    })
}

/// Connect every enabled account, skipping the ones that fail.
pub async fn connect_accounts<P, F>(accounts: &[Account], mut make_provider: F) -> Vec<AccountSlot<P>>
where
    P: NetworkProvider,
    F: FnMut(&Account) -> Result<P, ProviderError>,
{
    let mut slots = Vec::new();
    for account in accounts.iter().filter(|a| a.enabled) {
        log::info!("[{}] connecting ...", account.name);
        let mut provider = match make_provider(account) {
            Ok(p) => p,
            Err(e) => {
                log::error!("[{}] {}: {e}", account.name, "client error".red());
                continue;
            }
        };
        match resolve_target(&mut provider, account).await {
            Ok(target) => {
                log::info!(
                    "[{}] {} -> vm={} port={} net={}",
                    account.name,
                    "OK".green(),
                    target.server.name,
                    target.port.id,
                    target.ext_net.name
                );
                slots.push(AccountSlot {
                    account: account.clone(),
                    provider,
                    target,
                    stats: AccountStats::default(),
                });
            }
            Err(e) => log::error!("[{}] {}: {e}", account.name, "connect failed".red()),
        }
    }
    slots
}

/// Subnets of the external network; ones that cannot be read are skipped.
pub async fn external_subnets<P: NetworkProvider + ?Sized>(
    provider: &mut P,
    ext_net: &Network,
) -> Vec<Subnet> {
    let mut subnets = Vec::new();
    for id in &ext_net.subnets {
        match provider.get_subnet(id).await {
            Ok(subnet) => subnets.push(subnet),
            Err(e) => log::warn!("Cannot read subnet {id}: {e}"),
        }
    }
    subnets
}

pub async fn find_subnet_by_cidr<P: NetworkProvider + ?Sized>(
    provider: &mut P,
    ext_net: &Network,
    cidr: &str,
) -> Option<String> {
    external_subnets(provider, ext_net)
        .await
        .into_iter()
        .find(|s| s.matches_cidr(cidr))
        .map(|s| s.id)
}
