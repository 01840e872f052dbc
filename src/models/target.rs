//! Target subnet set used to classify allocated addresses.

use super::Ipv4;
use std::net::Ipv4Addr;

/// Outcome of checking one address against the target set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The address sits inside this configured CIDR (first match wins).
    Target(Ipv4),
    /// The address is outside every configured CIDR.
    NotTarget,
}

impl Classification {
    pub fn is_target(&self) -> bool {
        matches!(self, Classification::Target(_))
    }

    pub fn subnet(&self) -> Option<Ipv4> {
        match self {
            Classification::Target(net) => Some(*net),
            Classification::NotTarget => None,
        }
    }
}

/// Ordered list of CIDR ranges the operator wants an address from.
#[derive(Debug, Clone, Default)]
pub struct TargetSubnets {
    nets: Vec<Ipv4>,
}

impl TargetSubnets {
    /// Parse CIDR strings, skipping (and logging) invalid entries.
    pub fn parse<S: AsRef<str>>(cidrs: &[S]) -> TargetSubnets {
        let nets = cidrs
            .iter()
            .filter_map(|s| match Ipv4::new(s.as_ref()) {
                Ok(net) => Some(net),
                Err(e) => {
                    log::warn!("Skipping invalid subnet '{}': {}", s.as_ref(), e);
                    None
                }
            })
            .collect();
        TargetSubnets { nets }
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ipv4> {
        self.nets.iter()
    }

    pub fn classify(&self, ip: Ipv4Addr) -> Classification {
        self.nets
            .iter()
            .find(|net| net.contains(ip))
            .map(|net| Classification::Target(net.network()))
            .unwrap_or(Classification::NotTarget)
    }

    /// Classify an address string as returned by the API.
    ///
    /// Returns `None` when the string is not a valid IPv4 address.
    pub fn classify_str(&self, ip: &str) -> Option<Classification> {
        ip.trim().parse::<Ipv4Addr>().ok().map(|ip| self.classify(ip))
    }
}
