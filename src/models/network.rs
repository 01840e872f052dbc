//! Neutron network data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Neutron network; floating IPs are allocated from one with `router:external`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "router:external", default)]
    pub is_router_external: bool,
    /// Subnet ids on this network.
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({} subnets{})",
            self.name,
            self.id,
            self.subnets.len(),
            if self.is_router_external { ", external" } else { "" }
        )
    }
}
