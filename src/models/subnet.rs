//! Neutron subnet data model.

use serde::{Deserialize, Serialize};

/// A subnet of the external network, as listed by `GET /v2.0/subnets/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Subnet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// CIDR as reported by the API (kept as text, IPv6 subnets appear here too).
    pub cidr: String,
    #[serde(default)]
    pub network_id: String,
    #[serde(default)]
    pub ip_version: Option<u8>,
}

impl Subnet {
    pub fn matches_cidr(&self, cidr: &str) -> bool {
        self.cidr.trim() == cidr.trim()
    }
}
