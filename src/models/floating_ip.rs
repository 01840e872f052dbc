//! Floating IP, port and server data models.

use serde::{Deserialize, Serialize};

/// An ephemeral external address owned by the account until released or bound.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FloatingIp {
    pub id: String,
    #[serde(default)]
    pub floating_ip_address: Option<String>,
    #[serde(default)]
    pub port_id: Option<String>,
    #[serde(default)]
    pub floating_network_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl FloatingIp {
    /// The address, if the API returned a non-empty one.
    pub fn address(&self) -> Option<&str> {
        self.floating_ip_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_bound_to(&self, port_id: &str) -> bool {
        self.port_id.as_deref() == Some(port_id)
    }
}

/// A VM network port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Port {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub device_id: String,
}

impl Port {
    pub fn is_active(&self) -> bool {
        self.status == "ACTIVE"
    }
}

/// A compute server (VM).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_ignores_blank() {
        let mut fip = FloatingIp {
            id: "f1".to_string(),
            ..Default::default()
        };
        assert_eq!(fip.address(), None);
        fip.floating_ip_address = Some("  ".to_string());
        assert_eq!(fip.address(), None);
        fip.floating_ip_address = Some("95.163.248.17".to_string());
        assert_eq!(fip.address(), Some("95.163.248.17"));
    }

    #[test]
    fn test_is_bound_to() {
        let fip: FloatingIp = serde_json::from_str(
            r#"{"id": "f1", "floating_ip_address": "1.2.3.4", "port_id": "p1", "status": "ACTIVE"}"#,
        )
        .unwrap();
        assert!(fip.is_bound_to("p1"));
        assert!(!fip.is_bound_to("p2"));
    }
}
