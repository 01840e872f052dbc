//! The networking operations the hunter needs, and their OpenStack implementation.

use super::client::{OpenStackClient, Service};
use super::ProviderError;
use crate::models::{FloatingIp, Network, Port, Server, Subnet};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Calls made against one account's cloud project.
///
/// Methods take `&mut self` so implementations can refresh credentials.
#[async_trait]
pub trait NetworkProvider: Send {
    async fn authorize(&mut self) -> Result<(), ProviderError>;

    /// Look a server up by id, then by exact name.
    async fn find_server(&mut self, name_or_id: &str) -> Result<Option<Server>, ProviderError>;

    async fn get_port(&mut self, port_id: &str) -> Result<Port, ProviderError>;

    async fn list_ports(&mut self, device_id: &str) -> Result<Vec<Port>, ProviderError>;

    async fn list_networks(&mut self) -> Result<Vec<Network>, ProviderError>;

    async fn get_subnet(&mut self, subnet_id: &str) -> Result<Subnet, ProviderError>;

    /// Floating IPs currently held by the project.
    async fn list_floating_ips(&mut self) -> Result<Vec<FloatingIp>, ProviderError>;

    async fn create_floating_ip(
        &mut self,
        network_id: &str,
        subnet_id: Option<&str>,
    ) -> Result<FloatingIp, ProviderError>;

    async fn get_floating_ip(&mut self, fip_id: &str) -> Result<FloatingIp, ProviderError>;

    /// Associate the floating IP with a port.
    async fn update_floating_ip(
        &mut self,
        fip_id: &str,
        port_id: &str,
    ) -> Result<FloatingIp, ProviderError>;

    async fn delete_floating_ip(&mut self, fip_id: &str) -> Result<(), ProviderError>;
}

#[derive(Deserialize)]
struct ServerBody {
    server: Server,
}

#[derive(Deserialize)]
struct ServersBody {
    servers: Vec<Server>,
}

#[derive(Deserialize)]
struct PortBody {
    port: Port,
}

#[derive(Deserialize)]
struct PortsBody {
    ports: Vec<Port>,
}

#[derive(Deserialize)]
struct NetworksBody {
    networks: Vec<Network>,
}

#[derive(Deserialize)]
struct SubnetBody {
    subnet: Subnet,
}

#[derive(Deserialize)]
struct FloatingIpBody {
    floatingip: FloatingIp,
}

#[derive(Deserialize)]
struct FloatingIpsBody {
    floatingips: Vec<FloatingIp>,
}

/// Body for `POST /v2.0/floatingips`.
pub fn create_body(network_id: &str, subnet_id: Option<&str>) -> serde_json::Value {
    let mut fip = json!({ "floating_network_id": network_id });
    if let Some(subnet_id) = subnet_id {
        fip["subnet_id"] = json!(subnet_id);
    }
    json!({ "floatingip": fip })
}

#[async_trait]
impl NetworkProvider for OpenStackClient {
    async fn authorize(&mut self) -> Result<(), ProviderError> {
        self.ensure_session().await.map(|_| ())
    }

    async fn find_server(&mut self, name_or_id: &str) -> Result<Option<Server>, ProviderError> {
        let path = format!("/servers/{name_or_id}");
        match self.get_json::<ServerBody>(Service::Compute, &path, &[]).await {
            Ok(body) => return Ok(Some(body.server)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        // Nova treats `name` as a regex, anchor it for an exact match
        let name = format!("^{name_or_id}$");
        let body: ServersBody = self
            .get_json(Service::Compute, "/servers", &[("name", name.as_str())])
            .await?;
        Ok(body.servers.into_iter().find(|s| s.name == name_or_id))
    }

    async fn get_port(&mut self, port_id: &str) -> Result<Port, ProviderError> {
        let path = format!("/ports/{port_id}");
        let body: PortBody = self.get_json(Service::Network, &path, &[]).await?;
        Ok(body.port)
    }

    async fn list_ports(&mut self, device_id: &str) -> Result<Vec<Port>, ProviderError> {
        let body: PortsBody = self
            .get_json(Service::Network, "/ports", &[("device_id", device_id)])
            .await?;
        Ok(body.ports)
    }

    async fn list_networks(&mut self) -> Result<Vec<Network>, ProviderError> {
        let body: NetworksBody = self.get_json(Service::Network, "/networks", &[]).await?;
        Ok(body.networks)
    }

    async fn get_subnet(&mut self, subnet_id: &str) -> Result<Subnet, ProviderError> {
        let path = format!("/subnets/{subnet_id}");
        let body: SubnetBody = self.get_json(Service::Network, &path, &[]).await?;
        Ok(body.subnet)
    }

    async fn list_floating_ips(&mut self) -> Result<Vec<FloatingIp>, ProviderError> {
        let project_id = self.account().project_id.clone();
        let body: FloatingIpsBody = self
            .get_json(
                Service::Network,
                "/floatingips",
                &[("project_id", project_id.as_str())],
            )
            .await?;
        Ok(body.floatingips)
    }

    async fn create_floating_ip(
        &mut self,
        network_id: &str,
        subnet_id: Option<&str>,
    ) -> Result<FloatingIp, ProviderError> {
        let body: FloatingIpBody = self
            .post_json(
                Service::Network,
                "/floatingips",
                create_body(network_id, subnet_id),
            )
            .await?;
        Ok(body.floatingip)
    }

    async fn get_floating_ip(&mut self, fip_id: &str) -> Result<FloatingIp, ProviderError> {
        let path = format!("/floatingips/{fip_id}");
        let body: FloatingIpBody = self.get_json(Service::Network, &path, &[]).await?;
        Ok(body.floatingip)
    }

    async fn update_floating_ip(
        &mut self,
        fip_id: &str,
        port_id: &str,
    ) -> Result<FloatingIp, ProviderError> {
        let path = format!("/floatingips/{fip_id}");
        let body: FloatingIpBody = self
            .put_json(
                Service::Network,
                &path,
                json!({ "floatingip": { "port_id": port_id } }),
            )
            .await?;
        Ok(body.floatingip)
    }

    async fn delete_floating_ip(&mut self, fip_id: &str) -> Result<(), ProviderError> {
        let path = format!("/floatingips/{fip_id}");
        self.delete(Service::Network, &path).await
    }
}
