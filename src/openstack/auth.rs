//! Keystone v3 password authentication and service catalog lookup.

use super::ProviderError;
use crate::models::Account;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

/// Refresh the token this long before Keystone says it expires.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Deserialize, Debug)]
pub struct TokenResponse {
    pub token: Token,
}

#[derive(Deserialize, Debug)]
pub struct Token {
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Endpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

impl Endpoint {
    fn in_region(&self, region: &str) -> bool {
        self.region.as_deref() == Some(region) || self.region_id.as_deref() == Some(region)
    }
}

/// An authenticated token plus the endpoints the hunter talks to.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub network_url: String,
    pub compute_url: String,
}

impl Session {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }

    /// Build a session from the `X-Subject-Token` header and token body.
    pub fn from_token(
        token: String,
        body: Token,
        region: &str,
    ) -> Result<Session, ProviderError> {
        let network_url = network_base(&endpoint_url(&body.catalog, "network", region)?);
        let compute_url = endpoint_url(&body.catalog, "compute", region)?;
        Ok(Session {
            token,
            expires_at: body.expires_at,
            network_url,
            compute_url,
        })
    }
}

/// Request body for a project-scoped password token.
pub fn password_auth_body(account: &Account) -> serde_json::Value {
    json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": account.username,
                        "domain": { "name": account.user_domain },
                        "password": account.password,
                    }
                }
            },
            "scope": { "project": { "id": account.project_id } }
        }
    })
}

/// `POST` target for token requests; tolerates auth urls with or without a trailing slash.
pub fn tokens_url(auth_url: &str) -> String {
    format!("{}/auth/tokens", auth_url.trim_end_matches('/'))
}

/// Find the public endpoint of `service_type` in `region`.
///
/// Falls back to any public endpoint of that service when none is tagged with the region.
pub fn endpoint_url(
    catalog: &[CatalogEntry],
    service_type: &str,
    region: &str,
) -> Result<String, ProviderError> {
    let entry = catalog
        .iter()
        .find(|e| e.service_type == service_type)
        .ok_or_else(|| {
            ProviderError::Malformed(format!("no '{service_type}' service in catalog"))
        })?;
    let public = || entry.endpoints.iter().filter(|e| e.interface == "public");
    let endpoint = public()
        .find(|e| e.in_region(region))
        .or_else(|| public().next())
        .ok_or_else(|| {
            ProviderError::Malformed(format!("no public '{service_type}' endpoint"))
        })?;
    Ok(endpoint.url.trim_end_matches('/').to_string())
}

/// Neutron's catalog url usually lacks the API version.
fn network_base(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.ends_with("/v2.0") {
        url.to_string()
    } else {
        format!("{url}/v2.0")
    }
}
