//! HTTP client for Keystone, Neutron and Nova.
//!
//! One client per account. The token is fetched lazily and refreshed before expiry.

use super::auth::{password_auth_body, tokens_url, Session, TokenResponse};
use super::ProviderError;
use crate::models::Account;
use colored::Colorize;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which catalog endpoint a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Network,
    Compute,
}

/// Parse a JSON body, reporting the path of the first mismatch.
pub fn parse_body<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, ProviderError> {
    let mut de = serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(&mut de).map_err(|e| {
        log::debug!("BODY START:\n\n{}\n\nBODY END\n", body);
        ProviderError::Malformed(format!("{what}: path={} error={}", e.path(), e))
    })
}

pub struct OpenStackClient {
    http: reqwest::Client,
    account: Account,
    session: Option<Session>,
}

impl OpenStackClient {
    pub fn new(account: &Account) -> Result<OpenStackClient, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(OpenStackClient {
            http,
            account: account.clone(),
            session: None,
        })
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Make sure a valid token is held, authenticating if needed.
    pub async fn ensure_session(&mut self) -> Result<&Session, ProviderError> {
        let fresh = match &self.session {
            Some(session) => !session.needs_refresh(chrono::Utc::now()),
            None => false,
        };
        if !fresh {
            let session = self.authenticate().await?;
            self.session = Some(session);
        }
        self.session
            .as_ref()
            .ok_or_else(|| ProviderError::Malformed("no session after authentication".into()))
    }

    async fn authenticate(&self) -> Result<Session, ProviderError> {
        let url = tokens_url(&self.account.auth_url);
        log::debug!(
            "[{}] authenticate {}",
            self.account.name,
            url.as_str().on_blue()
        );
        let response = self
            .http
            .post(&url)
            .json(&password_auth_body(&self.account))
            .send()
            .await?;

        let status = response.status();
        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), &body, true));
        }
        let token =
            token.ok_or_else(|| ProviderError::Malformed("missing X-Subject-Token".into()))?;
        let parsed: TokenResponse = parse_body(&body, "token")?;
        let session = Session::from_token(token, parsed.token, &self.account.region)?;
        log::info!(
            "[{}] token valid until {}",
            self.account.name,
            session.expires_at.format("%Y-%m-%d %H:%M:%S")
        );
        Ok(session)
    }

    /// Build an authenticated request; `query` pairs are url-encoded by reqwest.
    fn request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
    }

    /// Send a request and return the status and body text.
    async fn send(
        &mut self,
        method: Method,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<(StatusCode, String), ProviderError> {
        let (url, token) = {
            let session = self.ensure_session().await?;
            let base = match service {
                Service::Network => &session.network_url,
                Service::Compute => &session.compute_url,
            };
            (format!("{base}{path}"), session.token.clone())
        };
        log::debug!("{} {}", method, url.as_str().on_blue());

        let response = self
            .request(method, &url, &token, query, body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            // token revoked early; authenticate again on the next call
            self.session = None;
        }
        if !status.is_success() {
            log::trace!(
                "code={code}, url={url}\n┎######\nbody=\n{body}\n┖######",
                code = status.as_u16(),
                body = text.red()
            );
            return Err(ProviderError::from_status(status.as_u16(), &text, false));
        }
        Ok((status, text))
    }

    /// GET a JSON resource from one of the account's service endpoints.
    ///
    /// # Arguments
    ///
    /// * `service` - Catalog endpoint the path is relative to
    /// * `path` - Resource path, e.g. `/floatingips/{id}`
    /// * `query` - Query string pairs, empty for none
    ///
    /// # Returns
    ///
    /// The parsed body, or a [`ProviderError`] mapped from the HTTP status.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn demo(client: &mut fip_hunter::openstack::OpenStackClient) {
    /// use fip_hunter::openstack::Service;
    /// let ports: serde_json::Value = client
    ///     .get_json(Service::Network, "/ports", &[("device_id", "srv-1")])
    ///     .await
    ///     .unwrap();
    /// # }
    /// ```
    pub async fn get_json<T: DeserializeOwned>(
        &mut self,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let (_, text) = self.send(Method::GET, service, path, query, None).await?;
        parse_body(&text, path)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &mut self,
        service: Service,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let (_, text) = self.send(Method::POST, service, path, &[], Some(body)).await?;
        parse_body(&text, path)
    }

    pub async fn put_json<T: DeserializeOwned>(
        &mut self,
        service: Service,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let (_, text) = self.send(Method::PUT, service, path, &[], Some(body)).await?;
        parse_body(&text, path)
    }

    pub async fn delete(&mut self, service: Service, path: &str) -> Result<(), ProviderError> {
        self.send(Method::DELETE, service, path, &[], None).await?;
        Ok(())
    }
}
