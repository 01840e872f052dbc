//! OpenStack API interaction.
//!
//! - [`auth`] - Keystone v3 tokens and the service catalog
//! - [`client`] - authenticated HTTP calls with JSON parsing
//! - [`provider`] - the [`NetworkProvider`] seam used by the hunt loop
//! - [`error`] - classification of failed calls

mod auth;
mod client;
mod error;
mod provider;

pub use auth::{endpoint_url, Session};
pub use client::{parse_body, OpenStackClient, Service};
pub use error::{error_message, ProviderError};
pub use provider::{create_body, NetworkProvider};
