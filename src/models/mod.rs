//! Domain models for the floating IP hunter.
//!
//! - [`Ipv4`] - IPv4 network with CIDR notation support
//! - [`TargetSubnets`] - the membership filter for allocated addresses
//! - [`Account`] and [`AccountStats`] - configured accounts and their runtime counters
//! - [`FloatingIp`], [`Network`], [`Subnet`], [`Port`], [`Server`] - cloud resources

mod account;
mod floating_ip;
mod ipv4;
mod network;
mod subnet;
mod target;

// Re-export public types
pub use account::{Account, AccountStats};
pub use floating_ip::{FloatingIp, Port, Server};
pub use ipv4::{broadcast_addr, cut_addr, get_cidr_mask, Ipv4, MAX_LENGTH};
pub use network::Network;
pub use subnet::Subnet;
pub use target::{Classification, TargetSubnets};
