//! The allocation loop and its setup.
//!
//! - [`connect`] - resolving each account's VM, port and external network
//! - [`state`] - the per-attempt state machine
//! - [`hunter`] - the loop: account selection, cooldowns, pacing

mod connect;
mod hunter;
mod state;

pub use connect::{
    connect_accounts, external_subnets, find_subnet_by_cidr, pick_port, resolve_target,
    AccountSlot, Target,
};
pub use hunter::{sleep_or_stop, HuntSummary, Hunter};
pub use state::{HuntState, ReleaseReason};
