//! States of one allocation attempt.

use crate::models::{FloatingIp, Ipv4};
use std::fmt;

/// Why an allocated address is being given back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    NotTarget,
    /// Missing or unparsable address in the allocation response.
    Malformed,
    BindFailed,
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseReason::NotTarget => "not target",
            ReleaseReason::Malformed => "malformed address",
            ReleaseReason::BindFailed => "bind failed",
        };
        f.write_str(s)
    }
}

/// `Idle -> Requesting -> Classifying -> {Binding | Releasing} -> Idle`, or `Done` after a bind.
///
/// `slot` is the index of the account the attempt runs on.
#[derive(Debug, Clone, PartialEq)]
pub enum HuntState {
    Idle,
    Requesting {
        slot: usize,
    },
    Classifying {
        slot: usize,
        fip: FloatingIp,
    },
    Binding {
        slot: usize,
        fip: FloatingIp,
        subnet: Ipv4,
    },
    Releasing {
        slot: usize,
        fip: FloatingIp,
        reason: ReleaseReason,
    },
    Done {
        ip: String,
    },
}

impl HuntState {
    /// True for states that end an attempt.
    pub fn is_settled(&self) -> bool {
        matches!(self, HuntState::Idle | HuntState::Done { .. })
    }
}

impl fmt::Display for HuntState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HuntState::Idle => write!(f, "IDLE"),
            HuntState::Requesting { slot } => write!(f, "REQUESTING(#{slot})"),
            HuntState::Classifying { fip, .. } => write!(f, "CLASSIFYING({})", fip.id),
            HuntState::Binding { fip, subnet, .. } => {
                write!(f, "BINDING({} in {subnet})", fip.address().unwrap_or("-"))
            }
            HuntState::Releasing { fip, reason, .. } => {
                write!(f, "RELEASING({}, {reason})", fip.address().unwrap_or("-"))
            }
            HuntState::Done { ip } => write!(f, "DONE({ip})"),
        }
    }
}
