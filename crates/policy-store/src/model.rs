use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::except_app::ExceptApp;
use crate::mac::MacAddr;

/// What happens to traffic from a device whose group is bound to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Accept = 0,
    Drop = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown action value {0}; expected 0 (accept) or 1 (drop)")]
pub struct UnknownAction(pub u8);

impl TryFrom<u8> for Action {
    type Error = UnknownAction;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Accept),
            1 => Ok(Self::Drop),
            other => Err(UnknownAction(other)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "ACCEPT"),
            Self::Drop => write!(f, "DROP"),
        }
    }
}

/// A named accept/drop decision with its app categories and exception apps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub id: String,
    pub action: Action,
    /// Generic app-category ids, in configured order.
    pub apps: Vec<u32>,
    pub exceptions: Vec<ExceptApp>,
    /// Number of groups currently bound to this rule.
    pub refer_count: usize,
}

/// A named set of hardware addresses bound to at most one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: String,
    pub macs: Vec<MacAddr>,
    /// Id of the bound rule. Non-owning: it never keeps the rule alive.
    pub rule_id: Option<String>,
}

impl Group {
    pub fn contains(&self, mac: &MacAddr) -> bool {
        self.macs.iter().any(|m| m == mac)
    }
}

/// Trims an app-category list at its first zero slot, which marks the end of
/// the used portion.
pub(crate) fn used_apps(apps: &[u32]) -> Vec<u32> {
    apps.iter().copied().take_while(|&a| a != 0).collect()
}

/// Drops empty slots and repeated entries while keeping first-seen order.
pub(crate) fn used_macs(macs: &[MacAddr]) -> Vec<MacAddr> {
    let mut out: Vec<MacAddr> = Vec::with_capacity(macs.len());
    for mac in macs.iter().filter(|m| !m.is_zero()) {
        if !out.contains(mac) {
            out.push(*mac);
        }
    }
    out
}
