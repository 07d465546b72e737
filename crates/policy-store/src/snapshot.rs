use serde::Serialize;

use crate::except_app::ExceptApp;
use crate::model::{Action, Rule};

/// An owned copy of the policy that applies to one device.
///
/// Decoupled from the store, so the packet path can consult the exception
/// list without holding any lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSnapshot {
    /// Id of the stored rule, `None` for a synthesized decision.
    pub rule_id: Option<String>,
    pub action: Action,
    pub apps: Vec<u32>,
    pub exceptions: Vec<ExceptApp>,
}

impl RuleSnapshot {
    /// The decision applied to devices that belong to no group when
    /// anonymous devices are dropped. Not backed by a stored rule.
    pub fn drop_unassigned() -> Self {
        Self {
            rule_id: None,
            action: Action::Drop,
            apps: Vec::new(),
            exceptions: Vec::new(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.rule_id.is_none()
    }
}

impl From<&Rule> for RuleSnapshot {
    fn from(rule: &Rule) -> Self {
        Self {
            rule_id: Some(rule.id.clone()),
            action: rule.action,
            apps: rule.apps.clone(),
            exceptions: rule.exceptions.clone(),
        }
    }
}
