//! Read-only lookups used on the packet path.

use tracing::trace;

use crate::mac::MacAddr;
use crate::model::{Action, Group};
use crate::snapshot::RuleSnapshot;
use crate::store::PolicyStore;

impl PolicyStore {
    /// The first group, in insertion order, whose address set contains `mac`.
    pub fn find_group_by_address(&self, mac: &MacAddr) -> Option<Group> {
        self.read().group_by_mac(mac).cloned()
    }

    /// The action for traffic from `mac`.
    ///
    /// Devices in no group, and devices whose group has no rule, are accepted.
    pub fn action_for_address(&self, mac: &MacAddr) -> Action {
        let tables = self.read();
        let Some(group) = tables.group_by_mac(mac) else {
            trace!(%mac, "device belongs to no group; accepting");
            return Action::Accept;
        };
        match tables.bound_rule(group) {
            Some(rule) => rule.action,
            None => {
                trace!(%mac, group = %group.id, "group has no rule; accepting");
                Action::Accept
            }
        }
    }

    /// The full rule applying to `mac`, copied out of the store.
    ///
    /// For a device in no group this is a synthetic DROP when
    /// `default_drop_unassigned` is set, and `None` otherwise. A device whose
    /// group has no rule also yields `None`; the caller applies its default.
    pub fn rule_for_address(
        &self,
        mac: &MacAddr,
        default_drop_unassigned: bool,
    ) -> Option<RuleSnapshot> {
        let tables = self.read();
        match tables.group_by_mac(mac) {
            None if default_drop_unassigned => Some(RuleSnapshot::drop_unassigned()),
            None => None,
            Some(group) => tables.bound_rule(group).map(RuleSnapshot::from),
        }
    }
}
