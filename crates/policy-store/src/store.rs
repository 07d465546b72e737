use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::error::{EntityKind, Outcome, PolicyError};
use crate::except_app::ExceptApp;
use crate::feature::{ExceptAppBuilder, FeatureStringBuilder};
use crate::limits::{
    GROUP_ID_SIZE, MAX_APP_IN_RULE, MAX_EXCEPTION_APP_IN_RULE, MAX_MAC_IN_GROUP,
    MIN_FEATURE_STR_LEN, RULE_ID_SIZE,
};
use crate::mac::MacAddr;
use crate::model::{used_apps, used_macs, Action, Group, Rule};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Both collections, guarded together by the store's single lock so that a
/// group rebind and the matching reference-count changes are one atomic step.
#[derive(Debug, Default)]
pub(crate) struct PolicyTables {
    /// Insertion order.
    pub(crate) rules: Vec<Rule>,
    /// Insertion order; resolution returns the first group holding an address.
    pub(crate) groups: Vec<Group>,
    /// Drop devices that belong to no group. Swapped with the tables on reload.
    pub(crate) drop_anonymous: bool,
}

impl PolicyTables {
    pub(crate) fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    fn rule_mut(&mut self, id: &str) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| r.id == id)
    }

    fn group_index(&self, id: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.id == id)
    }

    pub(crate) fn group_by_mac(&self, mac: &MacAddr) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(mac))
    }

    /// The rule a group points at, if that rule still exists.
    pub(crate) fn bound_rule(&self, group: &Group) -> Option<&Rule> {
        group.rule_id.as_deref().and_then(|id| self.rule(id))
    }

    /// Resolves `rule_id` to an existing rule id and takes a reference on it.
    fn acquire(&mut self, rule_id: Option<&str>) -> Option<String> {
        let rule = self.rule_mut(rule_id?)?;
        rule.refer_count += 1;
        Some(rule.id.clone())
    }

    fn release(&mut self, rule_id: Option<&str>) {
        let Some(id) = rule_id else { return };
        match self.rule_mut(id) {
            Some(rule) if rule.refer_count > 0 => rule.refer_count -= 1,
            Some(rule) => warn!(rule = %rule.id, "reference count already zero on release"),
            None => debug!(rule = id, "released reference to a rule that no longer exists"),
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyStore
// ---------------------------------------------------------------------------

/// The concurrent container of all rules and groups.
///
/// Readers (lookups, resolution, reporting) share the lock; every mutation
/// holds it exclusively for its whole duration, including the rule lookup and
/// reference-count adjustment it implies. Input parsing and validation run
/// before the lock is taken, so a rejected call never leaves a partial write.
pub struct PolicyStore {
    tables: RwLock<PolicyTables>,
    builder: Box<dyn ExceptAppBuilder>,
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("PolicyStore")
            .field("num_rules", &tables.rules.len())
            .field("num_groups", &tables.groups.len())
            .field("drop_anonymous", &tables.drop_anonymous)
            .finish()
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStore {
    /// An empty store that parses exception apps with [`FeatureStringBuilder`].
    pub fn new() -> Self {
        Self::with_builder(FeatureStringBuilder)
    }

    /// An empty store using a custom exception-app builder.
    pub fn with_builder(builder: impl ExceptAppBuilder + 'static) -> Self {
        Self {
            tables: RwLock::new(PolicyTables::default()),
            builder: Box::new(builder),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, PolicyTables> {
        self.tables.read()
    }

    /// Whether devices that belong to no group are dropped by
    /// [`rule_for_address`](Self::rule_for_address) callers that consult it.
    pub fn drop_anonymous(&self) -> bool {
        self.tables.read().drop_anonymous
    }

    pub fn set_drop_anonymous(&self, enabled: bool) {
        self.tables.write().drop_anonymous = enabled;
    }

    // -- Rules ----------------------------------------------------------------

    /// Adds a rule with `refer_count == 0` and returns how many exception
    /// apps were accepted.
    ///
    /// Empty exception sources are ignored. Sources shorter than
    /// [`MIN_FEATURE_STR_LEN`] and sources the builder rejects are skipped and
    /// logged. Fails on a duplicate id or when a list exceeds its
    /// capacity.
    pub fn add_rule<S: AsRef<str>>(
        &self,
        id: &str,
        action: Action,
        apps: &[u32],
        exception_sources: &[S],
    ) -> Result<usize, PolicyError> {
        validate_id(EntityKind::Rule, id, RULE_ID_SIZE)?;
        check_capacity("app list", apps.len(), MAX_APP_IN_RULE)?;
        let offered = exception_sources
            .iter()
            .filter(|s| !s.as_ref().is_empty())
            .count();
        check_capacity("exception list", offered, MAX_EXCEPTION_APP_IN_RULE)?;

        let exceptions = self.build_exceptions(id, exception_sources);
        let accepted = exceptions.len();

        let mut tables = self.tables.write();
        if tables.rule(id).is_some() {
            return Err(PolicyError::Duplicate {
                kind: EntityKind::Rule,
                id: id.to_string(),
            });
        }
        tables.rules.push(Rule {
            id: id.to_string(),
            action,
            apps: used_apps(apps),
            exceptions,
            refer_count: 0,
        });
        drop(tables);

        debug!(rule = id, %action, accepted, offered, "added rule");
        Ok(accepted)
    }

    fn build_exceptions<S: AsRef<str>>(&self, rule_id: &str, sources: &[S]) -> Vec<ExceptApp> {
        let mut exceptions = Vec::new();
        for (index, source) in sources.iter().enumerate() {
            let source = source.as_ref();
            if source.is_empty() {
                continue;
            }
            if source.len() < MIN_FEATURE_STR_LEN {
                warn!(
                    rule = rule_id,
                    index,
                    len = source.len(),
                    min = MIN_FEATURE_STR_LEN,
                    "skipping exception app below the minimum source length"
                );
                continue;
            }
            let name = format!("{rule_id}_except_app_{index}");
            match self.builder.build(&name, source) {
                Ok(app) => exceptions.push(app),
                Err(err) => warn!(rule = rule_id, %err, "skipping exception app"),
            }
        }
        exceptions
    }

    /// Removes an unreferenced rule.
    ///
    /// Fails with [`PolicyError::StillReferenced`] while any group is bound to
    /// it; the store is unchanged in that case.
    pub fn remove_rule(&self, id: &str) -> Result<Outcome, PolicyError> {
        let mut tables = self.tables.write();
        let Some(index) = tables.rules.iter().position(|r| r.id == id) else {
            return Ok(Outcome::NotFound);
        };
        let refer_count = tables.rules[index].refer_count;
        if refer_count > 0 {
            warn!(rule = id, refer_count, "refusing to remove referenced rule");
            return Err(PolicyError::StillReferenced {
                id: id.to_string(),
                refer_count,
            });
        }
        tables.rules.remove(index);
        drop(tables);

        debug!(rule = id, "removed rule");
        Ok(Outcome::Applied)
    }

    /// Replaces a rule's action and app list in place. Exceptions and the
    /// reference count are left untouched.
    pub fn set_rule(&self, id: &str, action: Action, apps: &[u32]) -> Result<Outcome, PolicyError> {
        check_capacity("app list", apps.len(), MAX_APP_IN_RULE)?;
        let apps = used_apps(apps);

        let mut tables = self.tables.write();
        let Some(rule) = tables.rule_mut(id) else {
            return Ok(Outcome::NotFound);
        };
        rule.action = action;
        rule.apps = apps;
        drop(tables);

        debug!(rule = id, %action, "updated rule");
        Ok(Outcome::Applied)
    }

    /// Copy of the rule with the given id.
    pub fn find_rule(&self, id: &str) -> Option<Rule> {
        self.tables.read().rule(id).cloned()
    }

    /// Destroys every rule regardless of its reference count. Meant for full
    /// teardown after [`clean_groups`](Self::clean_groups).
    ///
    /// Groups still bound to a destroyed rule are unbound in the same write,
    /// so a rule later added under the same id does not inherit their links.
    pub fn clean_rules(&self) -> usize {
        let mut tables = self.tables.write();
        let referenced = tables.rules.iter().filter(|r| r.refer_count > 0).count();
        if referenced > 0 {
            warn!(referenced, "cleaning rules that are still referenced by groups");
        }
        let removed = std::mem::take(&mut tables.rules).len();
        for group in tables.groups.iter_mut() {
            group.rule_id = None;
        }
        drop(tables);

        if removed > 0 {
            info!(removed, "cleaned rules");
        }
        removed
    }

    // -- Groups ---------------------------------------------------------------

    /// Adds a group bound to `rule_id`. An unknown rule id leaves the group
    /// unbound; that is not an error.
    pub fn add_group(
        &self,
        id: &str,
        macs: &[MacAddr],
        rule_id: Option<&str>,
    ) -> Result<Outcome, PolicyError> {
        validate_id(EntityKind::Group, id, GROUP_ID_SIZE)?;
        check_capacity("address set", macs.len(), MAX_MAC_IN_GROUP)?;
        let macs = used_macs(macs);

        let mut tables = self.tables.write();
        if tables.group_index(id).is_some() {
            return Err(PolicyError::Duplicate {
                kind: EntityKind::Group,
                id: id.to_string(),
            });
        }
        let bound = tables.acquire(rule_id);
        if bound.is_none() && rule_id.is_some() {
            debug!(group = id, rule = ?rule_id, "rule not found; group left unbound");
        }
        tables.groups.push(Group {
            id: id.to_string(),
            macs,
            rule_id: bound.clone(),
        });
        drop(tables);

        debug!(group = id, rule = ?bound, "added group");
        Ok(Outcome::Applied)
    }

    /// Removes a group, releasing its reference on the bound rule.
    pub fn remove_group(&self, id: &str) -> Result<Outcome, PolicyError> {
        let mut tables = self.tables.write();
        let Some(index) = tables.group_index(id) else {
            return Ok(Outcome::NotFound);
        };
        let group = tables.groups.remove(index);
        tables.release(group.rule_id.as_deref());
        drop(tables);

        debug!(group = id, "removed group");
        Ok(Outcome::Applied)
    }

    /// Replaces a group's addresses and rebinds it to `rule_id`.
    ///
    /// The previous rule loses one reference and the new one, if it exists,
    /// gains one. A missing group changes nothing, not even reference counts.
    pub fn set_group(
        &self,
        id: &str,
        macs: &[MacAddr],
        rule_id: Option<&str>,
    ) -> Result<Outcome, PolicyError> {
        check_capacity("address set", macs.len(), MAX_MAC_IN_GROUP)?;
        let macs = used_macs(macs);

        let mut tables = self.tables.write();
        let Some(index) = tables.group_index(id) else {
            return Ok(Outcome::NotFound);
        };
        let previous = tables.groups[index].rule_id.take();
        tables.release(previous.as_deref());
        let bound = tables.acquire(rule_id);
        let group = &mut tables.groups[index];
        group.macs = macs;
        group.rule_id = bound.clone();
        drop(tables);

        debug!(group = id, from = ?previous, to = ?bound, "updated group");
        Ok(Outcome::Applied)
    }

    /// Copy of the group with the given id.
    pub fn find_group(&self, id: &str) -> Option<Group> {
        let tables = self.tables.read();
        tables.group_index(id).map(|i| tables.groups[i].clone())
    }

    /// Destroys every group, releasing each one's rule reference.
    pub fn clean_groups(&self) -> usize {
        let mut tables = self.tables.write();
        let groups = std::mem::take(&mut tables.groups);
        for group in &groups {
            tables.release(group.rule_id.as_deref());
        }
        drop(tables);

        if !groups.is_empty() {
            info!(removed = groups.len(), "cleaned groups");
        }
        groups.len()
    }

    // -- Whole-store ----------------------------------------------------------

    /// Snapshot of all rules in insertion order.
    pub fn rules(&self) -> Vec<Rule> {
        self.tables.read().rules.clone()
    }

    /// Snapshot of all groups in insertion order.
    pub fn groups(&self) -> Vec<Group> {
        self.tables.read().groups.clone()
    }

    /// Swaps in the contents of a fully built store in one exclusive section.
    ///
    /// Readers observe either the old policy or the new one, never a mix.
    pub fn replace_with(&self, next: PolicyStore) {
        let incoming = next.tables.into_inner();
        let (rules, groups, drop_anonymous) = (
            incoming.rules.len(),
            incoming.groups.len(),
            incoming.drop_anonymous,
        );

        let previous = std::mem::replace(&mut *self.tables.write(), incoming);
        drop(previous);

        info!(rules, groups, drop_anonymous, "replaced policy");
    }
}

fn validate_id(kind: EntityKind, id: &str, max: usize) -> Result<(), PolicyError> {
    if id.is_empty() {
        return Err(PolicyError::EmptyId { kind });
    }
    if id.len() > max {
        return Err(PolicyError::IdTooLong {
            kind,
            id: id.to_string(),
            max,
        });
    }
    Ok(())
}

fn check_capacity(what: &'static str, len: usize, max: usize) -> Result<(), PolicyError> {
    if len > max {
        return Err(PolicyError::CapacityExceeded { what, len, max });
    }
    Ok(())
}
