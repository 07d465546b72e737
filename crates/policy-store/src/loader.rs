use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::catalog::StaticCatalog;
use crate::schema::PolicyFile;
use crate::store::PolicyStore;

/// Load a [`PolicyFile`] from a YAML file on disk.
///
/// Validates the file after deserialization (version check, unique ids).
pub fn load_policy(path: impl AsRef<Path>) -> Result<PolicyFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file: {}", path.display()))?;
    load_policy_from_str(&contents)
        .with_context(|| format!("failed to parse policy file: {}", path.display()))
}

/// Parse and validate a [`PolicyFile`] from a YAML string.
pub fn load_policy_from_str(yaml: &str) -> Result<PolicyFile> {
    let file: PolicyFile = serde_yml::from_str(yaml).context("YAML deserialization failed")?;
    validate(&file)?;
    Ok(file)
}

/// Post-deserialization checks. References that cannot be resolved are only
/// warned about; the store treats them as unbound.
fn validate(file: &PolicyFile) -> Result<()> {
    if file.version != "1.0" {
        bail!(
            "unsupported policy version '{}'; only '1.0' is supported",
            file.version
        );
    }

    let mut rule_ids = HashSet::new();
    for rule in &file.rules {
        if rule.id.is_empty() {
            bail!("rule id must not be empty");
        }
        if !rule_ids.insert(rule.id.as_str()) {
            bail!("duplicate rule id: '{}'", rule.id);
        }
    }

    let mut group_ids = HashSet::new();
    for group in &file.groups {
        if group.id.is_empty() {
            bail!("group id must not be empty");
        }
        if !group_ids.insert(group.id.as_str()) {
            bail!("duplicate group id: '{}'", group.id);
        }
        if let Some(rule) = group.rule.as_deref() {
            if !rule_ids.contains(rule) {
                warn!(group = %group.id, rule, "group references an unknown rule; it will be unbound");
            }
        }
    }

    if !file.apps.is_empty() {
        let known: HashSet<u32> = file.apps.iter().map(|a| a.id).collect();
        for rule in &file.rules {
            for app in rule.apps.iter().filter(|a| **a != 0 && !known.contains(a)) {
                warn!(rule = %rule.id, app, "rule references an app id missing from the catalog");
            }
        }
    }

    Ok(())
}

/// Exception-app acceptance for one rule of a built policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSummary {
    pub id: String,
    pub accepted: usize,
    pub offered: usize,
}

impl RuleSummary {
    pub fn rejected(&self) -> usize {
        self.offered - self.accepted
    }
}

/// What [`build_store`] put into the new store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub rules: Vec<RuleSummary>,
    pub groups: usize,
}

impl BuildSummary {
    pub fn rejected_exceptions(&self) -> usize {
        self.rules.iter().map(RuleSummary::rejected).sum()
    }
}

/// Populate a fresh store from a validated policy file through the regular
/// CRUD operations: rules first, then the groups that bind to them.
pub fn build_store(file: &PolicyFile) -> Result<(PolicyStore, BuildSummary)> {
    let store = PolicyStore::new();
    store.set_drop_anonymous(file.drop_anonymous);

    let mut summary = BuildSummary::default();
    for rule in &file.rules {
        let accepted = store
            .add_rule(&rule.id, rule.action, &rule.apps, &rule.exceptions)
            .with_context(|| format!("failed to add rule '{}'", rule.id))?;
        summary.rules.push(RuleSummary {
            id: rule.id.clone(),
            accepted,
            offered: rule.exceptions.iter().filter(|s| !s.is_empty()).count(),
        });
    }

    for group in &file.groups {
        store
            .add_group(&group.id, &group.macs, group.rule.as_deref())
            .with_context(|| format!("failed to add group '{}'", group.id))?;
        summary.groups += 1;
    }

    debug!(
        rules = summary.rules.len(),
        groups = summary.groups,
        rejected_exceptions = summary.rejected_exceptions(),
        "built policy store"
    );
    Ok((store, summary))
}

/// The app catalog declared by the policy file.
pub fn catalog(file: &PolicyFile) -> StaticCatalog {
    StaticCatalog::new(file.apps.iter().map(|a| (a.id, a.name.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AppCatalog;
    use crate::mac::MacAddr;
    use crate::model::Action;

    const POLICY: &str = r#"
version: "1.0"
drop_anonymous: true
apps:
  - id: 1001
    name: video
rules:
  - id: r1
    action: drop
    apps: [1001]
    exceptions:
      - "tcp:443:example.com"
      - "tcp:1"
  - id: r2
    action: accept
groups:
  - id: kids
    macs: ["aa:bb:cc:dd:ee:01"]
    rule: r1
  - id: lost
    macs: ["aa:bb:cc:dd:ee:02"]
    rule: missing
"#;

    #[test]
    fn load_minimal_policy() {
        let file = load_policy_from_str("version: \"1.0\"\n").unwrap();
        assert!(file.rules.is_empty());
        assert!(file.groups.is_empty());
    }

    #[test]
    fn reject_wrong_version() {
        let err = load_policy_from_str("version: \"2.0\"\n").unwrap_err();
        assert!(
            err.to_string().contains("unsupported policy version"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_duplicate_rule_ids() {
        let yaml = r#"
version: "1.0"
rules:
  - id: dup
    action: accept
  - id: dup
    action: drop
"#;
        let err = load_policy_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate rule id"), "unexpected error: {err}");
    }

    #[test]
    fn reject_duplicate_group_ids() {
        let yaml = r#"
version: "1.0"
groups:
  - id: g
  - id: g
"#;
        let err = load_policy_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate group id"), "unexpected error: {err}");
    }

    #[test]
    fn reject_empty_group_id() {
        let yaml = r#"
version: "1.0"
groups:
  - id: ""
"#;
        let err = load_policy_from_str(yaml).unwrap_err();
        assert!(err.to_string().contains("must not be empty"), "unexpected error: {err}");
    }

    #[test]
    fn load_from_nonexistent_file() {
        let err = load_policy("/does/not/exist.yaml").unwrap_err();
        assert!(
            err.to_string().contains("failed to read policy file"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn build_store_populates_and_summarizes() {
        let file = load_policy_from_str(POLICY).unwrap();
        let (store, summary) = build_store(&file).unwrap();

        assert!(store.drop_anonymous());
        assert_eq!(summary.groups, 2);
        assert_eq!(
            summary.rules[0],
            RuleSummary {
                id: "r1".into(),
                accepted: 1,
                offered: 2
            }
        );
        assert_eq!(summary.rejected_exceptions(), 1);

        assert_eq!(store.find_rule("r1").unwrap().refer_count, 1);
        assert!(store.find_group("lost").unwrap().rule_id.is_none());

        let kid: MacAddr = "aa:bb:cc:dd:ee:01".parse().unwrap();
        assert_eq!(store.action_for_address(&kid), Action::Drop);
    }

    #[test]
    fn build_store_surfaces_store_errors() {
        let yaml = format!(
            "version: \"1.0\"\nrules:\n  - id: {}\n    action: drop\n",
            "r".repeat(40)
        );
        let file = load_policy_from_str(&yaml).unwrap();
        let err = build_store(&file).unwrap_err();
        assert!(err.to_string().contains("failed to add rule"), "unexpected error: {err}");
    }

    #[test]
    fn catalog_from_file() {
        let file = load_policy_from_str(POLICY).unwrap();
        assert_eq!(catalog(&file).app_name(1001), Some("video"));
    }
}
