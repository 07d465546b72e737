use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use audit_log::{AuditEntry, AuditEventType, AuditSink, AuditSource, PolicyChangeRecord};
use policy_store::loader::{self, BuildSummary};
use policy_store::{PolicyStore, StaticCatalog};

const COMPONENT: &str = "parental-control";

/// Owns the live policy: loads it from disk, swaps in reloads and tears it
/// down, recording every step in the audit log.
pub struct PolicyAdmin {
    store: Arc<PolicyStore>,
    catalog: StaticCatalog,
    policy_file: PathBuf,
    audit: AuditSink,
}

impl PolicyAdmin {
    /// Loads `policy_file` into a new store.
    pub async fn load(policy_file: PathBuf, audit: AuditSink) -> Result<Self> {
        let (store, catalog, summary) = build(&policy_file)?;
        let admin = Self {
            store: Arc::new(store),
            catalog,
            policy_file,
            audit,
        };

        info!(
            policy_file = %admin.policy_file.display(),
            rules = summary.rules.len(),
            groups = summary.groups,
            "policy loaded"
        );
        admin.record_build(AuditEventType::PolicyLoaded, &summary).await;
        Ok(admin)
    }

    /// Rebuilds the policy from disk and swaps it in. On failure the current
    /// policy stays in force and the error is returned.
    pub async fn reload(&mut self) -> Result<BuildSummary> {
        match build(&self.policy_file) {
            Ok((next, catalog, summary)) => {
                self.store.replace_with(next);
                self.catalog = catalog;
                info!(
                    policy_file = %self.policy_file.display(),
                    rules = summary.rules.len(),
                    groups = summary.groups,
                    "policy reloaded"
                );
                self.record_build(AuditEventType::PolicyReloaded, &summary).await;
                Ok(summary)
            }
            Err(err) => {
                warn!(
                    policy_file = %self.policy_file.display(),
                    error = %format!("{err:#}"),
                    "policy reload failed; keeping current policy"
                );
                self.audit
                    .log(AuditEntry::new(
                        AuditEventType::PolicyReloadFailed,
                        self.source(),
                        serde_json::json!({ "error": format!("{err:#}") }),
                    ))
                    .await;
                Err(err)
            }
        }
    }

    /// Destroys every group, then every rule. Returns `(groups, rules)` removed.
    pub async fn teardown(&self) -> (usize, usize) {
        let groups = self.store.clean_groups();
        let rules = self.store.clean_rules();

        self.audit
            .log(AuditEntry::new(
                AuditEventType::PolicyCleared,
                self.source(),
                serde_json::json!({ "groups": groups, "rules": rules }),
            ))
            .await;
        (groups, rules)
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn catalog(&self) -> &StaticCatalog {
        &self.catalog
    }

    fn source(&self) -> AuditSource {
        AuditSource::new(COMPONENT).with_policy_file(self.policy_file.display().to_string())
    }

    async fn record_build(&self, event: AuditEventType, summary: &BuildSummary) {
        self.audit
            .log(AuditEntry::new(
                event,
                self.source(),
                serde_json::json!({
                    "rules": summary.rules.len(),
                    "groups": summary.groups,
                    "drop_anonymous": self.store.drop_anonymous(),
                    "rejected_exceptions": summary.rejected_exceptions(),
                }),
            ))
            .await;

        for rule in &summary.rules {
            self.audit
                .log(
                    AuditEntry::new(
                        AuditEventType::RuleAdded,
                        self.source(),
                        serde_json::json!({ "exceptions": rule.accepted }),
                    )
                    .with_change(PolicyChangeRecord::new("rule", &rule.id, "applied")),
                )
                .await;

            if rule.rejected() > 0 {
                self.audit
                    .log(
                        AuditEntry::new(
                            AuditEventType::ExceptionRejected,
                            self.source(),
                            serde_json::json!({
                                "offered": rule.offered,
                                "accepted": rule.accepted,
                            }),
                        )
                        .with_change(PolicyChangeRecord::new("rule", &rule.id, "partial")),
                    )
                    .await;
            }
        }

        for group in self.store.groups() {
            self.audit
                .log(
                    AuditEntry::new(
                        AuditEventType::GroupAdded,
                        self.source(),
                        serde_json::json!({
                            "macs": group.macs.len(),
                            "rule": group.rule_id,
                        }),
                    )
                    .with_change(PolicyChangeRecord::new("group", &group.id, "applied")),
                )
                .await;
        }
    }
}

/// Reads, validates and builds a policy file without touching any live store.
pub fn build(path: &Path) -> Result<(PolicyStore, StaticCatalog, BuildSummary)> {
    let file = loader::load_policy(path)?;
    let catalog = loader::catalog(&file);
    let (store, summary) = loader::build_store(&file)
        .with_context(|| format!("failed to build policy from {}", path.display()))?;
    Ok((store, catalog, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_store::{Action, MacAddr};

    const POLICY: &str = r#"
version: "1.0"
apps:
  - id: 7
    name: games
rules:
  - id: bedtime
    action: drop
    apps: [7]
    exceptions:
      - "tcp:443:school.example.org"
      - "bogus"
groups:
  - id: kids
    macs: ["aa:bb:cc:dd:ee:01"]
    rule: bedtime
"#;

    const RELAXED: &str = r#"
version: "1.0"
drop_anonymous: true
rules:
  - id: daytime
    action: accept
groups:
  - id: kids
    macs: ["aa:bb:cc:dd:ee:01"]
    rule: daytime
"#;

    fn tablet() -> MacAddr {
        "aa:bb:cc:dd:ee:01".parse().unwrap()
    }

    fn events(path: &Path) -> Vec<AuditEventType> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<AuditEntry>(l).unwrap().event_type)
            .collect()
    }

    #[tokio::test]
    async fn load_reload_and_teardown_are_audited() {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("policy.yaml");
        let audit_path = dir.path().join("audit.jsonl");
        std::fs::write(&policy, POLICY).unwrap();

        let (sink, handle) = AuditSink::start(&audit_path).await.unwrap();
        let mut admin = PolicyAdmin::load(policy.clone(), sink).await.unwrap();
        assert_eq!(admin.store().action_for_address(&tablet()), Action::Drop);
        assert_eq!(admin.store().find_rule("bedtime").unwrap().exceptions.len(), 1);

        std::fs::write(&policy, RELAXED).unwrap();
        let summary = admin.reload().await.unwrap();
        assert_eq!(summary.groups, 1);
        assert_eq!(admin.store().action_for_address(&tablet()), Action::Accept);
        assert!(admin.store().drop_anonymous());
        assert!(admin.store().find_rule("bedtime").is_none());

        assert_eq!(admin.teardown().await, (1, 1));
        assert!(admin.store().rules().is_empty());

        drop(admin);
        handle.await.unwrap();

        assert_eq!(
            events(&audit_path),
            [
                AuditEventType::PolicyLoaded,
                AuditEventType::RuleAdded,
                AuditEventType::ExceptionRejected,
                AuditEventType::GroupAdded,
                AuditEventType::PolicyReloaded,
                AuditEventType::RuleAdded,
                AuditEventType::GroupAdded,
                AuditEventType::PolicyCleared,
            ]
        );
    }

    #[tokio::test]
    async fn failed_reload_keeps_current_policy() {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("policy.yaml");
        let audit_path = dir.path().join("audit.jsonl");
        std::fs::write(&policy, POLICY).unwrap();

        let (sink, handle) = AuditSink::start(&audit_path).await.unwrap();
        let mut admin = PolicyAdmin::load(policy.clone(), sink).await.unwrap();

        std::fs::write(&policy, "version: \"2.0\"\n").unwrap();
        assert!(admin.reload().await.is_err());
        assert_eq!(admin.store().action_for_address(&tablet()), Action::Drop);
        assert!(admin.store().find_group("kids").is_some());

        drop(admin);
        handle.await.unwrap();
        assert_eq!(events(&audit_path).last(), Some(&AuditEventType::PolicyReloadFailed));
    }

    #[tokio::test]
    async fn missing_policy_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let (sink, _handle) = AuditSink::start(dir.path().join("audit.jsonl")).await.unwrap();

        let err = PolicyAdmin::load(dir.path().join("absent.yaml"), sink)
            .await
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("failed to read policy file"));
    }
}
