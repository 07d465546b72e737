use serde::{Deserialize, Serialize};

/// One administrative event affecting the policy store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    pub source: AuditSource,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<PolicyChangeRecord>,
}

impl AuditEntry {
    /// New entry with a fresh UUID v4 and the current UTC time.
    pub fn new(
        event_type: AuditEventType,
        source: AuditSource,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            event_type,
            source,
            details,
            change: None,
        }
    }

    /// Attach the entity-level change this event describes.
    pub fn with_change(mut self, change: PolicyChangeRecord) -> Self {
        self.change = Some(change);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ProcessStarted,
    ProcessStopped,
    PolicyLoaded,
    PolicyReloaded,
    PolicyReloadFailed,
    RuleAdded,
    GroupAdded,
    ExceptionRejected,
    PolicyCleared,
}

/// The component that produced an event and the policy file it acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSource {
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<String>,
}

impl AuditSource {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            policy_file: None,
        }
    }

    pub fn with_policy_file(mut self, path: impl Into<String>) -> Self {
        self.policy_file = Some(path.into());
        self
    }
}

/// A change to a single rule or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyChangeRecord {
    /// `"rule"` or `"group"`.
    pub entity: String,
    pub id: String,
    pub outcome: String,
}

impl PolicyChangeRecord {
    pub fn new(entity: impl Into<String>, id: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
            outcome: outcome.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_snake_case_event_and_skips_empty_fields() {
        let entry = AuditEntry::new(
            AuditEventType::PolicyLoaded,
            AuditSource::new("parental-control"),
            serde_json::json!({"rules": 2}),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["event_type"], "policy_loaded");
        assert_eq!(value["details"]["rules"], 2);
        assert!(value.get("change").is_none());
        assert!(value["source"].get("policy_file").is_none());
    }

    #[test]
    fn change_record_is_attached() {
        let entry = AuditEntry::new(
            AuditEventType::RuleAdded,
            AuditSource::new("admin").with_policy_file("/etc/pc/policy.yaml"),
            serde_json::Value::Null,
        )
        .with_change(PolicyChangeRecord::new("rule", "r1", "applied"));

        let line = serde_json::to_string(&entry).unwrap();
        let back: AuditEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(back.event_type, AuditEventType::RuleAdded);
        assert_eq!(back.change, Some(PolicyChangeRecord::new("rule", "r1", "applied")));
        assert_eq!(back.source.policy_file.as_deref(), Some("/etc/pc/policy.yaml"));
    }
}
