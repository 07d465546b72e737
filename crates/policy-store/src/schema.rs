use serde::{Deserialize, Serialize};

use crate::mac::MacAddr;
use crate::model::Action;

/// Top-level policy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    /// Schema version; currently must be "1.0".
    pub version: String,
    /// Drop devices that belong to no group.
    #[serde(default)]
    pub drop_anonymous: bool,
    /// Names for the generic app-category ids referenced by rules.
    #[serde(default)]
    pub apps: Vec<AppEntry>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppEntry {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub action: Action,
    /// Generic app-category ids this rule applies to.
    #[serde(default)]
    pub apps: Vec<u32>,
    /// Exception apps as feature strings.
    #[serde(default)]
    pub exceptions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: String,
    #[serde(default)]
    pub macs: Vec<MacAddr>,
    /// Id of the rule this group is bound to.
    #[serde(default)]
    pub rule: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_file() {
        let yaml = r#"
version: "1.0"
"#;
        let file: PolicyFile = serde_yml::from_str(yaml).unwrap();
        assert_eq!(file.version, "1.0");
        assert!(!file.drop_anonymous);
        assert!(file.apps.is_empty());
        assert!(file.rules.is_empty());
        assert!(file.groups.is_empty());
    }

    #[test]
    fn deserialize_full_file() {
        let yaml = r#"
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
  - id: r2
    action: accept
groups:
  - id: kids
    macs: ["AA:BB:CC:DD:EE:01", "aa-bb-cc-dd-ee-02"]
    rule: r1
  - id: guests
"#;
        let file: PolicyFile = serde_yml::from_str(yaml).unwrap();
        assert!(file.drop_anonymous);
        assert_eq!(file.apps[0].name, "video");

        assert_eq!(file.rules.len(), 2);
        assert_eq!(file.rules[0].action, Action::Drop);
        assert_eq!(file.rules[0].exceptions, vec!["tcp:443:example.com"]);
        assert_eq!(file.rules[1].action, Action::Accept);
        assert!(file.rules[1].apps.is_empty());

        let kids = &file.groups[0];
        assert_eq!(kids.macs[1].to_string(), "aa:bb:cc:dd:ee:02");
        assert_eq!(kids.rule.as_deref(), Some("r1"));
        assert!(file.groups[1].rule.is_none());
    }

    #[test]
    fn reject_malformed_mac() {
        let yaml = r#"
version: "1.0"
groups:
  - id: kids
    macs: ["not-a-mac"]
"#;
        let err = serde_yml::from_str::<PolicyFile>(yaml).unwrap_err();
        assert!(err.to_string().contains("six octets"), "unexpected error: {err}");
    }

    #[test]
    fn reject_unknown_action() {
        let yaml = r#"
version: "1.0"
rules:
  - id: r1
    action: reject
"#;
        assert!(serde_yml::from_str::<PolicyFile>(yaml).is_err());
    }
}
