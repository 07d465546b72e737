use std::collections::BTreeMap;
use std::fmt::Write as _;

/// The app feature database as seen by the store: a source of generic
/// app-category names and the owner of the app listing view.
pub trait AppCatalog: Send + Sync {
    fn app_name(&self, id: u32) -> Option<&str>;

    /// Human-readable listing of every known app.
    fn render(&self) -> String;
}

/// A fixed id → name table, typically loaded from the policy file.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    apps: BTreeMap<u32, String>,
}

impl StaticCatalog {
    pub fn new(apps: impl IntoIterator<Item = (u32, String)>) -> Self {
        Self {
            apps: apps.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

impl AppCatalog for StaticCatalog {
    fn app_name(&self, id: u32) -> Option<&str> {
        self.apps.get(&id).map(String::as_str)
    }

    fn render(&self) -> String {
        let mut out = String::from("ID\tName\n");
        for (id, name) in &self.apps {
            let _ = writeln!(out, "{id}\t{name}");
        }
        out
    }
}
