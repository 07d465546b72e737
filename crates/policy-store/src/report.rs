//! Tab-separated text views of the store, one per listing file.
//!
//! Each view is rendered under a single read lock, so it reflects one
//! consistent state of the store.

use std::fmt::{self, Write as _};

use crate::catalog::AppCatalog;
use crate::except_app::ExceptApp;
use crate::model::Rule;
use crate::store::PolicyStore;

const SEPARATOR: &str = "=======================================================";

/// The four listings exposed for operational visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportView {
    Rule,
    Group,
    App,
    DropAnonymous,
}

impl ReportView {
    pub const ALL: [ReportView; 4] = [Self::Rule, Self::Group, Self::App, Self::DropAnonymous];

    /// Name of the listing file holding this view.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Group => "group",
            Self::App => "app",
            Self::DropAnonymous => "drop_anonymous",
        }
    }

    pub fn render(self, store: &PolicyStore, catalog: &dyn AppCatalog) -> String {
        match self {
            Self::Rule => render_rules(store),
            Self::Group => render_groups(store),
            Self::App => catalog.render(),
            Self::DropAnonymous => render_drop_anonymous(store),
        }
    }
}

impl fmt::Display for ReportView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

pub fn render_rules(store: &PolicyStore) -> String {
    let mut out = String::from("ID\tAction\tRefer_count\tAPPs\n");
    let tables = store.read();
    for rule in &tables.rules {
        write_rule(&mut out, rule);
    }
    out
}

fn write_rule(out: &mut String, rule: &Rule) {
    let _ = write!(out, "{}\t{}\t{}\t[ ", rule.id, rule.action, rule.refer_count);
    for app in &rule.apps {
        let _ = write!(out, "{app} ");
    }
    out.push_str("]\n");

    out.push_str("EXCEPTION APPS:\n");
    out.push_str("ID\tName\tProto\tSport\tDport\tHost_url\tRequest_url\tDataDictionary\n");
    for app in &rule.exceptions {
        write_exception(out, app);
    }
    out.push_str(SEPARATOR);
    out.push_str("\n\n");
}

fn write_exception(out: &mut String, app: &ExceptApp) {
    let dictionary = app
        .signatures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("&&");
    let _ = writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        app.app_id(),
        app.name,
        app.proto,
        app.sport,
        app.dports,
        app.host_url,
        app.request_url,
        dictionary
    );
}

pub fn render_groups(store: &PolicyStore) -> String {
    let mut out = String::from("ID\tRule_ID\tMACs\n");
    let tables = store.read();
    for group in &tables.groups {
        let rule_id = tables.bound_rule(group).map_or("NULL", |r| r.id.as_str());
        let _ = write!(out, "{}\t{}\t[ ", group.id, rule_id);
        for mac in &group.macs {
            let _ = write!(out, "{mac} ");
        }
        out.push_str("]\n");
    }
    out
}

pub fn render_drop_anonymous(store: &PolicyStore) -> String {
    let flag = if store.drop_anonymous() { "YES" } else { "NO" };
    format!("{flag}\n")
}
