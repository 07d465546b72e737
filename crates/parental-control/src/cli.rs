use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use policy_store::{MacAddr, ReportView};

#[derive(Parser, Debug)]
#[command(
    name = "parental-control",
    version,
    about = "Per-device network access policy engine"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to the policy file (overrides config file setting)
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// Directory receiving the report listings (overrides config file setting)
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load the policy and keep it live: SIGHUP reloads, SIGINT/SIGTERM tears down
    Serve,
    /// Validate the policy file and report what it would load
    Check,
    /// Print one report view of the loaded policy
    Report {
        #[arg(value_enum, default_value_t = View::Rule)]
        view: View,
    },
    /// Show the decision for a hardware address
    Resolve {
        /// Address in aa:bb:cc:dd:ee:ff form
        mac: MacAddr,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Rule,
    Group,
    App,
    DropAnonymous,
}

impl From<View> for ReportView {
    fn from(view: View) -> Self {
        match view {
            View::Rule => ReportView::Rule,
            View::Group => ReportView::Group,
            View::App => ReportView::App,
            View::DropAnonymous => ReportView::DropAnonymous,
        }
    }
}
