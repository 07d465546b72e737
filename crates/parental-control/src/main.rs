mod admin;
mod cli;
mod config;
mod export;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use audit_log::{AuditEntry, AuditEventType, AuditSink, AuditSource};
use policy_store::{AppCatalog, MacAddr, ReportView};

use crate::admin::PolicyAdmin;
use crate::cli::{Cli, Command};
use crate::config::Config;

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

/// Validate the policy file and print what it would load.
fn check(cfg: &Config) -> Result<()> {
    let (store, catalog, summary) = admin::build(&cfg.policy_file)?;

    println!("policy file:     {}", cfg.policy_file.display());
    println!("apps:            {}", catalog.len());
    println!("rules:           {}", summary.rules.len());
    println!("groups:          {}", summary.groups);
    println!("drop anonymous:  {}", store.drop_anonymous());
    for rule in summary.rules.iter().filter(|r| r.rejected() > 0) {
        println!(
            "rule '{}': {} of {} exception apps rejected",
            rule.id,
            rule.rejected(),
            rule.offered
        );
    }
    Ok(())
}

fn report(cfg: &Config, view: ReportView) -> Result<()> {
    let (store, catalog, _) = admin::build(&cfg.policy_file)?;
    print!("{}", view.render(&store, &catalog));
    Ok(())
}

fn resolve(cfg: &Config, mac: MacAddr) -> Result<()> {
    let (store, catalog, _) = admin::build(&cfg.policy_file)?;

    let rule = store.rule_for_address(&mac, store.drop_anonymous());
    let app_names: Vec<&str> = rule
        .iter()
        .flat_map(|r| r.apps.iter())
        .map(|&id| catalog.app_name(id).unwrap_or("unknown"))
        .collect();
    let decision = serde_json::json!({
        "mac": mac,
        "group": store.find_group_by_address(&mac).map(|g| g.id),
        "action": store.action_for_address(&mac),
        "rule": rule,
        "app_names": app_names,
    });
    let rendered = serde_json::to_string_pretty(&decision).context("failed to render decision")?;
    println!("{rendered}");
    Ok(())
}

/// Publish the report views when a report directory is configured. A failure
/// here never takes the policy down.
fn publish(cfg: &Config, admin: &PolicyAdmin) {
    if let Some(dir) = cfg.report.dir.as_deref() {
        if let Err(err) = export::write_reports(dir, admin.store(), admin.catalog()) {
            warn!(error = %format!("{err:#}"), "failed to write report views");
        }
    }
}

#[cfg(unix)]
async fn serve(cfg: &Config, cli: &Cli) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let (audit, audit_handle) = AuditSink::start(&cfg.logging.audit_log_path)
        .await
        .context("failed to start audit logger")?;

    audit
        .log(AuditEntry::new(
            AuditEventType::ProcessStarted,
            AuditSource::new("parental-control"),
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "config_file": cli.config.display().to_string(),
            }),
        ))
        .await;

    let mut admin = PolicyAdmin::load(cfg.policy_file.clone(), audit.clone())
        .await
        .context("failed to load policy")?;
    publish(cfg, &admin);

    let mut sighup = signal(SignalKind::hangup()).context("failed to register SIGHUP handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;

    info!(policy_file = %cfg.policy_file.display(), "serving policy");

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!("received SIGHUP; reloading policy");
                if admin.reload().await.is_ok() {
                    publish(cfg, &admin);
                }
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                break;
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    error!(%err, "failed to listen for SIGINT");
                }
                info!("received SIGINT (ctrl-c)");
                break;
            }
        }
    }

    let (groups, rules) = admin.teardown().await;
    publish(cfg, &admin);
    info!(groups, rules, "policy torn down; shutting down");

    audit
        .log(AuditEntry::new(
            AuditEventType::ProcessStopped,
            AuditSource::new("parental-control"),
            serde_json::json!({ "groups_removed": groups, "rules_removed": rules }),
        ))
        .await;

    let dropped = audit.dropped();
    drop(admin);
    drop(audit);
    match audit_handle.await {
        Ok(written) => info!(written, dropped, "audit log closed"),
        Err(err) => error!(%err, "audit writer task failed"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn serve(_cfg: &Config, _cli: &Cli) -> Result<()> {
    anyhow::bail!("serve requires unix signals")
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then init tracing-subscriber with JSON format on stderr;
    //    stdout carries subcommand output.
    let loaded = config::load(&cli.config)?;
    let config_missing = loaded.is_none();
    let mut cfg = loaded.unwrap_or_default();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    if config_missing {
        warn!(
            path = %cli.config.display(),
            "configuration file not found; using defaults"
        );
    }

    // 3. Merge CLI overrides.
    if let Some(ref policy) = cli.policy {
        cfg.policy_file = policy.clone();
    }
    if let Some(ref dir) = cli.report_dir {
        cfg.report.dir = Some(dir.clone());
    }

    info!(
        config_file = %cli.config.display(),
        policy_file = %cfg.policy_file.display(),
        "parental-control starting"
    );

    // 4. Dispatch.
    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(&cfg, &cli).await,
        Command::Check => check(&cfg),
        Command::Report { view } => report(&cfg, view.into()),
        Command::Resolve { mac } => resolve(&cfg, mac),
    }
}
