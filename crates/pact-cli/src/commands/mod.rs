//! Command handler modules for pact-cli.
//!
//! Shared utilities and the commands that need no database live here;
//! blueprint and contract commands live in the submodules.

pub mod blueprint;
pub mod contract;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use pact_config::{report_unused_keys, UnusedKeyPolicy, DAEMON_CONSUMED_POINTERS};
use pact_db::PgStore;
use pact_lifecycle::{allowed_transitions, can_edit_fields, is_terminal};
use pact_schemas::ContractStatus;
use pact_service::ContractService;
use tracing::info;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Connect via PACT_DATABASE_URL and wrap the pool in a service.
pub async fn connect_service() -> Result<ContractService> {
    let pool = pact_db::connect_from_env().await?;
    info!("connected to postgres");
    Ok(ContractService::new(Arc::new(PgStore::new(pool))))
}

pub fn parse_status(raw: &str) -> Result<ContractStatus> {
    ContractStatus::parse(raw.trim()).ok_or_else(|| {
        anyhow!(
            "unknown status '{}'. expected one of: {}",
            raw,
            join_statuses(&ContractStatus::ALL)
        )
    })
}

pub fn join_statuses(statuses: &[ContractStatus]) -> String {
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// config-hash
// ---------------------------------------------------------------------------

pub fn config_hash(paths: &[String]) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = pact_config::load_layered_yaml(&path_refs)?;

    let report = report_unused_keys(
        DAEMON_CONSUMED_POINTERS,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
    }

    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

// ---------------------------------------------------------------------------
// policy
// ---------------------------------------------------------------------------

pub fn policy(status: Option<&str>) -> Result<()> {
    match status {
        Some(raw) => print_policy(parse_status(raw)?),
        None => {
            for s in ContractStatus::ALL {
                print_policy(s);
            }
        }
    }
    Ok(())
}

fn print_policy(s: ContractStatus) {
    println!(
        "status={} allowed_transitions={} fields_editable={} terminal={}",
        s,
        join_statuses(allowed_transitions(s)),
        can_edit_fields(s),
        is_terminal(s)
    );
}
