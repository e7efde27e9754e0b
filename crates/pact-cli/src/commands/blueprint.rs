//! `pact blueprint ...` handlers.

use anyhow::{Context, Result};
use pact_schemas::{Blueprint, BlueprintRequest};
use pact_service::ContractService;
use std::fs;

fn print_blueprint(bp: &Blueprint) {
    println!("blueprint_id={}", bp.id);
    println!("name={}", bp.name);
    println!("created_at_utc={}", bp.created_at.to_rfc3339());
    println!("fields={}", bp.fields.len());
    for f in &bp.fields {
        println!(
            "  field_id={} type={} label={} x={} y={}",
            f.id, f.field_type, f.label, f.position_x, f.position_y
        );
    }
}

pub async fn list(svc: &ContractService) -> Result<()> {
    for bp in svc.list_blueprints().await? {
        println!(
            "blueprint_id={} name={} fields={} created_at_utc={}",
            bp.id,
            bp.name,
            bp.fields.len(),
            bp.created_at.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn show(svc: &ContractService, id: i64) -> Result<()> {
    let bp = svc.get_blueprint(id).await?;
    print_blueprint(&bp);
    Ok(())
}

pub async fn create(svc: &ContractService, file: &str) -> Result<()> {
    let raw = fs::read_to_string(file).with_context(|| format!("read blueprint file: {file}"))?;
    let req: BlueprintRequest =
        serde_json::from_str(&raw).context("blueprint file must contain valid JSON")?;
    let bp = svc.create_blueprint(req).await?;
    print_blueprint(&bp);
    Ok(())
}

pub async fn delete(svc: &ContractService, id: i64) -> Result<()> {
    svc.delete_blueprint(id).await?;
    println!("deleted=true blueprint_id={}", id);
    Ok(())
}
