//! `pact contract ...` handlers.

use anyhow::{bail, Result};
use pact_db::ContractFilter;
use pact_schemas::{
    ContractCreateRequest, FieldValueUpdate, FieldValuesRequest, TransitionRequest,
};
use pact_service::{ContractService, ContractView, ServiceError};

use super::{join_statuses, parse_status};

fn print_contract(c: &ContractView) {
    println!("contract_id={}", c.id);
    println!("name={}", c.name);
    println!("blueprint_id={}", c.blueprint);
    println!("blueprint_name={}", c.blueprint_name);
    println!("status={}", c.status);
    println!("created_at_utc={}", c.created_at.to_rfc3339());
    println!("allowed_transitions={}", join_statuses(&c.allowed_transitions));
    println!("fields_editable={}", c.fields_editable);
    for f in &c.fields {
        println!(
            "  field_id={} type={} label={} value={}",
            f.id,
            f.field_type,
            f.label,
            f.value.as_deref().unwrap_or("NULL")
        );
    }
}

pub async fn list(svc: &ContractService, status: Option<&str>) -> Result<()> {
    let mut filter = ContractFilter::default();
    for part in status.unwrap_or_default().split(',') {
        if !part.trim().is_empty() {
            filter.statuses.push(parse_status(part)?);
        }
    }

    for c in svc.list_contracts(&filter).await? {
        println!(
            "contract_id={} name={} status={} blueprint_name={} created_at_utc={}",
            c.id,
            c.name,
            c.status,
            c.blueprint_name,
            c.created_at.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn show(svc: &ContractService, id: i64) -> Result<()> {
    let c = svc.get_contract(id).await?;
    print_contract(&c);
    Ok(())
}

pub async fn create(svc: &ContractService, blueprint_id: i64, name: String) -> Result<()> {
    let c = svc
        .instantiate(ContractCreateRequest {
            name: Some(name),
            blueprint_id: Some(blueprint_id),
        })
        .await?;
    print_contract(&c);
    Ok(())
}

pub async fn transition(svc: &ContractService, id: i64, to: String) -> Result<()> {
    let c = match svc
        .request_transition(id, TransitionRequest { new_status: Some(to) })
        .await
    {
        Err(ServiceError::InvalidTransition { current, attempted }) => {
            bail!("REFUSED: invalid lifecycle transition {current} -> {attempted}")
        }
        other => other?,
    };
    println!("transitioned=true contract_id={} status={}", c.id, c.status);
    Ok(())
}

pub async fn set_field(
    svc: &ContractService,
    id: i64,
    field_id: i64,
    value: Option<String>,
) -> Result<()> {
    let req = FieldValuesRequest {
        fields: Some(vec![FieldValueUpdate {
            id: Some(field_id),
            value,
        }]),
    };
    let c = svc.update_field_values(id, req).await?;
    print_contract(&c);
    Ok(())
}
