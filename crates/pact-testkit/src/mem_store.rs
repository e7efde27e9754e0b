//! In-memory [`Store`] with the same atomicity as the Postgres one.
//!
//! Every method takes the single mutex for its whole duration and validates
//! before mutating, so a failed call leaves no partial state behind.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pact_db::{BlueprintDelete, ContractFilter, FieldWrite, StatusWrite, Store};
use pact_lifecycle::{can_edit_fields, check_transition};
use pact_schemas::{
    Blueprint, BlueprintField, BlueprintPatch, Contract, ContractField, ContractStatus, FieldSpec,
    NewBlueprint,
};

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    seq: Sequences,
    blueprints: BTreeMap<i64, BlueprintRow>,
    contracts: BTreeMap<i64, ContractRow>,
}

/// One id sequence per table, like `bigserial`.
#[derive(Default)]
struct Sequences {
    blueprint: i64,
    blueprint_field: i64,
    contract: i64,
    contract_field: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

struct BlueprintRow {
    name: String,
    created_at: DateTime<Utc>,
    fields: Vec<BlueprintField>,
}

struct ContractRow {
    name: String,
    blueprint_id: i64,
    status: ContractStatus,
    created_at: DateTime<Utc>,
    fields: Vec<ContractField>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| anyhow!("mem store mutex poisoned"))
    }

    pub fn blueprint_count(&self) -> Result<usize> {
        Ok(self.lock()?.blueprints.len())
    }

    pub fn contract_count(&self) -> Result<usize> {
        Ok(self.lock()?.contracts.len())
    }
}

impl Inner {
    fn materialize_fields(&mut self, fields: &[FieldSpec]) -> Vec<BlueprintField> {
        fields
            .iter()
            .map(|f| BlueprintField {
                id: next(&mut self.seq.blueprint_field),
                field_type: f.field_type,
                label: f.label.clone(),
                position_x: f.position_x,
                position_y: f.position_y,
            })
            .collect()
    }

    fn blueprint(&self, id: i64) -> Option<Blueprint> {
        self.blueprints.get(&id).map(|row| Blueprint {
            id,
            name: row.name.clone(),
            created_at: row.created_at,
            fields: row.fields.clone(),
        })
    }

    fn contract(&self, id: i64) -> Option<Contract> {
        let row = self.contracts.get(&id)?;
        let blueprint_name = self
            .blueprints
            .get(&row.blueprint_id)
            .map(|b| b.name.clone())
            .unwrap_or_default();
        Some(Contract {
            id,
            name: row.name.clone(),
            blueprint_id: row.blueprint_id,
            blueprint_name,
            status: row.status,
            created_at: row.created_at,
            fields: row.fields.clone(),
        })
    }
}

#[async_trait]
impl Store for MemStore {
    async fn insert_blueprint(&self, bp: &NewBlueprint) -> Result<Blueprint> {
        let mut g = self.lock()?;
        let id = next(&mut g.seq.blueprint);
        let fields = g.materialize_fields(&bp.fields);
        g.blueprints.insert(
            id,
            BlueprintRow {
                name: bp.name.clone(),
                created_at: Utc::now(),
                fields,
            },
        );
        g.blueprint(id).ok_or_else(|| anyhow!("inserted blueprint {id} vanished"))
    }

    async fn replace_blueprint(&self, id: i64, patch: &BlueprintPatch) -> Result<Option<Blueprint>> {
        let mut g = self.lock()?;
        if !g.blueprints.contains_key(&id) {
            return Ok(None);
        }
        let new_fields = patch.fields.as_ref().map(|f| g.materialize_fields(f));
        if let Some(row) = g.blueprints.get_mut(&id) {
            if let Some(name) = &patch.name {
                row.name = name.clone();
            }
            if let Some(fields) = new_fields {
                row.fields = fields;
            }
        }
        Ok(g.blueprint(id))
    }

    async fn fetch_blueprint(&self, id: i64) -> Result<Option<Blueprint>> {
        Ok(self.lock()?.blueprint(id))
    }

    async fn list_blueprints(&self) -> Result<Vec<Blueprint>> {
        let g = self.lock()?;
        // ids grow with insertion time, so descending id is newest first
        Ok(g.blueprints.keys().rev().filter_map(|id| g.blueprint(*id)).collect())
    }

    async fn delete_blueprint(&self, id: i64) -> Result<BlueprintDelete> {
        let mut g = self.lock()?;
        if !g.blueprints.contains_key(&id) {
            return Ok(BlueprintDelete::Missing);
        }
        let contracts = g.contracts.values().filter(|c| c.blueprint_id == id).count() as i64;
        if contracts > 0 {
            return Ok(BlueprintDelete::InUse { contracts });
        }
        g.blueprints.remove(&id);
        Ok(BlueprintDelete::Deleted)
    }

    async fn instantiate_contract(&self, blueprint_id: i64, name: &str) -> Result<Option<Contract>> {
        let mut g = self.lock()?;
        let Some(source) = g.blueprints.get(&blueprint_id).map(|b| b.fields.clone()) else {
            return Ok(None);
        };

        let fields = source
            .iter()
            .map(|f| ContractField {
                id: next(&mut g.seq.contract_field),
                field_type: f.field_type,
                label: f.label.clone(),
                position_x: f.position_x,
                position_y: f.position_y,
                value: None,
            })
            .collect();

        let id = next(&mut g.seq.contract);
        g.contracts.insert(
            id,
            ContractRow {
                name: name.to_string(),
                blueprint_id,
                status: ContractStatus::Created,
                created_at: Utc::now(),
                fields,
            },
        );
        Ok(g.contract(id))
    }

    async fn fetch_contract(&self, id: i64) -> Result<Option<Contract>> {
        Ok(self.lock()?.contract(id))
    }

    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>> {
        let g = self.lock()?;
        Ok(g
            .contracts
            .iter()
            .rev()
            .filter(|(_, row)| filter.matches(row.status))
            .filter_map(|(id, _)| g.contract(*id))
            .collect())
    }

    async fn delete_contract(&self, id: i64) -> Result<bool> {
        Ok(self.lock()?.contracts.remove(&id).is_some())
    }

    async fn write_status(&self, id: i64, target: ContractStatus) -> Result<StatusWrite> {
        let mut g = self.lock()?;
        let Some(row) = g.contracts.get_mut(&id) else {
            return Ok(StatusWrite::Missing);
        };
        if let Err(e) = check_transition(row.status, target) {
            return Ok(StatusWrite::Rejected(e));
        }
        row.status = target;
        g.contract(id)
            .map(StatusWrite::Applied)
            .ok_or_else(|| anyhow!("contract {id} vanished during write_status"))
    }

    async fn write_field_values(
        &self,
        id: i64,
        values: &BTreeMap<i64, Option<String>>,
    ) -> Result<FieldWrite> {
        let mut g = self.lock()?;
        let Some(row) = g.contracts.get_mut(&id) else {
            return Ok(FieldWrite::Missing);
        };
        if !can_edit_fields(row.status) {
            return Ok(FieldWrite::Immutable(row.status));
        }

        let owned = values
            .keys()
            .filter(|fid| row.fields.iter().any(|f| f.id == **fid))
            .count();
        if owned != values.len() {
            return Ok(FieldWrite::ForeignIds {
                requested: values.len(),
                owned,
            });
        }

        for f in row.fields.iter_mut() {
            if let Some(v) = values.get(&f.id) {
                f.value = v.clone();
            }
        }
        g.contract(id)
            .map(FieldWrite::Applied)
            .ok_or_else(|| anyhow!("contract {id} vanished during write_field_values"))
    }
}
