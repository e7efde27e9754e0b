use chrono::{DateTime, Utc};
use pact_lifecycle::{allowed_transitions, can_edit_fields};
use pact_schemas::{Contract, ContractField, ContractStatus};
use serde::{Deserialize, Serialize};

/// Outward representation of a contract. `allowed_transitions` and
/// `fields_editable` are derived from the lifecycle policy at read time and
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractView {
    pub id: i64,
    pub name: String,
    /// Blueprint id.
    pub blueprint: i64,
    pub blueprint_name: String,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub fields: Vec<ContractField>,
    pub allowed_transitions: Vec<ContractStatus>,
    pub fields_editable: bool,
}

impl From<Contract> for ContractView {
    fn from(c: Contract) -> Self {
        Self {
            id: c.id,
            name: c.name,
            blueprint: c.blueprint_id,
            blueprint_name: c.blueprint_name,
            status: c.status,
            created_at: c.created_at,
            fields: c.fields,
            allowed_transitions: allowed_transitions(c.status).to_vec(),
            fields_editable: can_edit_fields(c.status),
        }
    }
}
