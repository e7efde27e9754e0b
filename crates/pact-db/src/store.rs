//! The persistence seam between the contract service and its backing store.
//!
//! Every method that writes more than one row is atomic: either all of its
//! rows become visible or none do. Methods that are gated by the lifecycle
//! policy (`write_status`, `write_field_values`) re-check the policy against
//! the row they lock, so the decision and the write cannot be separated by a
//! concurrent request.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use pact_lifecycle::TransitionError;
use pact_schemas::{Blueprint, BlueprintPatch, Contract, ContractStatus, NewBlueprint};

/// Outcome of [`Store::delete_blueprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlueprintDelete {
    Deleted,
    Missing,
    /// At least one contract still references the blueprint.
    InUse { contracts: i64 },
}

/// Outcome of [`Store::write_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusWrite {
    Applied(Contract),
    Missing,
    Rejected(TransitionError),
}

/// Outcome of [`Store::write_field_values`]. Anything but `Applied` means
/// zero rows were changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWrite {
    Applied(Contract),
    Missing,
    Immutable(ContractStatus),
    /// `requested` distinct ids were submitted but only `owned` belong to
    /// the contract.
    ForeignIds { requested: usize, owned: usize },
}

/// Filter for [`Store::list_contracts`]. An empty status list matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractFilter {
    pub statuses: Vec<ContractStatus>,
}

impl ContractFilter {
    pub fn matches(&self, status: ContractStatus) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&status)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a blueprint and its fields (in order) in one transaction.
    async fn insert_blueprint(&self, bp: &NewBlueprint) -> Result<Blueprint>;

    /// Rename and/or replace all fields of a blueprint. `None` if absent.
    async fn replace_blueprint(&self, id: i64, patch: &BlueprintPatch) -> Result<Option<Blueprint>>;

    async fn fetch_blueprint(&self, id: i64) -> Result<Option<Blueprint>>;

    /// Newest first.
    async fn list_blueprints(&self) -> Result<Vec<Blueprint>>;

    async fn delete_blueprint(&self, id: i64) -> Result<BlueprintDelete>;

    /// Create a CREATED contract plus one empty field per blueprint field.
    /// `None` if the blueprint does not exist.
    async fn instantiate_contract(&self, blueprint_id: i64, name: &str) -> Result<Option<Contract>>;

    async fn fetch_contract(&self, id: i64) -> Result<Option<Contract>>;

    /// Newest first.
    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>>;

    /// `false` if the contract did not exist.
    async fn delete_contract(&self, id: i64) -> Result<bool>;

    /// Move a contract to `target` if the lifecycle policy allows it.
    async fn write_status(&self, id: i64, target: ContractStatus) -> Result<StatusWrite>;

    /// Assign values to fields of one contract, keyed by field id.
    async fn write_field_values(
        &self,
        id: i64,
        values: &BTreeMap<i64, Option<String>>,
    ) -> Result<FieldWrite>;
}
