use std::sync::Arc;

use pact_db::{BlueprintDelete, ContractFilter, FieldWrite, StatusWrite, Store};
use pact_lifecycle::can_edit_fields;
use pact_schemas::{
    Blueprint, BlueprintRequest, ContractCreateRequest, ContractStatus, FieldValuesRequest,
    TransitionRequest,
};

use crate::error::ServiceError;
use crate::validate;
use crate::view::ContractView;

/// Full replace (`PUT`: name and fields required) or partial (`PATCH`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    Full,
    Partial,
}

/// Orchestrates blueprint management and the contract lifecycle over a
/// [`Store`]. Cheap to clone.
#[derive(Clone)]
pub struct ContractService {
    store: Arc<dyn Store>,
}

impl ContractService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // -----------------------------------------------------------------------
    // Blueprints
    // -----------------------------------------------------------------------

    pub async fn create_blueprint(&self, req: BlueprintRequest) -> Result<Blueprint, ServiceError> {
        let bp = validate::new_blueprint(req)?;
        Ok(self.store.insert_blueprint(&bp).await?)
    }

    /// Rename and/or replace every field of a blueprint. Supplied fields are
    /// recreated from scratch; existing field ids are not preserved.
    pub async fn replace_blueprint(
        &self,
        id: i64,
        req: BlueprintRequest,
        mode: ReplaceMode,
    ) -> Result<Blueprint, ServiceError> {
        let patch = validate::blueprint_patch(req, mode == ReplaceMode::Full)?;
        self.store
            .replace_blueprint(id, &patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("blueprint", id))
    }

    pub async fn get_blueprint(&self, id: i64) -> Result<Blueprint, ServiceError> {
        self.store
            .fetch_blueprint(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("blueprint", id))
    }

    pub async fn list_blueprints(&self) -> Result<Vec<Blueprint>, ServiceError> {
        Ok(self.store.list_blueprints().await?)
    }

    pub async fn delete_blueprint(&self, id: i64) -> Result<(), ServiceError> {
        match self.store.delete_blueprint(id).await? {
            BlueprintDelete::Deleted => Ok(()),
            BlueprintDelete::Missing => Err(ServiceError::not_found("blueprint", id)),
            BlueprintDelete::InUse { contracts } => Err(ServiceError::BlueprintInUse {
                blueprint_id: id,
                contracts,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Contracts
    // -----------------------------------------------------------------------

    /// Create a CREATED contract holding an empty snapshot of every field of
    /// the blueprint.
    pub async fn instantiate(&self, req: ContractCreateRequest) -> Result<ContractView, ServiceError> {
        let name = validate::contract_name(req.name)?;
        let blueprint_id = req
            .blueprint_id
            .ok_or_else(|| ServiceError::malformed("'blueprint_id' is required."))?;

        self.store
            .instantiate_contract(blueprint_id, &name)
            .await?
            .map(ContractView::from)
            .ok_or_else(|| ServiceError::not_found("blueprint", blueprint_id))
    }

    pub async fn get_contract(&self, id: i64) -> Result<ContractView, ServiceError> {
        self.store
            .fetch_contract(id)
            .await?
            .map(ContractView::from)
            .ok_or_else(|| ServiceError::not_found("contract", id))
    }

    pub async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<ContractView>, ServiceError> {
        let contracts = self.store.list_contracts(filter).await?;
        Ok(contracts.into_iter().map(ContractView::from).collect())
    }

    pub async fn delete_contract(&self, id: i64) -> Result<(), ServiceError> {
        if self.store.delete_contract(id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("contract", id))
        }
    }

    /// Decode a `{new_status}` body and apply it; see [`Self::transition`].
    pub async fn request_transition(
        &self,
        id: i64,
        req: TransitionRequest,
    ) -> Result<ContractView, ServiceError> {
        // Unknown contract wins over a bad body.
        self.get_contract(id).await?;
        let target = validate::status(req.new_status)?;
        self.transition(id, target).await
    }

    /// Move a contract to `target`. Only `status` is written.
    pub async fn transition(&self, id: i64, target: ContractStatus) -> Result<ContractView, ServiceError> {
        match self.store.write_status(id, target).await? {
            StatusWrite::Applied(c) => Ok(c.into()),
            StatusWrite::Missing => Err(ServiceError::not_found("contract", id)),
            StatusWrite::Rejected(e) => Err(e.into()),
        }
    }

    /// Load a contract and refuse with `Immutable` unless its fields can
    /// still be edited. Runs before the update body is looked at.
    pub async fn editable_contract(&self, id: i64) -> Result<ContractView, ServiceError> {
        let current = self.get_contract(id).await?;
        if !can_edit_fields(current.status) {
            return Err(ServiceError::Immutable {
                status: current.status,
            });
        }
        Ok(current)
    }

    /// Assign values to fields of one contract. All or nothing: a single
    /// missing or foreign id, or a non-editable status, changes nothing.
    pub async fn update_field_values(
        &self,
        id: i64,
        req: FieldValuesRequest,
    ) -> Result<ContractView, ServiceError> {
        self.editable_contract(id).await?;
        let values = validate::field_values(req.fields)?;

        match self.store.write_field_values(id, &values).await? {
            FieldWrite::Applied(c) => Ok(c.into()),
            FieldWrite::Missing => Err(ServiceError::not_found("contract", id)),
            FieldWrite::Immutable(status) => Err(ServiceError::Immutable { status }),
            FieldWrite::ForeignIds { requested, owned } => {
                Err(ServiceError::ForeignField { requested, owned })
            }
        }
    }
}
