//! Request-level failures surfaced to callers.
//!
//! Every variant except `Store` is a 4xx condition: the request is wrong for
//! the current state and retrying it unchanged will fail the same way.

use pact_lifecycle::TransitionError;
use pact_schemas::ContractStatus;

#[derive(Debug)]
pub enum ServiceError {
    /// Unknown blueprint or contract id.
    NotFound { resource: &'static str, id: i64 },
    /// The lifecycle policy has no `current -> attempted` edge.
    InvalidTransition {
        current: ContractStatus,
        attempted: ContractStatus,
    },
    /// Field edit attempted in a non-editable status.
    Immutable { status: ContractStatus },
    /// Missing required key or wrong request shape.
    MalformedRequest(String),
    /// A submitted field id does not belong to the target contract.
    ForeignField { requested: usize, owned: usize },
    /// Value outside its domain (unknown field_type or status, blank name...).
    ValidationError(String),
    /// Blueprint still referenced by contracts.
    BlueprintInUse { blueprint_id: i64, contracts: i64 },
    /// Persistence failure; not a request problem.
    Store(anyhow::Error),
}

impl ServiceError {
    pub fn not_found(resource: &'static str, id: i64) -> Self {
        Self::NotFound { resource, id }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRequest(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// `true` for every variant the caller caused.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { resource, id } => write!(f, "{resource} {id} not found."),
            Self::InvalidTransition { .. } => f.write_str("Invalid lifecycle transition."),
            Self::Immutable { status } => {
                write!(f, "Contract fields are immutable in status '{status}'.")
            }
            Self::MalformedRequest(msg) | Self::ValidationError(msg) => f.write_str(msg),
            Self::ForeignField { .. } => {
                f.write_str("One or more field IDs do not belong to this contract.")
            }
            Self::BlueprintInUse {
                blueprint_id,
                contracts,
            } => write!(
                f,
                "blueprint {blueprint_id} is referenced by {contracts} contract(s) and cannot be deleted."
            ),
            Self::Store(e) => write!(f, "persistence failure: {e:#}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(e: anyhow::Error) -> Self {
        Self::Store(e)
    }
}

impl From<TransitionError> for ServiceError {
    fn from(e: TransitionError) -> Self {
        Self::InvalidTransition {
            current: e.current,
            attempted: e.attempted,
        }
    }
}
