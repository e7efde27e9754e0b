//! Request and response types for the pact-daemon HTTP endpoints that are
//! not already domain types in `pact-schemas` / `pact-service`.

use pact_schemas::ContractStatus;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// SHA-256 of the loaded config; `None` when running on defaults.
    pub config_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Error body (every 4xx/5xx)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    /// Only set for rejected lifecycle transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<ContractStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_status: Option<ContractStatus>,
}

impl ErrorBody {
    pub fn detail(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            current_status: None,
            attempted_status: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/contracts
// ---------------------------------------------------------------------------

/// `?status=APPROVED,SENT`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractListQuery {
    #[serde(default)]
    pub status: Option<String>,
}
