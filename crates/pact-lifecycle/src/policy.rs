//! Contract lifecycle policy.
//!
//! # State diagram
//!
//! ```text
//!   CREATED ──► APPROVED ──► SENT ──► SIGNED ──► LOCKED (term.)
//!      │                      │
//!      └──────► REVOKED ◄─────┘
//!               (term.)
//! ```
//!
//! No self-transitions and no skipping: `CREATED -> SENT` is illegal even
//! though SENT is reachable through APPROVED.
//!
//! Field values are editable only before signature and outside the terminal
//! states: CREATED, APPROVED, SENT.

use pact_schemas::ContractStatus;

use ContractStatus::*;

// ---------------------------------------------------------------------------
// Edge table
// ---------------------------------------------------------------------------

const FROM_CREATED: &[ContractStatus] = &[Approved, Revoked];
const FROM_APPROVED: &[ContractStatus] = &[Sent];
const FROM_SENT: &[ContractStatus] = &[Signed, Revoked];
const FROM_SIGNED: &[ContractStatus] = &[Locked];
const TERMINAL: &[ContractStatus] = &[];

/// Statuses in which contract field values may be edited.
pub const EDITABLE_STATUSES: &[ContractStatus] = &[Created, Approved, Sent];

/// Statuses directly reachable from `current`. Empty for terminal states.
pub fn allowed_transitions(current: ContractStatus) -> &'static [ContractStatus] {
    match current {
        Created => FROM_CREATED,
        Approved => FROM_APPROVED,
        Sent => FROM_SENT,
        Signed => FROM_SIGNED,
        Locked | Revoked => TERMINAL,
    }
}

/// Same as [`allowed_transitions`] but keyed by the wire name. An unknown
/// status has no outgoing edges.
pub fn allowed_transitions_for(raw: &str) -> &'static [ContractStatus] {
    match ContractStatus::parse(raw) {
        Some(s) => allowed_transitions(s),
        None => TERMINAL,
    }
}

pub fn can_transition(current: ContractStatus, target: ContractStatus) -> bool {
    allowed_transitions(current).contains(&target)
}

/// Returns `true` if no further transitions are possible.
pub fn is_terminal(status: ContractStatus) -> bool {
    allowed_transitions(status).is_empty()
}

pub fn can_edit_fields(status: ContractStatus) -> bool {
    EDITABLE_STATUSES.contains(&status)
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// Returned when `attempted` is not an edge out of `current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub current: ContractStatus,
    pub attempted: ContractStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid lifecycle transition: {} -> {}",
            self.current, self.attempted
        )
    }
}

impl std::error::Error for TransitionError {}

/// `Ok(())` iff `current -> target` is an edge of the lifecycle graph.
pub fn check_transition(
    current: ContractStatus,
    target: ContractStatus,
) -> Result<(), TransitionError> {
    if can_transition(current, target) {
        Ok(())
    } else {
        Err(TransitionError {
            current,
            attempted: target,
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
