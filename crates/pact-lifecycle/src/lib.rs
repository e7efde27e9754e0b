//! pact-lifecycle
//!
//! The contract lifecycle policy: which status may follow which, and in
//! which statuses field values may still be edited.
//!
//! Pure, deterministic, no I/O. Every transition request in the service and
//! the store consults this crate; nothing else encodes the edge table.

pub mod policy;

pub use policy::{
    allowed_transitions, allowed_transitions_for, can_edit_fields, can_transition,
    check_transition, is_terminal, TransitionError, EDITABLE_STATUSES,
};
