//! pact-testkit
//!
//! Test-only building blocks: an in-memory [`pact_db::Store`] and request
//! fixtures. MUST NOT appear in production [dependencies].

mod fixtures;
mod mem_store;

pub use fixtures::{
    field_request, load_blueprint_request_json, nda_request, transition_request, values_request,
};
pub use mem_store::MemStore;
