//! pact-service
//!
//! Contract service: validates incoming requests, consults the lifecycle
//! policy, and drives a [`pact_db::Store`]. HTTP and CLI front-ends call
//! into [`ContractService`]; nothing here knows about transport.

mod error;
mod service;
mod validate;
mod view;

pub use error::ServiceError;
pub use service::{ContractService, ReplaceMode};
pub use validate::{MAX_LABEL_LEN, MAX_NAME_LEN};
pub use view::ContractView;
