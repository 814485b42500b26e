//! Console for regenerating generated images through the content engine backend.
//!
//! The core is [`workflow::RegenerationWorkflow`]; [`routes`] binds it to HTTP so any
//! view layer can drive it.

pub mod backend;
pub mod config;
pub mod export;
pub mod listing;
pub mod models;
pub mod routes;
pub mod templates;
pub mod workflow;

pub use backend::{BackendError, GenerationService, HttpBackend};
pub use config::{ConsoleConfig, Reconciliation};
pub use listing::{ListingCache, ListingRefresher};
pub use workflow::{RegenerationOutcome, RegenerationWorkflow, WorkflowError};
