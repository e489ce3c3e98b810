//! Workflow state persisted between invocations.

mod persistence;
mod types;

pub use persistence::SessionStore;
pub use types::{Stage, WorkflowContext};
