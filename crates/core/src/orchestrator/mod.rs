//! Version orchestration.
//!
//! The orchestrator drives each version of a file through its stage pipeline:
//! - **Concurrent** (default): one spawned unit per version, bounded by a
//!   shared deadline; late units are cancelled and recorded as
//!   `processing: timeout` without affecting the others
//! - **Sequential**: all versions advance stage by stage inside one unit;
//!   a timeout fails the whole operation

mod execution;
mod pipeline;
mod runner;
mod types;

pub use runner::Orchestrator;
pub use types::OperationError;
