mod js_runner;
mod runner;

// Re-export the trait and common types
pub use js_runner::JsRunner;
pub use runner::{CandidateRunner, CaseInvoker};

use std::sync::Arc;

use thiserror::Error;

use crate::config::LimitsConfig;

/// A failure produced while loading or invoking candidate code.
///
/// Every variant is data, not a crossing exception: the executor catches
/// everything the candidate does at this boundary and the grader records
/// it as a failing test-case result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecFailure {
    /// The candidate source failed to load in isolation.
    #[error("candidate source failed to load: {0}")]
    Syntax(String),

    /// The candidate code threw during execution.
    #[error("candidate code threw: {0}")]
    Runtime(String),

    /// The invocation exceeded its wall-clock/iteration budget.
    #[error("execution exceeded the time budget")]
    Timeout,

    /// The invocation exceeded a memory/recursion/stack ceiling.
    #[error("execution exceeded resource limits: {0}")]
    ResourceExceeded(String),
}

/// Creates the default candidate runner for the configured limits.
pub fn create_runner(limits: LimitsConfig) -> Arc<dyn CandidateRunner> {
    log::info!(
        "Creating JsRunner (time budget {} ms, loop ceiling {})",
        limits.time_limit.0,
        limits.loop_iteration_limit
    );
    Arc::new(JsRunner::new(limits))
}
