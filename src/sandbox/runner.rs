use crate::catalog::EntryPoint;
use crate::codec::Value;

use super::ExecFailure;

/// Trait for sandboxed candidate-code executors.
///
/// Implementations must run candidate source in an isolated scope with
/// no ambient access to the catalog, the session, the filesystem, the
/// network, or timers, and must convert every candidate-induced failure
/// into an [`ExecFailure`] instead of letting it escape.
pub trait CandidateRunner: Send + Sync {
    /// Loads the candidate source once in isolation.
    ///
    /// A failure here is a whole-run failure: the grader short-circuits
    /// without evaluating individual test cases.
    fn check_source(&self, source: &str) -> Result<(), ExecFailure>;

    /// Starts one grading run and returns the per-case invoker.
    ///
    /// The invoker is not required to be `Send`; it is created, used and
    /// dropped inside a single blocking task.
    fn start_run(&self, source: &str, entry: &EntryPoint) -> Box<dyn CaseInvoker>;
}

/// Invokes the candidate's entry point once per test case.
///
/// Successive invocations share no mutable state unless the exercise
/// declared a single long-lived instance, in which case the instance
/// built for the first case is reused for the whole run.
pub trait CaseInvoker {
    fn invoke(&mut self, args: &[Value]) -> Result<Value, ExecFailure>;
}
