use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::catalog::Exercise;
use crate::grader::{self, ExecutionResult, RunOutcome, RunReport};
use crate::sandbox::CandidateRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Editing,
    Running,
    Graded,
    Errored,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// A run is already in flight; run requests are serialized, never
    /// interleaved.
    #[error("a grading run is already in progress")]
    RunInProgress,

    /// The run was cancelled before completion; no results were applied.
    #[error("the grading run was cancelled")]
    Cancelled,

    #[error("internal grading failure: {0}")]
    Internal(String),
}

struct Inner {
    state: SessionState,
    candidate_source: String,
    results: Vec<ExecutionResult>,
    cancel: Option<CancellationToken>,
    /// Bumped on every cancel/edit/reset so a finished run can tell
    /// whether it is stale before applying its results.
    generation: u64,
}

/// Per-user state for one attempt at one exercise.
///
/// The state machine is `Editing → Running → Graded`; an edit re-enters
/// `Editing` and discards prior results, and an internal fault while
/// running lands in `Errored`. Switching exercises is modeled by
/// dropping the session and constructing a new one.
pub struct GradingSession {
    exercise: Arc<Exercise>,
    runner: Arc<dyn CandidateRunner>,
    inner: Mutex<Inner>,
}

impl GradingSession {
    pub fn new(exercise: Arc<Exercise>, runner: Arc<dyn CandidateRunner>) -> Self {
        let candidate_source = exercise.starter_code.clone();
        Self {
            exercise,
            runner,
            inner: Mutex::new(Inner {
                state: SessionState::Editing,
                candidate_source,
                results: Vec::new(),
                cancel: None,
                generation: 0,
            }),
        }
    }

    pub fn exercise(&self) -> &Arc<Exercise> {
        &self.exercise
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn candidate_source(&self) -> String {
        self.inner.lock().candidate_source.clone()
    }

    /// Results of the last completed run, empty unless `Graded`.
    pub fn results(&self) -> Vec<ExecutionResult> {
        self.inner.lock().results.clone()
    }

    /// Replaces the candidate source, discarding prior results.
    ///
    /// An edit during `Running` cancels the in-flight run first.
    pub fn edit(&self, source: impl Into<String>) {
        let mut inner = self.inner.lock();
        Self::abandon_run(&mut inner);
        inner.candidate_source = source.into();
        inner.results.clear();
        inner.state = SessionState::Editing;
    }

    /// Cancels an in-flight run and returns to `Editing`.
    ///
    /// Late results from the cancelled run are never applied.
    pub fn cancel_run(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Running {
            Self::abandon_run(&mut inner);
            inner.results.clear();
            inner.state = SessionState::Editing;
        }
    }

    /// Restores the starter code and discards all run state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        Self::abandon_run(&mut inner);
        inner.candidate_source = self.exercise.starter_code.clone();
        inner.results.clear();
        inner.state = SessionState::Editing;
    }

    /// Grades `source` against the session's exercise.
    ///
    /// Runs are serialized: a second request while one is `Running` is
    /// rejected. Grading happens on a blocking task; this future resolves
    /// early with [`SessionError::Cancelled`] if the run is cancelled,
    /// and the stale report is discarded when the task finishes.
    pub async fn submit_run(&self, source: impl Into<String>) -> Result<RunReport, SessionError> {
        let source = source.into();
        let (token, generation) = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Running {
                return Err(SessionError::RunInProgress);
            }
            inner.candidate_source = source.clone();
            inner.results.clear();
            inner.generation += 1;
            inner.state = SessionState::Running;
            let token = CancellationToken::new();
            inner.cancel = Some(token.clone());
            (token, inner.generation)
        };

        log::debug!("Session for {}: run {generation} started", self.exercise.id);

        let exercise = Arc::clone(&self.exercise);
        let runner = Arc::clone(&self.runner);
        let grade_token = token.clone();
        let handle = tokio::task::spawn_blocking(move || {
            grader::grade(&exercise, &source, runner.as_ref(), &grade_token)
        });

        let joined = tokio::select! {
            joined = handle => joined,
            _ = token.cancelled() => {
                // cancel_run/edit already moved the session to Editing;
                // the blocking task will notice the token between cases
                // and its partial results are dropped with the handle.
                log::debug!("Session for {}: run {generation} cancelled", self.exercise.id);
                return Err(SessionError::Cancelled);
            }
        };

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.generation == generation {
                    inner.state = SessionState::Errored;
                    inner.cancel = None;
                }
                log::error!("Session for {}: grading task failed: {e}", self.exercise.id);
                return Err(SessionError::Internal(e.to_string()));
            }
        };

        let mut inner = self.inner.lock();
        match outcome {
            RunOutcome::Completed(report) if inner.generation == generation => {
                inner.results = report.results.clone();
                inner.state = SessionState::Graded;
                inner.cancel = None;
                Ok(report)
            }
            // Stale: the session was cancelled, edited or reset while the
            // task was finishing. Its results must not be applied.
            RunOutcome::Completed(_) | RunOutcome::Cancelled => Err(SessionError::Cancelled),
        }
    }

    fn abandon_run(inner: &mut Inner) {
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        inner.generation += 1;
    }
}
