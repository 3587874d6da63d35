use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::catalog::Exercise;
use crate::codec;
use crate::sandbox::{CandidateRunner, ExecFailure};

/// Per-case classification, so callers can tell a wrong answer from a
/// crash from a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    WrongAnswer,
    SyntaxError,
    RuntimeError,
    Timeout,
    ResourceExceeded,
    /// The test-case input literal failed to parse: a catalog authoring
    /// defect, not a candidate failure.
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Passed => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::SyntaxError => "Syntax Error",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::Timeout => "Time Limit Exceeded",
            Verdict::ResourceExceeded => "Resource Limit Exceeded",
            Verdict::Inconclusive => "Inconclusive",
        };
        write!(f, "{label}")
    }
}

/// Result of a single test case, rebuilt from scratch on every run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub description: String,
    pub passed: bool,
    pub verdict: Verdict,
    pub actual_literal: String,
    pub expected_literal: String,
    pub message: String,
}

/// The complete, ordered outcome of one grading run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub exercise_id: String,
    pub results: Vec<ExecutionResult>,
    pub finished_at: String,
}

impl RunReport {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            let mark = if result.passed { '✓' } else { '✗' };
            writeln!(f, "{mark} {}", result.message)?;
        }
        write!(
            f,
            "{}/{} test cases passed",
            self.passed_count(),
            self.results.len()
        )
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunReport),
    /// The run was cancelled between test cases; partial results are
    /// discarded, never surfaced.
    Cancelled,
}

/// Grades one candidate source against every test case of an exercise.
///
/// The source is loaded once; a load failure short-circuits into a
/// single syntax-error result. Otherwise every test case is evaluated in
/// declared order, and a failing case never aborts the batch: the caller
/// always sees the full diagnostic picture.
pub fn grade(
    exercise: &Exercise,
    source: &str,
    runner: &dyn CandidateRunner,
    cancel: &CancellationToken,
) -> RunOutcome {
    if cancel.is_cancelled() {
        return RunOutcome::Cancelled;
    }

    if let Err(failure) = runner.check_source(source) {
        log::info!("Exercise {}: candidate source failed to load", exercise.id);
        return RunOutcome::Completed(RunReport {
            exercise_id: exercise.id.clone(),
            results: vec![ExecutionResult {
                description: exercise.title.clone(),
                passed: false,
                verdict: Verdict::SyntaxError,
                actual_literal: "<load error>".to_string(),
                expected_literal: String::new(),
                message: failure.to_string(),
            }],
            finished_at: crate::create_timestamp(),
        });
    }

    let mut invoker = runner.start_run(source, &exercise.entry);
    let mut results = Vec::with_capacity(exercise.test_cases.len());

    for case in &exercise.test_cases {
        if cancel.is_cancelled() {
            log::info!("Exercise {}: run cancelled mid-batch", exercise.id);
            return RunOutcome::Cancelled;
        }

        let args = match codec::parse_arguments(&case.input_literal) {
            Ok(args) => args,
            Err(e) => {
                // Catalog defect, not a candidate failure
                log::error!(
                    "Exercise {}: malformed input literal `{}`: {e}",
                    exercise.id,
                    case.input_literal
                );
                results.push(ExecutionResult {
                    description: case.description.clone(),
                    passed: false,
                    verdict: Verdict::Inconclusive,
                    actual_literal: "<inconclusive>".to_string(),
                    expected_literal: case.expected_literal.clone(),
                    message: format!(
                        "{}: test case input could not be parsed: {e}",
                        case.description
                    ),
                });
                continue;
            }
        };

        let result = match invoker.invoke(&args) {
            Ok(value) => {
                let actual = codec::serialize_value(&value);
                if actual == case.expected_literal {
                    ExecutionResult {
                        description: case.description.clone(),
                        passed: true,
                        verdict: Verdict::Passed,
                        actual_literal: actual,
                        expected_literal: case.expected_literal.clone(),
                        message: format!("{}: ok", case.description),
                    }
                } else {
                    ExecutionResult {
                        description: case.description.clone(),
                        passed: false,
                        verdict: Verdict::WrongAnswer,
                        message: format!(
                            "{}: expected `{}`, got `{}`",
                            case.description, case.expected_literal, actual
                        ),
                        actual_literal: actual,
                        expected_literal: case.expected_literal.clone(),
                    }
                }
            }
            Err(failure) => ExecutionResult {
                description: case.description.clone(),
                passed: false,
                verdict: verdict_for(&failure),
                actual_literal: failure_marker(&failure).to_string(),
                expected_literal: case.expected_literal.clone(),
                message: format!("{}: {failure}", case.description),
            },
        };
        results.push(result);
    }

    let report = RunReport {
        exercise_id: exercise.id.clone(),
        results,
        finished_at: crate::create_timestamp(),
    };
    log::info!(
        "Exercise {}: {}/{} test cases passed",
        exercise.id,
        report.passed_count(),
        report.results.len()
    );
    RunOutcome::Completed(report)
}

fn verdict_for(failure: &ExecFailure) -> Verdict {
    match failure {
        ExecFailure::Syntax(_) => Verdict::SyntaxError,
        ExecFailure::Runtime(_) => Verdict::RuntimeError,
        ExecFailure::Timeout => Verdict::Timeout,
        ExecFailure::ResourceExceeded(_) => Verdict::ResourceExceeded,
    }
}

fn failure_marker(failure: &ExecFailure) -> &'static str {
    match failure {
        ExecFailure::Syntax(_) => "<load error>",
        ExecFailure::Runtime(_) => "<runtime error>",
        ExecFailure::Timeout => "<timeout>",
        ExecFailure::ResourceExceeded(_) => "<resource limit>",
    }
}
