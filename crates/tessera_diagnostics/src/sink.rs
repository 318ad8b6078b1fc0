//! Thread-safe problem accumulator shared by capture and serialization.

use crate::problem::Problem;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Receiver of problems and observed inputs.
///
/// Implemented by [`ProblemSink`]; hosts may forward to their own reporting.
pub trait ProblemReporter: Send + Sync {
    /// Reports a problem with the cache entry being written or read.
    fn report_problem(&self, problem: Problem);

    /// Reports a build input observed while configuring.
    fn report_input(&self, input: Problem);
}

/// A thread-safe accumulator for problems and inputs.
///
/// Multiple threads can report concurrently. The error count is tracked
/// atomically for fast `has_errors` checks without locking. At most
/// `max_problems` problems are retained; later ones are counted only.
pub struct ProblemSink {
    problems: Mutex<Vec<Problem>>,
    inputs: Mutex<Vec<Problem>>,
    error_count: AtomicUsize,
    problem_count: AtomicUsize,
    max_problems: usize,
}

impl ProblemSink {
    /// Creates a new empty sink with no retention limit.
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Creates a new empty sink retaining at most `max_problems` problems.
    pub fn with_limit(max_problems: usize) -> Self {
        Self {
            problems: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
            problem_count: AtomicUsize::new(0),
            max_problems,
        }
    }

    /// Returns `true` if any error-severity problems have been reported.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Returns the number of error-severity problems reported so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Returns the number of problems reported, including discarded ones.
    pub fn problem_count(&self) -> usize {
        self.problem_count.load(Ordering::Relaxed)
    }

    /// Returns `true` if problems were discarded because of the limit.
    pub fn overflowed(&self) -> bool {
        self.problem_count() > self.max_problems
    }

    /// Takes all retained problems, leaving the sink empty.
    pub fn take_problems(&self) -> Vec<Problem> {
        std::mem::take(&mut *self.problems.lock())
    }

    /// Returns a snapshot of all retained problems without draining.
    pub fn problems(&self) -> Vec<Problem> {
        self.problems.lock().clone()
    }

    /// Returns a snapshot of all reported inputs.
    pub fn inputs(&self) -> Vec<Problem> {
        self.inputs.lock().clone()
    }
}

impl ProblemReporter for ProblemSink {
    fn report_problem(&self, problem: Problem) {
        if problem.severity.is_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        let reported = self.problem_count.fetch_add(1, Ordering::Relaxed);
        if reported < self.max_problems {
            self.problems.lock().push(problem);
        }
    }

    fn report_input(&self, input: Problem) {
        self.inputs.lock().push(input);
    }
}

impl Default for ProblemSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::DiagnosticCode;
    use crate::message::StructuredMessage;
    use crate::trace::PropertyTrace;

    fn make_error() -> Problem {
        Problem::error(
            DiagnosticCode::UNSUPPORTED_TYPE,
            PropertyTrace::Unknown,
            StructuredMessage::new().text("test error"),
        )
    }

    fn make_warning() -> Problem {
        Problem::warning(
            DiagnosticCode::UNSUPPORTED_TYPE,
            PropertyTrace::Unknown,
            StructuredMessage::new().text("test warning"),
        )
    }

    fn make_input() -> Problem {
        Problem::input(
            DiagnosticCode::INPUT_FILE,
            PropertyTrace::Unknown,
            StructuredMessage::new().text("file ").reference("a.txt"),
        )
    }

    #[test]
    fn empty_sink() {
        let sink = ProblemSink::new();
        assert!(!sink.has_errors());
        assert_eq!(sink.error_count(), 0);
        assert!(sink.take_problems().is_empty());
        assert!(sink.inputs().is_empty());
    }

    #[test]
    fn report_error() {
        let sink = ProblemSink::new();
        sink.report_problem(make_error());
        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn warning_is_not_error() {
        let sink = ProblemSink::new();
        sink.report_problem(make_warning());
        assert!(!sink.has_errors());
        assert_eq!(sink.problems().len(), 1);
    }

    #[test]
    fn inputs_are_kept_apart() {
        let sink = ProblemSink::new();
        sink.report_input(make_input());
        assert!(sink.problems().is_empty());
        assert_eq!(sink.inputs().len(), 1);
        assert_eq!(sink.problem_count(), 0);
    }

    #[test]
    fn limit_discards_but_counts() {
        let sink = ProblemSink::with_limit(2);
        for _ in 0..5 {
            sink.report_problem(make_error());
        }
        assert_eq!(sink.problems().len(), 2);
        assert_eq!(sink.problem_count(), 5);
        assert_eq!(sink.error_count(), 5);
        assert!(sink.overflowed());
    }

    #[test]
    fn take_problems_drains() {
        let sink = ProblemSink::new();
        sink.report_problem(make_error());
        sink.report_problem(make_warning());
        assert_eq!(sink.take_problems().len(), 2);
        assert!(sink.take_problems().is_empty());
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn thread_safety() {
        use rayon::prelude::*;

        let sink = ProblemSink::new();
        (0..1000).into_par_iter().for_each(|_| sink.report_problem(make_error()));
        assert_eq!(sink.error_count(), 1000);
        assert_eq!(sink.problems().len(), 1000);
    }
}
