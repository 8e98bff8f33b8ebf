//! Result aggregation: outcome counts, per-test records, the stop flag and the
//! coverage snapshot of one run.
//!
//! [`TestResult`] is the single event source for listeners. Counters and
//! records are updated before listeners are notified, so a listener that
//! queries the result from within a callback would already see the test.

mod outcome;

pub use outcome::{Fault, Outcome, OutcomeKind};

use crate::coverage::CoverageSnapshot;
use crate::listener::{ListenerSet, TestListener};
use crate::node::{SuiteInfo, TestInfo};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome kinds that halt the run as soon as one is recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopPolicy {
    pub error: bool,
    pub failure: bool,
    pub warning: bool,
    pub incomplete: bool,
    pub risky: bool,
    pub skipped: bool,
    /// Shorthand for error, failure, warning and risky.
    pub defect: bool,
}

impl StopPolicy {
    /// Whether an outcome of this kind stops the run.
    pub fn matches(&self, kind: OutcomeKind) -> bool {
        match kind {
            OutcomeKind::Success => false,
            OutcomeKind::Error => self.error || self.defect,
            OutcomeKind::Failure => self.failure || self.defect,
            OutcomeKind::Warning => self.warning || self.defect,
            OutcomeKind::Risky => self.risky || self.defect,
            OutcomeKind::Incomplete => self.incomplete,
            OutcomeKind::Skipped => self.skipped,
        }
    }
}

/// One executed test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecord {
    pub info: TestInfo,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// Aggregated state of a run.
pub struct TestResult {
    records: Vec<TestRecord>,
    counts: [usize; OutcomeKind::ALL.len()],
    stop_policy: StopPolicy,
    stop: bool,
    coverage: Option<CoverageSnapshot>,
    listeners: ListenerSet,
    time: Duration,
}

impl Default for TestResult {
    fn default() -> Self {
        Self::new(StopPolicy::default())
    }
}

impl TestResult {
    pub fn new(stop_policy: StopPolicy) -> Self {
        Self {
            records: Vec::new(),
            counts: [0; OutcomeKind::ALL.len()],
            stop_policy,
            stop: false,
            coverage: None,
            listeners: ListenerSet::new(),
            time: Duration::ZERO,
        }
    }

    /// Register a listener. Notification order is registration order.
    pub fn add_listener(&mut self, listener: Box<dyn TestListener>) {
        self.listeners.add(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Start collecting coverage into an empty snapshot.
    pub fn enable_coverage(&mut self) {
        if self.coverage.is_none() {
            self.coverage = Some(CoverageSnapshot::new());
        }
    }

    pub fn coverage(&self) -> Option<&CoverageSnapshot> {
        self.coverage.as_ref()
    }

    pub fn coverage_mut(&mut self) -> Option<&mut CoverageSnapshot> {
        self.coverage.as_mut()
    }

    pub fn collects_coverage(&self) -> bool {
        self.coverage.is_some()
    }

    pub fn start_suite(&mut self, suite: &SuiteInfo) {
        tracing::debug!(target: "suite_runner::result", suite = %suite.name, tests = suite.test_count, "start suite");
        self.listeners.dispatch("start_suite", |l| l.start_suite(suite));
    }

    pub fn end_suite(&mut self, suite: &SuiteInfo) {
        tracing::debug!(target: "suite_runner::result", suite = %suite.name, "end suite");
        self.listeners.dispatch("end_suite", |l| l.end_suite(suite));
    }

    pub fn start_test(&mut self, test: &TestInfo) {
        self.listeners.dispatch("start_test", |l| l.start_test(test));
    }

    /// Record the outcome of a started test and notify listeners with the
    /// matching `add_*` event (none for success) followed by `end_test`.
    ///
    /// Requests a stop if the stop policy matches the outcome.
    pub fn record_outcome(&mut self, info: &TestInfo, outcome: Outcome, elapsed: Duration) {
        let kind = outcome.kind();
        self.counts[kind as usize] += 1;
        self.time += elapsed;
        tracing::debug!(
            target: "suite_runner::result",
            test = %info.display_name(),
            outcome = %kind,
            elapsed_ms = elapsed.as_millis() as u64,
            "test finished"
        );

        let message = outcome.message().to_string();
        self.records.push(TestRecord {
            info: info.clone(),
            outcome,
            elapsed,
        });

        match kind {
            OutcomeKind::Success => {}
            OutcomeKind::Error => self
                .listeners
                .dispatch("add_error", |l| l.add_error(info, &message, elapsed)),
            OutcomeKind::Failure => self
                .listeners
                .dispatch("add_failure", |l| l.add_failure(info, &message, elapsed)),
            OutcomeKind::Warning => self
                .listeners
                .dispatch("add_warning", |l| l.add_warning(info, &message, elapsed)),
            OutcomeKind::Incomplete => self
                .listeners
                .dispatch("add_incomplete", |l| l.add_incomplete(info, &message, elapsed)),
            OutcomeKind::Risky => self
                .listeners
                .dispatch("add_risky", |l| l.add_risky(info, &message, elapsed)),
            OutcomeKind::Skipped => self
                .listeners
                .dispatch("add_skipped", |l| l.add_skipped(info, &message, elapsed)),
        }
        self.listeners.dispatch("end_test", |l| l.end_test(info, elapsed));

        if self.stop_policy.matches(kind) {
            tracing::info!(target: "suite_runner::result", outcome = %kind, "stop policy matched, stopping run");
            self.stop();
        }
    }

    /// Flush all listeners. Safe to call more than once.
    pub fn flush_listeners(&mut self) {
        self.listeners.flush();
    }

    /// Request that the run stops before the next test.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    pub fn should_stop(&self) -> bool {
        self.stop
    }

    /// Whether the run was cut short by a stop request.
    pub fn stopped_early(&self) -> bool {
        self.stop
    }

    pub fn stop_policy(&self) -> StopPolicy {
        self.stop_policy
    }

    /// Records in the order the tests finished.
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    /// Records with a given outcome kind.
    pub fn records_of(&self, kind: OutcomeKind) -> impl Iterator<Item = &TestRecord> {
        self.records.iter().filter(move |r| r.outcome.kind() == kind)
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.counts[kind as usize]
    }

    pub fn run_count(&self) -> usize {
        self.records.len()
    }

    pub fn success_count(&self) -> usize {
        self.count(OutcomeKind::Success)
    }

    pub fn failure_count(&self) -> usize {
        self.count(OutcomeKind::Failure)
    }

    pub fn error_count(&self) -> usize {
        self.count(OutcomeKind::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(OutcomeKind::Warning)
    }

    pub fn incomplete_count(&self) -> usize {
        self.count(OutcomeKind::Incomplete)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(OutcomeKind::Skipped)
    }

    pub fn risky_count(&self) -> usize {
        self.count(OutcomeKind::Risky)
    }

    /// Sum of elapsed time over all recorded tests.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// No errors and no failures.
    pub fn was_successful(&self) -> bool {
        self.error_count() == 0 && self.failure_count() == 0
    }

    /// No risky tests.
    pub fn all_harmless(&self) -> bool {
        self.risky_count() == 0
    }
}
