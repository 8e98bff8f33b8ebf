//! Execution driver: walks the test tree, runs every admitted case through
//! set up, run and tear down, classifies the outcome and feeds it to the
//! [`TestResult`].

pub mod process;

pub use process::ProcessTest;

use crate::config::RunOptions;
use crate::core::context::TestContext;
use crate::coverage::CoverageSession;
use crate::filter::FilterChain;
use crate::listener::panic_message;
use crate::node::{SuiteInfo, TestBody, TestCase, TestInfo, TestNode, TestSuite};
use crate::result::{Fault, Outcome, TestResult};
use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Outcome of a step that may have returned a fault or panicked.
type StepResult = std::thread::Result<Result<(), Fault>>;

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    /// Failures, or a tripped fail-on check.
    Failure = 1,
    /// At least one test errored.
    Exception = 2,
}

impl ExitStatus {
    /// Exit status for a finished run.
    pub fn from_result(result: &TestResult, options: &RunOptions) -> Self {
        if result.was_successful() {
            if options.fail_on_risky && !result.all_harmless() {
                ExitStatus::Failure
            } else if options.fail_on_warning && result.warning_count() > 0 {
                ExitStatus::Failure
            } else {
                ExitStatus::Success
            }
        } else if result.error_count() > 0 {
            ExitStatus::Exception
        } else {
            ExitStatus::Failure
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Drives the execution of a test tree.
pub struct TestRunner {
    options: RunOptions,
    filter: FilterChain,
    coverage: Option<CoverageSession>,
}

impl TestRunner {
    pub fn new(options: RunOptions, filter: FilterChain) -> Self {
        Self {
            options,
            filter,
            coverage: None,
        }
    }

    /// Collect coverage around every test through this session.
    pub fn with_coverage(mut self, session: CoverageSession) -> Self {
        self.coverage = Some(session);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Execute the tree `options.repeat` times. A stop cancels the remaining
    /// repetitions.
    pub fn run(&mut self, root: &TestNode, result: &mut TestResult) -> ControlFlow<()> {
        for iteration in 1..=self.options.repeat {
            if self.options.repeat > 1 {
                tracing::debug!(target: "suite_runner::runner", iteration, total = self.options.repeat, "repeating run");
            }
            self.execute(root, result)?;
            if result.should_stop() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Execute one node. Returns `Break` when the run must stop.
    pub fn execute(&mut self, node: &TestNode, result: &mut TestResult) -> ControlFlow<()> {
        match node {
            TestNode::Case(case) => {
                if !self.filter.admits(case.info()) {
                    return ControlFlow::Continue(());
                }
                if result.should_stop() {
                    return ControlFlow::Break(());
                }
                self.run_case(case, result);
                if result.should_stop() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
            TestNode::Suite(suite) => self.run_suite(suite, result),
        }
    }

    /// Number of cases below `node` the filter admits.
    pub fn admitted_count(&self, node: &TestNode) -> usize {
        let mut count = 0;
        node.for_each_case(&mut |case| {
            if self.filter.admits(case.info()) {
                count += 1;
            }
        });
        count
    }

    fn admitted_cases<'a>(&self, suite: &'a TestSuite) -> Vec<&'a TestCase> {
        let mut cases = Vec::new();
        for child in suite.tests() {
            child.for_each_case(&mut |case| {
                if self.filter.admits(case.info()) {
                    cases.push(case);
                }
            });
        }
        cases
    }

    fn run_suite(&mut self, suite: &TestSuite, result: &mut TestResult) -> ControlFlow<()> {
        let cases = self.admitted_cases(suite);
        let info = SuiteInfo {
            name: suite.name().to_string(),
            test_count: cases.len(),
        };
        result.start_suite(&info);

        let flow = if cases.is_empty() {
            ControlFlow::Continue(())
        } else {
            match catch(|| suite.set_up()) {
                Ok(Ok(())) => {
                    let flow = self.run_children(suite, result);
                    self.tear_down_suite(suite);
                    flow
                }
                Ok(Err(fault)) => report_unrun(&cases, Outcome::from(fault), result),
                Err(payload) => report_unrun(
                    &cases,
                    Outcome::Error(panic_message(payload.as_ref())),
                    result,
                ),
            }
        };

        result.end_suite(&info);
        flow
    }

    fn run_children(&mut self, suite: &TestSuite, result: &mut TestResult) -> ControlFlow<()> {
        for child in suite.tests() {
            if result.should_stop() {
                return ControlFlow::Break(());
            }
            self.execute(child, result)?;
        }
        ControlFlow::Continue(())
    }

    fn tear_down_suite(&self, suite: &TestSuite) {
        match catch(|| suite.tear_down()) {
            Ok(Ok(())) => {}
            Ok(Err(fault)) => {
                tracing::warn!(target: "suite_runner::runner", suite = suite.name(), "suite tear down failed: {fault}");
            }
            Err(payload) => {
                tracing::warn!(
                    target: "suite_runner::runner",
                    suite = suite.name(),
                    "suite tear down panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    fn run_case(&mut self, case: &TestCase, result: &mut TestResult) {
        let info = case.info();
        result.start_test(info);
        tracing::debug!(target: "suite_runner::runner", test = %info.display_name(), "running test");

        let mut body = match panic::catch_unwind(AssertUnwindSafe(|| case.instantiate())) {
            Ok(Ok(body)) => body,
            Ok(Err(fault)) => {
                let message = Outcome::from(fault).message().to_string();
                result.record_outcome(info, Outcome::Error(message), Duration::ZERO);
                return;
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                result.record_outcome(info, Outcome::Error(message), Duration::ZERO);
                return;
            }
        };

        let collecting = result.collects_coverage() && self.coverage.is_some();
        if collecting {
            if let Some(session) = self.coverage.as_mut() {
                session.start(&info.display_name());
            }
        }

        let started = Instant::now();
        let mut ctx = TestContext::new();
        let (run, teardown) = drive(body.as_mut(), &mut ctx);
        let elapsed = started.elapsed();

        if collecting {
            let delta = self.coverage.as_mut().and_then(CoverageSession::stop);
            if let (Some(delta), Some(snapshot)) = (delta, result.coverage_mut()) {
                snapshot.merge(&delta);
            }
        }

        let outcome = classify(&ctx, run, teardown, info, &self.options, collecting);
        let outcome = self.apply_time_limit(info, outcome, elapsed);
        result.record_outcome(info, outcome, elapsed);
    }

    /// A sized test that ran past its limit is risky regardless of how it
    /// otherwise ended.
    fn apply_time_limit(&self, info: &TestInfo, outcome: Outcome, elapsed: Duration) -> Outcome {
        if !self.options.enforce_time_limit {
            return outcome;
        }
        match (info.size, self.options.time_limit(info.size)) {
            (Some(size), Some(limit)) if elapsed > limit => Outcome::Risky(format!(
                "Execution of this {size} test took {:.3}s and exceeded the limit of {:.3}s",
                elapsed.as_secs_f64(),
                limit.as_secs_f64()
            )),
            _ => outcome,
        }
    }
}

fn catch<F>(f: F) -> StepResult
where
    F: FnOnce() -> Result<(), Fault>,
{
    panic::catch_unwind(AssertUnwindSafe(f))
}

/// Run set up and the test, then tear down whenever set up was attempted.
fn drive(body: &mut dyn TestBody, ctx: &mut TestContext) -> (StepResult, StepResult) {
    let run = catch(|| {
        body.set_up(ctx)?;
        body.run(ctx)
    });
    let teardown = catch(|| body.tear_down(ctx));
    (run, teardown)
}

/// Report every case as started and ended with the given outcome without
/// running it.
fn report_unrun(cases: &[&TestCase], outcome: Outcome, result: &mut TestResult) -> ControlFlow<()> {
    // A suite that failed to set up reports its tests as errors, whatever
    // kind of fault it raised, unless it asked for them to be skipped.
    let outcome = match outcome {
        Outcome::Skipped(_) | Outcome::Error(_) => outcome,
        other => Outcome::Error(other.message().to_string()),
    };
    for case in cases {
        if result.should_stop() {
            return ControlFlow::Break(());
        }
        result.start_test(case.info());
        result.record_outcome(case.info(), outcome.clone(), Duration::ZERO);
    }
    if result.should_stop() {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

fn panic_outcome(payload: &(dyn Any + Send)) -> Outcome {
    let message = panic_message(payload);
    if message.starts_with("assertion") {
        Outcome::Failure(message)
    } else {
        Outcome::Error(message)
    }
}

fn step_outcome(step: StepResult) -> Option<Outcome> {
    match step {
        Ok(Ok(())) => None,
        Ok(Err(fault)) => Some(Outcome::from(fault)),
        Err(payload) => Some(panic_outcome(payload.as_ref())),
    }
}

/// Classify a finished test.
///
/// An explicit marker on the context wins, then the fault or panic of the
/// test itself, then a tear down fault, then the strict checks in order:
/// no assertions, output, todo, missing covers.
pub(crate) fn classify(
    ctx: &TestContext,
    run: StepResult,
    teardown: StepResult,
    info: &TestInfo,
    options: &RunOptions,
    coverage_active: bool,
) -> Outcome {
    if let Some(marker) = ctx.marker() {
        return Outcome::from(marker.clone());
    }
    if let Some(outcome) = step_outcome(run) {
        return outcome;
    }
    if let Some(outcome) = step_outcome(teardown) {
        return outcome;
    }

    if options.report_useless_tests && ctx.assertion_count() == 0 {
        return Outcome::Risky("This test did not perform any assertions".to_string());
    }
    if options.strict_output && !ctx.output().is_empty() {
        return Outcome::Risky(format!("This test printed output: {}", ctx.output()));
    }
    if options.strict_todo && info.todo {
        return Outcome::Risky("This test is marked as todo".to_string());
    }
    if options.strict_coverage && coverage_active && info.covers.is_empty() {
        return Outcome::Risky("This test does not declare the code it covers".to_string());
    }
    Outcome::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::tests::FixedDriver;
    use crate::coverage::{CoverageSnapshot, LineStatus};
    use crate::listener::tests::Recorder;
    use crate::node::Size;
    use crate::result::{OutcomeKind, StopPolicy};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn runner(options: RunOptions) -> TestRunner {
        TestRunner::new(options, FilterChain::new())
    }

    fn execute(root: TestSuite, options: RunOptions) -> TestResult {
        let mut result = TestResult::new(options.stop_on);
        let mut runner = runner(options);
        let _ = runner.run(&TestNode::from(root), &mut result);
        result
    }

    fn kinds(result: &TestResult) -> Vec<OutcomeKind> {
        result.records().iter().map(|r| r.outcome.kind()).collect()
    }

    #[test]
    fn test_classification_of_faults_and_panics() {
        let mut suite = TestSuite::new("S");
        suite.add_test(TestCase::new("ok", |ctx| ctx.assert(true, "t")));
        suite.add_test(TestCase::new("fail", |ctx| ctx.assert_eq(1, 2)));
        suite.add_test(TestCase::new("err", |_| Err(Fault::error("boom"))));
        suite.add_test(TestCase::new("warn", |_| Err(Fault::warning("deprecated"))));
        suite.add_test(TestCase::new("assert_panic", |_| {
            assert_eq!(1, 2);
            Ok(())
        }));
        suite.add_test(TestCase::new("panic", |_| panic!("index out of bounds")));

        let result = execute(suite, RunOptions::default());
        assert_eq!(
            kinds(&result),
            vec![
                OutcomeKind::Success,
                OutcomeKind::Failure,
                OutcomeKind::Error,
                OutcomeKind::Warning,
                OutcomeKind::Failure,
                OutcomeKind::Error,
            ]
        );
        assert_eq!(result.records()[5].outcome.message(), "index out of bounds");
    }

    #[test]
    fn test_marker_beats_returned_fault() {
        let mut suite = TestSuite::new("S");
        suite.add_test(TestCase::new("t", |ctx| {
            let _ = ctx.mark_incomplete("not finished");
            Err(Fault::error("also broken"))
        }));
        let result = execute(suite, RunOptions::default());
        assert_eq!(result.records()[0].outcome, Outcome::Incomplete("not finished".into()));
    }

    struct Fixture {
        log: Rc<RefCell<Vec<&'static str>>>,
        fail_set_up: bool,
        fail_tear_down: bool,
    }

    impl TestBody for Fixture {
        fn set_up(&mut self, _ctx: &mut TestContext) -> Result<(), Fault> {
            self.log.borrow_mut().push("set_up");
            if self.fail_set_up {
                return Err(Fault::error("set up failed"));
            }
            Ok(())
        }

        fn run(&mut self, ctx: &mut TestContext) -> Result<(), Fault> {
            self.log.borrow_mut().push("run");
            ctx.assert(true, "ok")
        }

        fn tear_down(&mut self, _ctx: &mut TestContext) -> Result<(), Fault> {
            self.log.borrow_mut().push("tear_down");
            if self.fail_tear_down {
                return Err(Fault::error("tear down failed"));
            }
            Ok(())
        }
    }

    fn fixture_case(name: &str, log: &Rc<RefCell<Vec<&'static str>>>, fail_set_up: bool, fail_tear_down: bool) -> TestCase {
        let log = Rc::clone(log);
        TestCase::with_factory(name, move || {
            Ok(Box::new(Fixture {
                log: Rc::clone(&log),
                fail_set_up,
                fail_tear_down,
            }) as Box<dyn TestBody>)
        })
    }

    #[test]
    fn test_tear_down_runs_after_failed_set_up() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut suite = TestSuite::new("S");
        suite.add_test(fixture_case("t", &log, true, false));
        let result = execute(suite, RunOptions::default());

        assert_eq!(*log.borrow(), vec!["set_up", "tear_down"]);
        assert_eq!(result.records()[0].outcome, Outcome::Error("set up failed".into()));
    }

    #[test]
    fn test_tear_down_fault_on_passing_test() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut suite = TestSuite::new("S");
        suite.add_test(fixture_case("t", &log, false, true));
        let result = execute(suite, RunOptions::default());

        assert_eq!(*log.borrow(), vec!["set_up", "run", "tear_down"]);
        assert_eq!(result.records()[0].outcome, Outcome::Error("tear down failed".into()));
    }

    #[test]
    fn test_factory_error_reported_with_zero_elapsed() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut suite = TestSuite::new("S");
        suite.add_test(TestCase::with_factory("broken", || Err(Fault::error("cannot build"))));
        suite.add_test(TestCase::new("fine", |ctx| ctx.assert(true, "t")));

        let mut result = TestResult::default();
        result.add_listener(Box::new(Recorder::new("l", &events)));
        let _ = runner(RunOptions::default()).run(&TestNode::from(suite), &mut result);

        assert_eq!(result.records()[0].elapsed, Duration::ZERO);
        assert_eq!(kinds(&result), vec![OutcomeKind::Error, OutcomeKind::Success]);
        assert_eq!(
            events.borrow()[1..4],
            [
                "l:start_test S::broken".to_string(),
                "l:error S::broken cannot build".to_string(),
                "l:end_test S::broken".to_string(),
            ]
        );
    }

    #[test]
    fn test_strict_checks_in_order() {
        let options = RunOptions {
            report_useless_tests: true,
            strict_output: true,
            strict_todo: true,
            ..RunOptions::default()
        };
        let mut suite = TestSuite::new("S");
        suite.add_test(TestCase::new("useless", |_| Ok(())));
        suite.add_test(TestCase::new("noisy", |ctx| {
            ctx.write_output("hello");
            ctx.assert(true, "t")
        }));
        suite.add_test(TestCase::new("todo", |ctx| ctx.assert(true, "t")).todo());
        suite.add_test(TestCase::new("fine", |ctx| ctx.assert(true, "t")));

        let result = execute(suite, options);
        let records = result.records();
        assert_eq!(records[0].outcome.message(), "This test did not perform any assertions");
        assert_eq!(records[1].outcome.message(), "This test printed output: hello");
        assert_eq!(records[2].outcome.message(), "This test is marked as todo");
        assert!(records[3].outcome.is_success());
    }

    #[test]
    fn test_time_limit_overrides_failure() {
        let options = RunOptions {
            enforce_time_limit: true,
            timeout_small: Duration::ZERO,
            ..RunOptions::default()
        };
        let mut suite = TestSuite::new("S");
        suite.add_test(
            TestCase::new("slow", |ctx| {
                std::thread::sleep(Duration::from_millis(5));
                ctx.assert(false, "nope")
            })
            .size(Size::Small),
        );
        suite.add_test(TestCase::new("unsized", |ctx| {
            std::thread::sleep(Duration::from_millis(5));
            ctx.assert(true, "t")
        }));

        let result = execute(suite, options);
        assert_eq!(kinds(&result), vec![OutcomeKind::Risky, OutcomeKind::Success]);
        assert!(result.records()[0].outcome.message().contains("small test"));
    }

    #[test]
    fn test_stop_on_failure_ends_open_suites() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let options = RunOptions {
            stop_on: StopPolicy {
                failure: true,
                ..StopPolicy::default()
            },
            ..RunOptions::default()
        };
        let mut inner = TestSuite::new("Inner");
        inner.add_test(TestCase::new("a", |ctx| ctx.assert(true, "t")));
        inner.add_test(TestCase::new("b", |ctx| ctx.assert(false, "broken")));
        inner.add_test(TestCase::new("c", |ctx| ctx.assert(true, "t")));
        let mut root = TestSuite::new("Root");
        root.add_test(inner);
        root.add_test(TestCase::new("d", |ctx| ctx.assert(true, "t")));

        let mut result = TestResult::new(options.stop_on);
        result.add_listener(Box::new(Recorder::new("l", &events)));
        let flow = runner(options).run(&TestNode::from(root), &mut result);

        assert!(flow.is_break());
        assert_eq!(result.run_count(), 2);
        assert!(result.stopped_early());
        let events = events.borrow();
        assert_eq!(events.last().map(String::as_str), Some("l:end_suite Root"));
        assert!(events.contains(&"l:end_suite Inner".to_string()));
    }

    #[test]
    fn test_suite_set_up_skip_skips_all_cases() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let mut suite = TestSuite::new("Db").with_set_up(|| Err(Fault::skipped("database unavailable")));
        suite.add_test(TestCase::new("a", move |_| {
            flag.set(true);
            Ok(())
        }));
        suite.add_test(TestCase::new("b", |_| Ok(())));

        let result = execute(suite, RunOptions::default());
        assert!(!ran.get());
        assert_eq!(result.skipped_count(), 2);
        assert_eq!(result.records()[0].outcome.message(), "database unavailable");
    }

    #[test]
    fn test_suite_set_up_failure_errors_all_cases() {
        let mut suite = TestSuite::new("Db").with_set_up(|| Err(Fault::assertion("bad fixture")));
        suite.add_test(TestCase::new("a", |_| Ok(())));
        suite.add_test(TestCase::new("b", |_| Ok(())));

        let result = execute(suite, RunOptions::default());
        assert_eq!(kinds(&result), vec![OutcomeKind::Error, OutcomeKind::Error]);
        assert_eq!(result.records()[1].outcome.message(), "bad fixture");
    }

    #[test]
    fn test_suite_hooks_skipped_without_admitted_cases() {
        let calls = Rc::new(Cell::new(0));
        let (up, down) = (Rc::clone(&calls), Rc::clone(&calls));
        let mut suite = TestSuite::new("Filtered")
            .with_set_up(move || {
                up.set(up.get() + 1);
                Ok(())
            })
            .with_tear_down(move || {
                down.set(down.get() + 1);
                Ok(())
            });
        suite.add_test(TestCase::new("a", |_| Ok(())).groups(["slow"]));

        let options = RunOptions {
            exclude_groups: vec!["slow".to_string()],
            ..RunOptions::default()
        };
        let filter = FilterChain::from_options(&options).unwrap();
        let mut result = TestResult::default();
        let _ = TestRunner::new(options, filter).run(&TestNode::from(suite), &mut result);

        assert_eq!(calls.get(), 0);
        assert_eq!(result.run_count(), 0);
    }

    #[test]
    fn test_repeat_runs_tree_again_and_stop_cancels() {
        let options = RunOptions {
            repeat: 3,
            ..RunOptions::default()
        };
        let mut suite = TestSuite::new("S");
        suite.add_test(TestCase::new("a", |ctx| ctx.assert(true, "t")));
        suite.add_test(TestCase::new("b", |ctx| ctx.assert(true, "t")));
        let result = execute(suite, options);
        assert_eq!(result.run_count(), 6);

        let options = RunOptions {
            repeat: 3,
            stop_on: StopPolicy {
                error: true,
                ..StopPolicy::default()
            },
            ..RunOptions::default()
        };
        let mut suite = TestSuite::new("S");
        suite.add_test(TestCase::new("a", |ctx| ctx.assert(true, "t")));
        suite.add_test(TestCase::new("b", |_| Err(Fault::error("e"))));
        let result = execute(suite, options);
        assert_eq!(result.run_count(), 2);
    }

    #[test]
    fn test_coverage_collected_per_test() {
        let mut delta = CoverageSnapshot::new();
        delta.record("src/lib.rs", 3, LineStatus::Executed);
        let driver = FixedDriver {
            available: true,
            delta,
            started: Vec::new(),
        };
        let session = CoverageSession::new(Box::new(driver)).unwrap();

        let options = RunOptions {
            strict_coverage: true,
            ..RunOptions::default()
        };
        let mut suite = TestSuite::new("S");
        suite.add_test(TestCase::new("covered", |ctx| ctx.assert(true, "t")).covers(["lib"]));
        suite.add_test(TestCase::new("uncovered", |ctx| ctx.assert(true, "t")));

        let mut result = TestResult::new(options.stop_on);
        result.enable_coverage();
        let mut runner = TestRunner::new(options, FilterChain::new()).with_coverage(session);
        let _ = runner.run(&TestNode::from(suite), &mut result);

        assert_eq!(kinds(&result), vec![OutcomeKind::Success, OutcomeKind::Risky]);
        let coverage = result.coverage().unwrap();
        assert_eq!(
            coverage.line(std::path::Path::new("src/lib.rs"), 3),
            Some(LineStatus::Executed)
        );
    }

    #[test]
    fn test_exit_status() {
        let options = RunOptions::default();
        let mut result = TestResult::default();
        let info = TestInfo::new("t");
        result.record_outcome(&info, Outcome::Risky("r".into()), Duration::ZERO);
        assert_eq!(ExitStatus::from_result(&result, &options), ExitStatus::Success);

        let strict = RunOptions {
            fail_on_risky: true,
            ..RunOptions::default()
        };
        assert_eq!(ExitStatus::from_result(&result, &strict), ExitStatus::Failure);

        result.record_outcome(&info, Outcome::Failure("f".into()), Duration::ZERO);
        assert_eq!(ExitStatus::from_result(&result, &options).code(), 1);
        result.record_outcome(&info, Outcome::Error("e".into()), Duration::ZERO);
        assert_eq!(ExitStatus::from_result(&result, &options).code(), 2);
    }
}
