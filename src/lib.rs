//! suite-runner: a test-suite orchestrator.
//!
//! The library executes a tree of test suites and test cases, classifies
//! every case into one of seven outcomes (success, failure, error, warning,
//! incomplete, skipped, risky), fans run events out to any number of
//! listeners and optionally collects line coverage and writes coverage
//! reports.
//!
//! # Quick Start
//!
//! ```no_run
//! use suite_runner::{builder, Fault, TestCase, TestNode, TestSuite};
//!
//! # fn main() -> suite_runner::Result<()> {
//! let mut suite = TestSuite::new("MathTest");
//! suite.add_test(TestCase::new("test_add", |ctx| ctx.assert_eq(2 + 2, 4)));
//! suite.add_test(TestCase::new("test_todo", |ctx| {
//!     Err(ctx.mark_incomplete("not written yet"))
//! }));
//! suite.add_test(TestCase::new("test_db", |_| Err(Fault::skipped("no database"))));
//!
//! let report = builder().from_config_file("suite-runner.toml")?.run(&TestNode::from(suite))?;
//! std::process::exit(report.status.code());
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! [run]
//! repeat = 1
//! filter = "MathTest::test_add"
//! exclude-groups = ["slow"]
//!
//! [stop-on]
//! failure = true
//!
//! [strict]
//! useless-tests = true
//!
//! [timeouts]
//! small = 1
//! enforce = true
//!
//! [coverage]
//! lcov-file = "target/coverage/test.lcov"
//! reports = [{ kind = "text", path = "-" }, { kind = "clover", path = "target/coverage/clover.xml" }]
//!
//! [logging]
//! junit = "target/junit.xml"
//! ```
//!
//! The same tables are read from `[package.metadata.suite-runner]` in
//! Cargo.toml, overlaid by `[profiles.<name>]` selected through
//! `SUITE_RUNNER_PROFILE`, then by `SUITE_RUNNER_*` environment variables.
//!
//! # Architecture
//!
//! - [`TestNode`]: the tree of [`TestSuite`]s and [`TestCase`]s
//! - [`FilterChain`](filter::FilterChain): name and group filters
//! - [`TestRunner`](runner::TestRunner): executes the tree and classifies outcomes
//! - [`TestResult`]: counts, records and the stop flag; the single event source
//! - [`TestListener`](listener::TestListener): observers such as the console
//!   printer and the JSON and JUnit loggers
//! - [`CoverageDriver`](coverage::CoverageDriver) and
//!   [`ReportWriter`](coverage::ReportWriter): coverage collection and reports
//!
//! # Features
//!
//! - `default` - Enables `cli` and `cargo-metadata`
//! - `cli` - The `suite-runner` binary
//! - `cargo-metadata` - Reading configuration from Cargo.toml metadata

pub mod config;
pub mod core;
pub mod coverage;
pub mod filter;
pub mod listener;
pub mod node;
pub mod result;
pub mod runner;
pub mod util;

// Re-export commonly used types
pub use crate::core::{Error, Result, RunReport, SuiteRunner, SuiteRunnerBuilder, TestContext};
pub use config::{Config, RunOptions};
pub use node::{DataSet, Size, TestBody, TestCase, TestNode, TestSuite};
pub use result::{Fault, Outcome, OutcomeKind, TestResult};
pub use runner::ExitStatus;

/// Create a new suite runner builder.
///
/// This is the main entry point for the fluent API.
///
/// # Example
///
/// ```no_run
/// use suite_runner::{builder, TestCase, TestNode};
///
/// # fn main() -> suite_runner::Result<()> {
/// let case = TestCase::new("smoke", |ctx| ctx.assert(true, "always"));
/// let report = builder().run(&TestNode::from(case))?;
/// assert!(report.result.was_successful());
/// # Ok(())
/// # }
/// ```
pub fn builder() -> SuiteRunnerBuilder {
    SuiteRunnerBuilder::new()
}
