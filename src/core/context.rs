use crate::result::Fault;
use std::fmt::Debug;

/// Context object that carries state through a single test execution.
///
/// A fresh context is created for every executed test case. Test bodies use it
/// to make counted assertions, to mark themselves skipped, incomplete or risky,
/// and to emit output that the strict-output check can see.
#[derive(Debug, Default)]
pub struct TestContext {
    /// Number of assertions performed so far.
    assertions: usize,

    /// Explicit skip/incomplete/risky marker raised by the test.
    marker: Option<Fault>,

    /// Output written by the test.
    output: String,
}

impl TestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert that `condition` holds.
    pub fn assert(&mut self, condition: bool, message: impl Into<String>) -> Result<(), Fault> {
        self.assertions += 1;
        if condition {
            Ok(())
        } else {
            Err(Fault::assertion(message))
        }
    }

    /// Assert that two values are equal.
    pub fn assert_eq<T: PartialEq + Debug>(&mut self, left: T, right: T) -> Result<(), Fault> {
        self.assertions += 1;
        if left == right {
            Ok(())
        } else {
            Err(Fault::assertion(format!(
                "Failed asserting that {:?} matches expected {:?}.",
                left, right
            )))
        }
    }

    /// Assert that a result is `Ok`, turning an `Err` into a failed assertion.
    pub fn assert_ok<T, E: Debug>(&mut self, result: std::result::Result<T, E>) -> Result<T, Fault> {
        self.assertions += 1;
        result.map_err(|e| Fault::assertion(format!("Failed asserting that {:?} is ok.", e)))
    }

    /// Count assertions that were performed outside of this context.
    pub fn add_assertions(&mut self, count: usize) {
        self.assertions += count;
    }

    /// Number of assertions performed.
    pub fn assertion_count(&self) -> usize {
        self.assertions
    }

    /// Mark the test as skipped. Return the fault from the test body:
    ///
    /// ```
    /// # use suite_runner::{Fault, TestContext};
    /// fn body(ctx: &mut TestContext) -> Result<(), Fault> {
    ///     Err(ctx.mark_skipped("database not reachable"))
    /// }
    /// ```
    pub fn mark_skipped(&mut self, reason: impl Into<String>) -> Fault {
        self.set_marker(Fault::skipped(reason))
    }

    /// Mark the test as incomplete.
    pub fn mark_incomplete(&mut self, reason: impl Into<String>) -> Fault {
        self.set_marker(Fault::incomplete(reason))
    }

    /// Mark the test as risky.
    pub fn mark_risky(&mut self, reason: impl Into<String>) -> Fault {
        self.set_marker(Fault::risky(reason))
    }

    /// The explicit marker raised by the test, if any.
    pub fn marker(&self) -> Option<&Fault> {
        self.marker.as_ref()
    }

    /// Write output from the test.
    pub fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Output written so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    fn set_marker(&mut self, fault: Fault) -> Fault {
        // First marker wins.
        if self.marker.is_none() {
            self.marker = Some(fault.clone());
        }
        fault
    }
}
