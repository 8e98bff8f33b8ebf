use super::{DataSet, Size, TestInfo};
use crate::core::context::TestContext;
use crate::result::Fault;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Lifecycle of a single test: set up, run, tear down.
///
/// Any closure `FnMut(&mut TestContext) -> Result<(), Fault>` is a test body
/// with no-op set up and tear down.
pub trait TestBody {
    /// Prepare the fixture.
    fn set_up(&mut self, ctx: &mut TestContext) -> Result<(), Fault> {
        let _ = ctx;
        Ok(())
    }

    /// Execute the test.
    fn run(&mut self, ctx: &mut TestContext) -> Result<(), Fault>;

    /// Release the fixture. Called whenever `set_up` was attempted.
    fn tear_down(&mut self, ctx: &mut TestContext) -> Result<(), Fault> {
        let _ = ctx;
        Ok(())
    }
}

impl<F> TestBody for F
where
    F: FnMut(&mut TestContext) -> Result<(), Fault>,
{
    fn run(&mut self, ctx: &mut TestContext) -> Result<(), Fault> {
        self(ctx)
    }
}

/// Creates a fresh test body for every execution.
pub type TestFactory = Box<dyn Fn() -> Result<Box<dyn TestBody>, Fault>>;

/// A leaf test: the unit that actually executes and produces one outcome.
pub struct TestCase {
    info: TestInfo,
    factory: TestFactory,
}

impl TestCase {
    /// Create a test case from a closure body.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut TestContext) -> Result<(), Fault> + 'static,
    {
        let body = Rc::new(body);
        Self::with_factory(name, move || {
            let body = Rc::clone(&body);
            Ok(Box::new(move |ctx: &mut TestContext| body(ctx)) as Box<dyn TestBody>)
        })
    }

    /// Create a test case whose body is produced by `factory` on each run.
    ///
    /// A factory error is reported as an error outcome for this test.
    pub fn with_factory<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn TestBody>, Fault> + 'static,
    {
        Self {
            info: TestInfo::new(name),
            factory: Box::new(factory),
        }
    }

    /// Add groups to this test.
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Declare the size of this test, selecting its time limit bucket.
    pub fn size(mut self, size: Size) -> Self {
        self.info.size = Some(size);
        self
    }

    /// Attach a data set identifier.
    pub fn data_set(mut self, data_set: DataSet) -> Self {
        self.info.data_set = Some(data_set);
        self
    }

    /// Declare the code units this test covers.
    pub fn covers<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.covers.extend(units.into_iter().map(Into::into));
        self
    }

    /// Mark this test as todo.
    pub fn todo(mut self) -> Self {
        self.info.todo = true;
        self
    }

    /// Set the owner name explicitly (normally the suite it is added to).
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.info.owner = Some(owner.into());
        self
    }

    pub fn info(&self) -> &TestInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Instantiate a fresh body.
    pub fn instantiate(&self) -> Result<Box<dyn TestBody>, Fault> {
        (self.factory)()
    }

    pub(crate) fn adopt(&mut self, owner: &str, groups: &BTreeSet<String>) {
        if self.info.owner.is_none() {
            self.info.owner = Some(owner.to_string());
        }
        self.inherit_groups(groups);
    }

    pub(crate) fn inherit_groups(&mut self, groups: &BTreeSet<String>) {
        self.info.groups.extend(groups.iter().cloned());
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase").field("info", &self.info).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_builder_sets_metadata() {
        let case = TestCase::new("test_login", |_ctx| Ok(()))
            .groups(["auth", "fast"])
            .size(Size::Medium)
            .data_set(DataSet::Index(2))
            .covers(["Session::open"])
            .todo();

        let info = case.info();
        assert_eq!(info.name, "test_login");
        assert!(info.groups.contains("auth"));
        assert!(info.groups.contains("fast"));
        assert_eq!(info.size, Some(Size::Medium));
        assert_eq!(info.data_set, Some(DataSet::Index(2)));
        assert_eq!(info.covers, vec!["Session::open".to_string()]);
        assert!(info.todo);
    }

    #[test]
    fn test_closure_body_runs() {
        let case = TestCase::new("t", |ctx| ctx.assert(true, "true"));
        let mut body = case.instantiate().unwrap();
        let mut ctx = TestContext::new();
        body.run(&mut ctx).unwrap();
        assert_eq!(ctx.assertion_count(), 1);
    }

    #[test]
    fn test_factory_error_surfaces() {
        let case = TestCase::with_factory("broken", || Err(Fault::error("no public constructor")));
        assert!(case.instantiate().is_err());
    }

    #[test]
    fn test_adopt_keeps_explicit_owner() {
        let mut case = TestCase::new("t", |_| Ok(())).owner("Explicit");
        case.adopt("Suite", &BTreeSet::from(["slow".to_string()]));
        assert_eq!(case.info().owner.as_deref(), Some("Explicit"));
        assert!(case.info().groups.contains("slow"));
    }
}
