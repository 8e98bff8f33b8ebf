use super::TestNode;
use crate::result::Fault;
use std::collections::BTreeSet;
use std::fmt;

/// Suite-level set up or tear down hook.
pub type SuiteHook = Box<dyn Fn() -> Result<(), Fault>>;

/// An ordered collection of test nodes.
///
/// Tests added to a suite take the suite's name as their owner (unless they
/// already have one) and inherit the suite's groups.
pub struct TestSuite {
    name: String,
    groups: BTreeSet<String>,
    tests: Vec<TestNode>,
    set_up: Option<SuiteHook>,
    tear_down: Option<SuiteHook>,
}

impl TestSuite {
    /// Create an empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: BTreeSet::new(),
            tests: Vec::new(),
            set_up: None,
            tear_down: None,
        }
    }

    /// Groups applied to every test subsequently added to this suite.
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Hook run once before the first test of the suite.
    ///
    /// Returning `Fault::Skipped` skips every test in the suite; any other
    /// fault reports every test as an error.
    pub fn with_set_up<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), Fault> + 'static,
    {
        self.set_up = Some(Box::new(hook));
        self
    }

    /// Hook run once after the last test of the suite.
    pub fn with_tear_down<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), Fault> + 'static,
    {
        self.tear_down = Some(Box::new(hook));
        self
    }

    /// Append a test case or a nested suite.
    pub fn add_test(&mut self, test: impl Into<TestNode>) {
        let mut node = test.into();
        adopt(&mut node, &self.name, &self.groups);
        self.tests.push(node);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Direct children in insertion order.
    pub fn tests(&self) -> &[TestNode] {
        &self.tests
    }

    /// Number of leaf test cases in this suite, recursively.
    pub fn count(&self) -> usize {
        self.tests.iter().map(TestNode::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub(crate) fn set_up(&self) -> Result<(), Fault> {
        self.set_up.as_ref().map_or(Ok(()), |hook| hook())
    }

    pub(crate) fn tear_down(&self) -> Result<(), Fault> {
        self.tear_down.as_ref().map_or(Ok(()), |hook| hook())
    }
}

/// Give a newly added node its owner and the suite's groups.
///
/// Cases of a nested suite keep that suite as their owner; only groups flow
/// down.
fn adopt(node: &mut TestNode, owner: &str, groups: &BTreeSet<String>) {
    match node {
        TestNode::Case(case) => case.adopt(owner, groups),
        TestNode::Suite(_) => inherit_groups(node, groups),
    }
}

fn inherit_groups(node: &mut TestNode, groups: &BTreeSet<String>) {
    match node {
        TestNode::Case(case) => case.inherit_groups(groups),
        TestNode::Suite(suite) => {
            suite.groups.extend(groups.iter().cloned());
            for child in &mut suite.tests {
                inherit_groups(child, groups);
            }
        }
    }
}

impl fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSuite")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .field("tests", &self.tests)
            .finish_non_exhaustive()
    }
}
