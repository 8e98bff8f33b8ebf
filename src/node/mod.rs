//! The test tree: leaf [`TestCase`]s grouped into ordered [`TestSuite`]s.
//!
//! The tree is built once before a run and is read-only while it executes.
//! Insertion order of children is preserved and is the execution and
//! reporting order.

mod case;
pub mod manifest;
mod suite;

pub use case::{TestBody, TestCase, TestFactory};
pub use suite::{SuiteHook, TestSuite};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Group every test without an explicit group belongs to.
pub const DEFAULT_GROUP: &str = "default";

/// Size classification of a test, selecting its time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Medium,
    Large,
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
        })
    }
}

/// Identifier of a data-provider row a test was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataSet {
    Index(usize),
    Named(String),
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSet::Index(i) => write!(f, "#{i}"),
            DataSet::Named(name) => write!(f, "\"{name}\""),
        }
    }
}

/// Read-only description of a test case, handed to filters and listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestInfo {
    pub name: String,
    /// Name of the suite the test belongs to.
    pub owner: Option<String>,
    pub groups: BTreeSet<String>,
    pub size: Option<Size>,
    pub data_set: Option<DataSet>,
    /// Code units the test declares it covers.
    pub covers: Vec<String>,
    pub todo: bool,
}

impl TestInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            groups: BTreeSet::new(),
            size: None,
            data_set: None,
            covers: Vec::new(),
            todo: false,
        }
    }

    /// `Owner::name`, or just the name for tests without an owner.
    pub fn qualified_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}::{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Qualified name plus the data set suffix, if any.
    pub fn display_name(&self) -> String {
        match &self.data_set {
            Some(data_set) => format!("{} with data set {data_set}", self.qualified_name()),
            None => self.qualified_name(),
        }
    }

    /// Groups used for filtering; tests without groups are in [`DEFAULT_GROUP`].
    pub fn effective_groups(&self) -> BTreeSet<&str> {
        if self.groups.is_empty() {
            BTreeSet::from([DEFAULT_GROUP])
        } else {
            self.groups.iter().map(String::as_str).collect()
        }
    }
}

/// Read-only description of a suite, handed to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteInfo {
    pub name: String,
    /// Number of tests in the suite that will run after filtering.
    pub test_count: usize,
}

/// A node in the test tree.
#[derive(Debug)]
pub enum TestNode {
    Case(TestCase),
    Suite(TestSuite),
}

impl TestNode {
    pub fn name(&self) -> &str {
        match self {
            TestNode::Case(case) => case.name(),
            TestNode::Suite(suite) => suite.name(),
        }
    }

    /// Number of leaf test cases below this node.
    pub fn count(&self) -> usize {
        match self {
            TestNode::Case(_) => 1,
            TestNode::Suite(suite) => suite.count(),
        }
    }

    /// Visit every leaf test case in execution order.
    pub fn for_each_case<'a>(&'a self, f: &mut dyn FnMut(&'a TestCase)) {
        match self {
            TestNode::Case(case) => f(case),
            TestNode::Suite(suite) => {
                for child in suite.tests() {
                    child.for_each_case(f);
                }
            }
        }
    }
}

impl From<TestCase> for TestNode {
    fn from(case: TestCase) -> Self {
        TestNode::Case(case)
    }
}

impl From<TestSuite> for TestNode {
    fn from(suite: TestSuite) -> Self {
        TestNode::Suite(suite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_and_display_names() {
        let mut info = TestInfo::new("test_add");
        assert_eq!(info.qualified_name(), "test_add");

        info.owner = Some("MathTest".to_string());
        assert_eq!(info.qualified_name(), "MathTest::test_add");
        assert_eq!(info.display_name(), "MathTest::test_add");

        info.data_set = Some(DataSet::Index(3));
        assert_eq!(info.display_name(), "MathTest::test_add with data set #3");

        info.data_set = Some(DataSet::Named("negative".to_string()));
        assert_eq!(
            info.display_name(),
            "MathTest::test_add with data set \"negative\""
        );
    }

    #[test]
    fn test_effective_groups_default() {
        let mut info = TestInfo::new("t");
        assert_eq!(info.effective_groups(), BTreeSet::from([DEFAULT_GROUP]));

        info.groups.insert("slow".to_string());
        assert_eq!(info.effective_groups(), BTreeSet::from(["slow"]));
    }

    #[test]
    fn test_node_count_and_order() {
        let mut inner = TestSuite::new("Inner");
        inner.add_test(TestCase::new("c", |_| Ok(())));
        let mut root = TestSuite::new("Root");
        root.add_test(TestCase::new("a", |_| Ok(())));
        root.add_test(inner);
        root.add_test(TestCase::new("b", |_| Ok(())));

        let root = TestNode::from(root);
        assert_eq!(root.count(), 3);

        let mut names = Vec::new();
        root.for_each_case(&mut |case| names.push(case.info().qualified_name()));
        assert_eq!(names, vec!["Root::a", "Inner::c", "Root::b"]);
    }

    #[test]
    fn test_data_set_deserializes_untagged() {
        let index: DataSet = serde_json::from_str("4").unwrap();
        assert_eq!(index, DataSet::Index(4));
        let named: DataSet = serde_json::from_str("\"edge\"").unwrap();
        assert_eq!(named, DataSet::Named("edge".to_string()));
    }
}
