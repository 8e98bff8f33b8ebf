//! Filter chain deciding which test cases run.
//!
//! A test is admitted only if every filter in the chain admits it. Filters
//! look at leaf cases only; suites are always entered so they still show up
//! in reports when everything inside them was filtered out.

mod group;
mod name;

pub use group::{GroupExcludeFilter, GroupIncludeFilter};
pub use name::NameFilter;

use crate::core::error::Result;
use crate::node::TestInfo;

/// A predicate over test cases.
pub trait TestFilter {
    /// Whether the test should run.
    fn admits(&self, test: &TestInfo) -> bool;

    /// Short description used in debug logs.
    fn describe(&self) -> String;
}

/// AND-composition of filters. An empty chain admits everything.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn TestFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain from run options: exclude groups, include groups, then
    /// the name filter.
    pub fn from_options(options: &crate::config::RunOptions) -> Result<Self> {
        let mut chain = Self::new();
        if !options.exclude_groups.is_empty() {
            chain.push(GroupExcludeFilter::new(options.exclude_groups.iter().cloned()));
        }
        if !options.groups.is_empty() {
            chain.push(GroupIncludeFilter::new(options.groups.iter().cloned()));
        }
        if let Some(ref pattern) = options.filter {
            chain.push(NameFilter::new(pattern)?);
        }
        Ok(chain)
    }

    /// Append a filter.
    pub fn push<F: TestFilter + 'static>(&mut self, filter: F) {
        self.filters.push(Box::new(filter));
    }

    /// Whether every filter admits the test.
    pub fn admits(&self, test: &TestInfo) -> bool {
        self.filters.iter().all(|f| f.admits(test))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Descriptions of the active filters, in order.
    pub fn describe(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.describe()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunOptions;

    fn info(owner: &str, name: &str, groups: &[&str]) -> TestInfo {
        let mut info = TestInfo::new(name);
        info.owner = Some(owner.to_string());
        info.groups = groups.iter().map(|g| g.to_string()).collect();
        info
    }

    #[test]
    fn test_empty_chain_admits_all() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        assert!(chain.admits(&info("A", "t", &[])));
    }

    #[test]
    fn test_chain_is_conjunction() {
        let mut options = RunOptions::default();
        options.groups = vec!["fast".to_string()];
        options.filter = Some("^GroupA::".to_string());
        let chain = FilterChain::from_options(&options).unwrap();
        assert_eq!(chain.len(), 2);

        assert!(chain.admits(&info("GroupA", "t1", &["fast"])));
        // Matches the name but not the group: narrowed, not widened.
        assert!(!chain.admits(&info("GroupA", "t2", &["slow"])));
        assert!(!chain.admits(&info("GroupB", "t3", &["fast"])));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let mut options = RunOptions::default();
        options.groups = vec!["db".to_string()];
        options.exclude_groups = vec!["slow".to_string()];
        let chain = FilterChain::from_options(&options).unwrap();

        assert!(chain.admits(&info("A", "t", &["db"])));
        assert!(!chain.admits(&info("A", "t", &["db", "slow"])));
    }

    #[test]
    fn test_invalid_options_filter_is_escaped_not_rejected() {
        let mut options = RunOptions::default();
        options.filter = Some("test[".to_string());
        let chain = FilterChain::from_options(&options).unwrap();
        assert!(chain.admits(&info("A", "test[", &[])));
    }
}
