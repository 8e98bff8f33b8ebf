use super::TestFilter;
use crate::node::TestInfo;
use std::collections::BTreeSet;

/// Admits tests belonging to at least one of the included groups.
#[derive(Debug, Clone)]
pub struct GroupIncludeFilter {
    groups: BTreeSet<String>,
}

impl GroupIncludeFilter {
    pub fn new(groups: impl IntoIterator<Item = String>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }
}

impl TestFilter for GroupIncludeFilter {
    fn admits(&self, test: &TestInfo) -> bool {
        test.effective_groups()
            .iter()
            .any(|g| self.groups.contains(*g))
    }

    fn describe(&self) -> String {
        format!("include groups {:?}", self.groups)
    }
}

/// Admits tests belonging to none of the excluded groups.
#[derive(Debug, Clone)]
pub struct GroupExcludeFilter {
    groups: BTreeSet<String>,
}

impl GroupExcludeFilter {
    pub fn new(groups: impl IntoIterator<Item = String>) -> Self {
        Self {
            groups: groups.into_iter().collect(),
        }
    }
}

impl TestFilter for GroupExcludeFilter {
    fn admits(&self, test: &TestInfo) -> bool {
        !test
            .effective_groups()
            .iter()
            .any(|g| self.groups.contains(*g))
    }

    fn describe(&self) -> String {
        format!("exclude groups {:?}", self.groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_groups(groups: &[&str]) -> TestInfo {
        let mut info = TestInfo::new("t");
        info.groups = groups.iter().map(|g| g.to_string()).collect();
        info
    }

    #[test]
    fn test_include_any_match() {
        let filter = GroupIncludeFilter::new(["a".to_string(), "b".to_string()]);
        assert!(filter.admits(&with_groups(&["b", "c"])));
        assert!(!filter.admits(&with_groups(&["c"])));
    }

    #[test]
    fn test_include_default_group() {
        let filter = GroupIncludeFilter::new(["default".to_string()]);
        assert!(filter.admits(&with_groups(&[])));
        assert!(!filter.admits(&with_groups(&["named"])));
    }

    #[test]
    fn test_exclude_any_match() {
        let filter = GroupExcludeFilter::new(["slow".to_string()]);
        assert!(filter.admits(&with_groups(&["fast"])));
        assert!(!filter.admits(&with_groups(&["fast", "slow"])));
    }
}
