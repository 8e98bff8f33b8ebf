use super::TestFilter;
use crate::core::error::{Error, Result};
use crate::node::{DataSet, TestInfo};
use regex::Regex;
use std::ops::RangeInclusive;

/// Which data sets a [`NameFilter`] accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DataSetSelector {
    /// Match against the full display name.
    Any,
    /// `pattern#N` or `pattern#N-M`.
    Index(RangeInclusive<usize>),
    /// `pattern@name`.
    Named(String),
}

/// Admits tests whose name matches a regular expression.
///
/// Without a data set selector the expression is matched against the display
/// name (`Owner::name with data set #N`). With a trailing `#N`, `#N-M` or
/// `@name` the rest of the expression is matched against the qualified name
/// and the data set must match the selector.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: String,
    regex: Regex,
    selector: DataSetSelector,
}

impl NameFilter {
    /// Parse a filter string.
    ///
    /// Surrounding `/` delimiters are stripped. An expression that does not
    /// compile is escaped and matched literally.
    pub fn new(filter: &str) -> Result<Self> {
        let stripped = strip_delimiters(filter);
        let (expr, selector) = split_selector(stripped);

        let regex = match Regex::new(expr) {
            Ok(regex) => regex,
            Err(_) => {
                tracing::debug!(
                    target: "suite_runner::filter",
                    filter = %filter,
                    "filter is not a valid regex, matching literally"
                );
                Regex::new(&regex::escape(expr)).map_err(|e| Error::filter(e.to_string()))?
            }
        };

        Ok(Self {
            pattern: filter.to_string(),
            regex,
            selector,
        })
    }

    /// The filter string as given.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn strip_delimiters(filter: &str) -> &str {
    if filter.len() >= 2 && filter.starts_with('/') && filter.ends_with('/') {
        &filter[1..filter.len() - 1]
    } else {
        filter
    }
}

fn split_selector(expr: &str) -> (&str, DataSetSelector) {
    if let Some((rest, range)) = expr.rsplit_once('#') {
        if let Some(range) = parse_index_range(range) {
            return (rest, DataSetSelector::Index(range));
        }
    }
    if let Some((rest, name)) = expr.split_once('@') {
        if !name.is_empty() {
            return (rest, DataSetSelector::Named(name.to_string()));
        }
    }
    (expr, DataSetSelector::Any)
}

/// `N` or `N-M`. Anything else is not a selector and stays part of the regex.
fn parse_index_range(s: &str) -> Option<RangeInclusive<usize>> {
    let digits = |part: &str| -> Option<usize> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    };
    match s.split_once('-') {
        Some((start, end)) => Some(digits(start)?..=digits(end)?),
        None => digits(s).map(|i| i..=i),
    }
}

impl TestFilter for NameFilter {
    fn admits(&self, test: &TestInfo) -> bool {
        match &self.selector {
            DataSetSelector::Any => self.regex.is_match(&test.display_name()),
            DataSetSelector::Index(range) => match &test.data_set {
                Some(DataSet::Index(i)) => {
                    range.contains(i) && self.regex.is_match(&test.qualified_name())
                }
                _ => false,
            },
            DataSetSelector::Named(name) => match &test.data_set {
                Some(DataSet::Named(n)) => n == name && self.regex.is_match(&test.qualified_name()),
                _ => false,
            },
        }
    }

    fn describe(&self) -> String {
        format!("name matches {}", self.pattern)
    }
}
