//! Line coverage collection around each test and report generation after the
//! run.
//!
//! A [`CoverageDriver`] does the actual instrumentation. The runner wraps it in
//! a [`CoverageSession`] that is started before and stopped after every test;
//! each stop yields a delta that is merged into the run's [`CoverageSnapshot`].

mod lcov;
mod report;

pub use lcov::LcovFileDriver;
pub use report::{
    CloverReport, CoverageBand, ReportKind, ReportSet, ReportTarget, ReportThresholds,
    ReportWriter, TextReport,
};

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Execution status of a single source line.
///
/// Variants are ordered so that merging keeps the maximum:
/// `Executed` dominates `NotExecuted` dominates `NotExecutable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineStatus {
    NotExecutable,
    NotExecuted,
    Executed,
}

/// Executable and executed line counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub executable: usize,
    pub executed: usize,
}

impl LineCounts {
    /// Executed share in percent; 100 when nothing is executable.
    pub fn percent(&self) -> f64 {
        if self.executable == 0 {
            100.0
        } else {
            self.executed as f64 * 100.0 / self.executable as f64
        }
    }

    fn add(&mut self, other: LineCounts) {
        self.executable += other.executable;
        self.executed += other.executed;
    }
}

/// Aggregated per-line execution data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    files: BTreeMap<PathBuf, BTreeMap<u32, LineStatus>>,
}

impl CoverageSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the status of one line, keeping the dominant status.
    pub fn record(&mut self, file: impl Into<PathBuf>, line: u32, status: LineStatus) {
        let entry = self
            .files
            .entry(file.into())
            .or_default()
            .entry(line)
            .or_insert(status);
        *entry = (*entry).max(status);
    }

    /// Merge another snapshot into this one.
    pub fn merge(&mut self, other: &CoverageSnapshot) {
        for (file, lines) in &other.files {
            let target = self.files.entry(file.clone()).or_default();
            for (&line, &status) in lines {
                let entry = target.entry(line).or_insert(status);
                *entry = (*entry).max(status);
            }
        }
    }

    /// Status of a line, if the file and line are known.
    pub fn line(&self, file: &Path, line: u32) -> Option<LineStatus> {
        self.files.get(file)?.get(&line).copied()
    }

    /// Files in path order with their line maps.
    pub fn files(&self) -> impl Iterator<Item = (&Path, &BTreeMap<u32, LineStatus>)> {
        self.files.iter().map(|(path, lines)| (path.as_path(), lines))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Line counts for one file.
    pub fn file_counts(&self, file: &Path) -> LineCounts {
        self.files.get(file).map(count_lines).unwrap_or_default()
    }

    /// Line counts across all files.
    pub fn totals(&self) -> LineCounts {
        let mut totals = LineCounts::default();
        for lines in self.files.values() {
            totals.add(count_lines(lines));
        }
        totals
    }
}

fn count_lines(lines: &BTreeMap<u32, LineStatus>) -> LineCounts {
    let mut counts = LineCounts::default();
    for status in lines.values() {
        match status {
            LineStatus::Executed => {
                counts.executable += 1;
                counts.executed += 1;
            }
            LineStatus::NotExecuted => counts.executable += 1,
            LineStatus::NotExecutable => {}
        }
    }
    counts
}

/// Collects line coverage while a test runs.
pub trait CoverageDriver {
    /// Human-readable driver name.
    fn name(&self) -> &str;

    /// Whether the driver can collect coverage in this environment.
    fn is_available(&self) -> bool;

    /// Begin collecting for the test with the given display name.
    fn start(&mut self, test_id: &str) -> Result<()>;

    /// Stop collecting and return the lines touched since `start`.
    fn stop(&mut self) -> Result<CoverageSnapshot>;
}

/// A driver bound to a run. Driver errors are logged and never fail a test.
pub struct CoverageSession {
    driver: Box<dyn CoverageDriver>,
    active: Option<String>,
}

impl CoverageSession {
    /// Wrap a driver. Fails when the driver is not available.
    pub fn new(driver: Box<dyn CoverageDriver>) -> Result<Self> {
        if !driver.is_available() {
            return Err(Error::coverage(format!(
                "driver '{}' is not available",
                driver.name()
            )));
        }
        Ok(Self {
            driver,
            active: None,
        })
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Start collecting for one test.
    pub fn start(&mut self, test_id: &str) {
        match self.driver.start(test_id) {
            Ok(()) => self.active = Some(test_id.to_string()),
            Err(e) => {
                tracing::warn!(target: "suite_runner::coverage", test = %test_id, "failed to start coverage: {e}");
                self.active = None;
            }
        }
    }

    /// Stop collecting. Returns `None` if collection was not running or the
    /// driver failed.
    pub fn stop(&mut self) -> Option<CoverageSnapshot> {
        let test_id = self.active.take()?;
        match self.driver.stop() {
            Ok(delta) => {
                tracing::debug!(
                    target: "suite_runner::coverage",
                    test = %test_id,
                    files = delta.files.len(),
                    "coverage collected"
                );
                Some(delta)
            }
            Err(e) => {
                tracing::warn!(target: "suite_runner::coverage", test = %test_id, "failed to stop coverage: {e}");
                None
            }
        }
    }
}
