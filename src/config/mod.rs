//! Configuration types, loaded from `suite-runner.toml` or
//! `[package.metadata.suite-runner]` in Cargo.toml, and normalized into
//! [`RunOptions`].

use crate::coverage::{ReportTarget, ReportThresholds};
use crate::core::error::{Error, Result};
use crate::node::Size;
use crate::result::StopPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub mod env;
mod loader;
pub use loader::ConfigLoader;

/// Complete configuration for a run, as written in TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Selection and repetition.
    #[serde(default)]
    pub run: RunConfig,

    /// Outcome kinds that stop the run.
    #[serde(default, rename = "stop-on")]
    pub stop_on: StopPolicy,

    /// Outcome kinds that make an otherwise passing run fail.
    #[serde(default, rename = "fail-on")]
    pub fail_on: FailOnConfig,

    /// Checks that turn passing tests risky.
    #[serde(default)]
    pub strict: StrictConfig,

    /// Per-size time limits.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Coverage reports.
    #[serde(default)]
    pub coverage: CoverageConfig,

    /// Console printer settings.
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Log files written by the built-in file loggers.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    /// Number of times the whole tree is executed.
    pub repeat: usize,

    /// Name filter expression.
    pub filter: Option<String>,

    /// Only run tests in these groups.
    pub groups: Vec<String>,

    /// Never run tests in these groups.
    pub exclude_groups: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repeat: 1,
            filter: None,
            groups: Vec::new(),
            exclude_groups: Vec::new(),
        }
    }
}

/// `[fail-on]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FailOnConfig {
    pub risky: bool,
    pub warning: bool,
}

/// `[strict]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct StrictConfig {
    /// Risky when coverage is collected and the test declares no covered units.
    pub coverage: bool,
    /// Risky when the test produces output.
    pub output: bool,
    /// Risky when the test is marked todo.
    pub todo: bool,
    /// Risky when a passing test performed no assertions.
    pub useless_tests: bool,
}

/// `[timeouts]` section, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub small: u64,
    pub medium: u64,
    pub large: u64,
    /// Whether exceeding the limit turns the test risky.
    pub enforce: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            small: 1,
            medium: 10,
            large: 60,
            enforce: false,
        }
    }
}

/// `[coverage]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CoverageConfig {
    /// Reports to generate after the run.
    pub reports: Vec<ReportTarget>,
    /// LCOV tracefile the tests write, read after every test.
    pub lcov_file: Option<PathBuf>,
    pub low_upper_bound: u8,
    pub high_lower_bound: u8,
    pub crap4j_threshold: u32,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        let thresholds = ReportThresholds::default();
        Self {
            reports: Vec::new(),
            lcov_file: None,
            low_upper_bound: thresholds.low_upper_bound,
            high_lower_bound: thresholds.high_lower_bound,
            crap4j_threshold: thresholds.crap4j_threshold,
        }
    }
}

/// `[console]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub columns: usize,
    pub colors: ColorMode,
    pub verbose: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            columns: 80,
            colors: ColorMode::Auto,
            verbose: false,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path of the JSON event log.
    pub json: Option<PathBuf>,
    /// Path of the JUnit XML log.
    pub junit: Option<PathBuf>,
}

/// When the console printer emits ANSI colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Colors when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl FromStr for ColorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorMode::Auto),
            "always" => Ok(ColorMode::Always),
            "never" => Ok(ColorMode::Never),
            other => Err(Error::invalid_config("console.colors", other)),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a configuration file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate and normalize into the options the runner consumes.
    pub fn to_run_options(&self) -> Result<RunOptions> {
        if self.run.repeat == 0 {
            return Err(Error::invalid_config("run.repeat", "0"));
        }
        if self.coverage.low_upper_bound > self.coverage.high_lower_bound {
            return Err(Error::invalid_config(
                "coverage.low-upper-bound",
                format!(
                    "{} (must not exceed high-lower-bound {})",
                    self.coverage.low_upper_bound, self.coverage.high_lower_bound
                ),
            ));
        }
        if self.console.columns == 0 {
            return Err(Error::invalid_config("console.columns", "0"));
        }

        Ok(RunOptions {
            timeout_small: Duration::from_secs(self.timeouts.small),
            timeout_medium: Duration::from_secs(self.timeouts.medium),
            timeout_large: Duration::from_secs(self.timeouts.large),
            enforce_time_limit: self.timeouts.enforce,
            stop_on: self.stop_on,
            fail_on_risky: self.fail_on.risky,
            fail_on_warning: self.fail_on.warning,
            strict_coverage: self.strict.coverage,
            strict_output: self.strict.output,
            strict_todo: self.strict.todo,
            report_useless_tests: self.strict.useless_tests,
            repeat: self.run.repeat,
            groups: self.run.groups.clone(),
            exclude_groups: self.run.exclude_groups.clone(),
            filter: self.run.filter.clone(),
            coverage_reports: self.coverage.reports.clone(),
            lcov_file: self.coverage.lcov_file.clone(),
            thresholds: ReportThresholds {
                low_upper_bound: self.coverage.low_upper_bound,
                high_lower_bound: self.coverage.high_lower_bound,
                crap4j_threshold: self.coverage.crap4j_threshold,
            },
            columns: self.console.columns,
            colors: self.console.colors,
            verbose: self.console.verbose,
            json_log: self.logging.json.clone(),
            junit_log: self.logging.junit.clone(),
        })
    }
}

/// Normalized, immutable options for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub timeout_small: Duration,
    pub timeout_medium: Duration,
    pub timeout_large: Duration,
    pub enforce_time_limit: bool,
    pub stop_on: StopPolicy,
    pub fail_on_risky: bool,
    pub fail_on_warning: bool,
    pub strict_coverage: bool,
    pub strict_output: bool,
    pub strict_todo: bool,
    pub report_useless_tests: bool,
    pub repeat: usize,
    pub groups: Vec<String>,
    pub exclude_groups: Vec<String>,
    pub filter: Option<String>,
    pub coverage_reports: Vec<ReportTarget>,
    pub lcov_file: Option<PathBuf>,
    pub thresholds: ReportThresholds,
    pub columns: usize,
    pub colors: ColorMode,
    pub verbose: bool,
    pub json_log: Option<PathBuf>,
    pub junit_log: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        let timeouts = TimeoutConfig::default();
        let console = ConsoleConfig::default();
        Self {
            timeout_small: Duration::from_secs(timeouts.small),
            timeout_medium: Duration::from_secs(timeouts.medium),
            timeout_large: Duration::from_secs(timeouts.large),
            enforce_time_limit: false,
            stop_on: StopPolicy::default(),
            fail_on_risky: false,
            fail_on_warning: false,
            strict_coverage: false,
            strict_output: false,
            strict_todo: false,
            report_useless_tests: false,
            repeat: 1,
            groups: Vec::new(),
            exclude_groups: Vec::new(),
            filter: None,
            coverage_reports: Vec::new(),
            lcov_file: None,
            thresholds: ReportThresholds::default(),
            columns: console.columns,
            colors: console.colors,
            verbose: console.verbose,
            json_log: None,
            junit_log: None,
        }
    }
}

impl RunOptions {
    /// Time limit for a test of the given size. Tests without a declared size
    /// have no limit.
    pub fn time_limit(&self, size: Option<Size>) -> Option<Duration> {
        match size? {
            Size::Small => Some(self.timeout_small),
            Size::Medium => Some(self.timeout_medium),
            Size::Large => Some(self.timeout_large),
        }
    }
}
