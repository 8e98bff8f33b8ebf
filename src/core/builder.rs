use crate::config::{ColorMode, Config, ConfigLoader, RunOptions};
use crate::core::error::Result;
use crate::coverage::{CoverageDriver, CoverageSession, LcovFileDriver, ReportSet, ReportWriter};
use crate::filter::FilterChain;
use crate::listener::{JsonLogger, JunitLogger, ResultPrinter, TestListener};
use crate::node::TestNode;
use crate::result::TestResult;
use crate::runner::{ExitStatus, TestRunner};
use std::io::Write;
use std::path::PathBuf;

/// Builder for configuring and running a test tree.
pub struct SuiteRunnerBuilder {
    config: Option<Config>,
    options: Option<RunOptions>,
    listeners: Vec<Box<dyn TestListener>>,
    coverage_driver: Option<Box<dyn CoverageDriver>>,
    reports: ReportSet,
    console: Option<(Box<dyn Write>, Box<dyn Write>)>,
    printer: bool,
}

impl SuiteRunnerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: None,
            options: None,
            listeners: Vec::new(),
            coverage_driver: None,
            reports: ReportSet::with_builtin(),
            console: None,
            printer: true,
        }
    }

    /// Set the configuration directly.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from Cargo.toml metadata, the environment and the
    /// active profile.
    pub fn from_cargo_metadata(mut self) -> Result<Self> {
        self.config = Some(ConfigLoader::new().cargo_metadata().load()?);
        Ok(self)
    }

    /// Load configuration from a standalone TOML file.
    pub fn from_config_file(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        self.config = Some(ConfigLoader::new().config_file(path).load()?);
        Ok(self)
    }

    /// Use already normalized options. Takes precedence over any config.
    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Register a listener. Listeners are notified after the console
    /// printer, in registration order.
    pub fn listener<L: TestListener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Collect coverage with this driver.
    pub fn coverage_driver<D: CoverageDriver + 'static>(mut self, driver: D) -> Self {
        self.coverage_driver = Some(Box::new(driver));
        self
    }

    /// Register a coverage report writer, replacing the one for its kind.
    pub fn report_writer<W: ReportWriter + 'static>(mut self, writer: W) -> Self {
        self.reports.register(writer);
        self
    }

    /// Send console output somewhere other than stdout. Colors are only
    /// used with `ColorMode::Always`.
    pub fn console_output<W: Write + Clone + 'static>(mut self, out: W) -> Self {
        self.console = Some((Box::new(out.clone()), Box::new(out)));
        self
    }

    /// Do not register the console printer.
    pub fn without_printer(mut self) -> Self {
        self.printer = false;
        self
    }

    /// Validate the configuration and assemble the runner.
    pub fn build(self) -> Result<SuiteRunner> {
        let options = match (self.options, &self.config) {
            (Some(options), _) => options,
            (None, Some(config)) => config.to_run_options()?,
            (None, None) => RunOptions::default(),
        };
        let filter = FilterChain::from_options(&options)?;
        if !filter.is_empty() {
            tracing::debug!(target: "suite_runner::filter", filters = ?filter.describe(), "filter chain built");
        }

        let (printer_out, out): (Option<Box<dyn Write>>, Box<dyn Write>) = match self.console {
            Some((printer_out, out)) => (Some(printer_out), out),
            None => (None, Box::new(std::io::stdout())),
        };

        let mut listeners: Vec<Box<dyn TestListener>> = Vec::new();
        if self.printer {
            let printer = match printer_out {
                Some(w) => ResultPrinter::new(w, &options, options.colors == ColorMode::Always),
                None => ResultPrinter::stdout(&options),
            };
            listeners.push(Box::new(printer));
        }
        listeners.extend(self.listeners);
        if let Some(path) = &options.json_log {
            listeners.push(Box::new(JsonLogger::to_file(path)?));
        }
        if let Some(path) = &options.junit_log {
            listeners.push(Box::new(JunitLogger::to_file(path)?));
        }

        let coverage_driver = self.coverage_driver.or_else(|| {
            options
                .lcov_file
                .as_ref()
                .map(|path| Box::new(LcovFileDriver::new(path)) as Box<dyn CoverageDriver>)
        });

        Ok(SuiteRunner {
            options,
            filter,
            listeners,
            coverage_driver,
            reports: self.reports,
            out,
        })
    }

    /// Build and immediately run.
    pub fn run(self, root: &TestNode) -> Result<RunReport> {
        let runner = self.build()?;
        runner.run(root)
    }
}

impl Default for SuiteRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The finished run: the aggregated result and the process exit status.
pub struct RunReport {
    pub result: TestResult,
    pub status: ExitStatus,
}

/// Runs a test tree with its listeners, coverage and reports.
pub struct SuiteRunner {
    options: RunOptions,
    filter: FilterChain,
    listeners: Vec<Box<dyn TestListener>>,
    coverage_driver: Option<Box<dyn CoverageDriver>>,
    reports: ReportSet,
    out: Box<dyn Write>,
}

impl SuiteRunner {
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run the tree: execute it `repeat` times, flush listeners, then
    /// generate the coverage reports.
    pub fn run(mut self, root: &TestNode) -> Result<RunReport> {
        let mut result = TestResult::new(self.options.stop_on);
        for listener in self.listeners.drain(..) {
            result.add_listener(listener);
        }

        let filter = std::mem::take(&mut self.filter);
        let mut runner = TestRunner::new(self.options.clone(), filter);
        if let Some(driver) = self.coverage_driver.take() {
            match CoverageSession::new(driver) {
                Ok(session) => {
                    tracing::info!(target: "suite_runner::coverage", driver = session.driver_name(), "collecting coverage");
                    result.enable_coverage();
                    runner = runner.with_coverage(session);
                }
                Err(e) => {
                    tracing::warn!(target: "suite_runner::coverage", "coverage disabled: {e}");
                    if let Err(write_err) =
                        writeln!(self.out, "Warning: {e}, continuing without code coverage\n")
                    {
                        tracing::warn!(target: "suite_runner::runner", "console write failed: {write_err}");
                    }
                }
            }
        }

        tracing::info!(
            target: "suite_runner::runner",
            root = root.name(),
            tests = runner.admitted_count(root),
            repeat = self.options.repeat,
            "starting run"
        );
        let _ = runner.run(root, &mut result);
        result.flush_listeners();

        // Report failures are logged; the result stands.
        if let Err(e) = self.generate_reports(&result) {
            tracing::warn!(target: "suite_runner::coverage", "coverage reports failed: {e}");
        }

        let status = ExitStatus::from_result(&result, &self.options);
        tracing::info!(
            target: "suite_runner::runner",
            tests = result.run_count(),
            stopped_early = result.stopped_early(),
            status = status.code(),
            "run finished"
        );
        Ok(RunReport { result, status })
    }

    fn generate_reports(&mut self, result: &TestResult) -> Result<()> {
        let targets = &self.options.coverage_reports;
        if targets.is_empty() {
            return Ok(());
        }
        let Some(coverage) = result.coverage() else {
            writeln!(self.out, "\nNo code coverage driver available, skipping coverage reports")?;
            return Ok(());
        };

        let failed = self
            .reports
            .generate(coverage, targets, &self.options.thresholds, &mut self.out)?;
        if failed > 0 {
            tracing::warn!(target: "suite_runner::coverage", failed, "some coverage reports failed");
        }
        self.out.flush()?;
        Ok(())
    }
}
