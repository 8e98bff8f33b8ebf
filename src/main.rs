//! `suite-runner` command line: runs the process tests of a manifest.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::exit;
use suite_runner::config::{ColorMode, Config, ConfigLoader};
use suite_runner::coverage::{ReportKind, ReportTarget};
use suite_runner::filter::FilterChain;
use suite_runner::node::manifest::load_manifest;
use suite_runner::{ExitStatus, Result, SuiteRunnerBuilder, TestNode};
use tracing_subscriber::EnvFilter;

/// Default standalone configuration file, read when present.
const DEFAULT_CONFIG_FILE: &str = "suite-runner.toml";

#[derive(Parser, Debug)]
#[command(name = "suite-runner")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a manifest of test suites and report their outcomes")]
struct Cli {
    /// Test manifest (TOML)
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,

    /// Configuration file (defaults to ./suite-runner.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not read [package.metadata.suite-runner] from Cargo.toml
    #[arg(long)]
    no_metadata: bool,

    /// Only run tests whose name matches the pattern
    #[arg(long, value_name = "PATTERN")]
    filter: Option<String>,

    /// Only run tests from the given groups
    #[arg(long = "group", value_name = "GROUP", value_delimiter = ',')]
    groups: Vec<String>,

    /// Exclude tests from the given groups
    #[arg(long = "exclude-group", value_name = "GROUP", value_delimiter = ',')]
    exclude_groups: Vec<String>,

    /// Run the test tree this many times
    #[arg(long, value_name = "N")]
    repeat: Option<usize>,

    /// List the selected tests without running them
    #[arg(long)]
    list_tests: bool,

    /// Stop after the first error
    #[arg(long)]
    stop_on_error: bool,

    /// Stop after the first failure
    #[arg(long)]
    stop_on_failure: bool,

    /// Stop after the first warning
    #[arg(long)]
    stop_on_warning: bool,

    /// Stop after the first risky test
    #[arg(long)]
    stop_on_risky: bool,

    /// Stop after the first skipped test
    #[arg(long)]
    stop_on_skipped: bool,

    /// Stop after the first incomplete test
    #[arg(long)]
    stop_on_incomplete: bool,

    /// Stop after the first error, failure, warning or risky test
    #[arg(long)]
    stop_on_defect: bool,

    /// Exit with failure when risky tests were found
    #[arg(long)]
    fail_on_risky: bool,

    /// Exit with failure when warnings were raised
    #[arg(long)]
    fail_on_warning: bool,

    /// Report tests that perform no assertions as risky
    #[arg(long)]
    report_useless_tests: bool,

    /// Report tests that declare no covered code as risky
    #[arg(long)]
    strict_coverage: bool,

    /// Report tests that produce output as risky
    #[arg(long)]
    disallow_test_output: bool,

    /// Report tests marked as todo as risky
    #[arg(long)]
    disallow_todo_tests: bool,

    /// Report sized tests that exceed their time limit as risky
    #[arg(long)]
    enforce_time_limit: bool,

    /// Use colors in output (auto, always, never)
    #[arg(long, value_name = "WHEN")]
    colors: Option<String>,

    /// Width of the progress output
    #[arg(long, value_name = "N")]
    columns: Option<usize>,

    /// Print more details and enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Log events as JSON to a file
    #[arg(long, value_name = "FILE")]
    log_json: Option<PathBuf>,

    /// Log results in JUnit XML format to a file
    #[arg(long, value_name = "FILE")]
    log_junit: Option<PathBuf>,

    /// LCOV tracefile written by the tests, read after each test
    #[arg(long, value_name = "FILE")]
    lcov_file: Option<PathBuf>,

    /// Generate a text coverage report (`-` for the console)
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "-")]
    coverage_text: Option<PathBuf>,

    /// Generate a Clover XML coverage report
    #[arg(long, value_name = "FILE")]
    coverage_clover: Option<PathBuf>,
}

impl Cli {
    /// Load the layered configuration and apply the command line on top.
    fn config(&self) -> Result<Config> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.config_file(path);
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            loader = loader.config_file(DEFAULT_CONFIG_FILE);
        }
        if !self.no_metadata && Path::new("Cargo.toml").exists() {
            loader = loader.cargo_metadata();
        }
        let mut config = loader.load()?;
        self.apply(&mut config)?;
        Ok(config)
    }

    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(filter) = &self.filter {
            config.run.filter = Some(filter.clone());
        }
        if !self.groups.is_empty() {
            config.run.groups = self.groups.clone();
        }
        if !self.exclude_groups.is_empty() {
            config.run.exclude_groups = self.exclude_groups.clone();
        }
        if let Some(repeat) = self.repeat {
            config.run.repeat = repeat;
        }

        let stop_on = &mut config.stop_on;
        stop_on.error |= self.stop_on_error;
        stop_on.failure |= self.stop_on_failure;
        stop_on.warning |= self.stop_on_warning;
        stop_on.risky |= self.stop_on_risky;
        stop_on.skipped |= self.stop_on_skipped;
        stop_on.incomplete |= self.stop_on_incomplete;
        stop_on.defect |= self.stop_on_defect;

        config.fail_on.risky |= self.fail_on_risky;
        config.fail_on.warning |= self.fail_on_warning;
        config.strict.useless_tests |= self.report_useless_tests;
        config.strict.coverage |= self.strict_coverage;
        config.strict.output |= self.disallow_test_output;
        config.strict.todo |= self.disallow_todo_tests;
        config.timeouts.enforce |= self.enforce_time_limit;

        if let Some(colors) = &self.colors {
            config.console.colors = colors.parse::<ColorMode>()?;
        }
        if let Some(columns) = self.columns {
            config.console.columns = columns;
        }
        config.console.verbose |= self.verbose;

        if let Some(path) = &self.log_json {
            config.logging.json = Some(path.clone());
        }
        if let Some(path) = &self.log_junit {
            config.logging.junit = Some(path.clone());
        }
        if let Some(path) = &self.lcov_file {
            config.coverage.lcov_file = Some(path.clone());
        }
        if let Some(path) = &self.coverage_text {
            config.coverage.reports.push(ReportTarget::new(ReportKind::Text, path));
        }
        if let Some(path) = &self.coverage_clover {
            config.coverage.reports.push(ReportTarget::new(ReportKind::Clover, path));
        }
        Ok(())
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "suite_runner=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn list_tests(root: &TestNode, config: &Config) -> Result<()> {
    let options = config.to_run_options()?;
    let filter = FilterChain::from_options(&options)?;
    println!("Available test(s):");
    root.for_each_case(&mut |case| {
        if filter.admits(case.info()) {
            println!(" - {}", case.info().display_name());
        }
    });
    Ok(())
}

fn run(cli: &Cli) -> Result<ExitStatus> {
    let config = cli.config()?;
    let root = TestNode::from(load_manifest(&cli.manifest)?);

    if cli.list_tests {
        list_tests(&root, &config)?;
        return Ok(ExitStatus::Success);
    }

    println!("suite-runner {}\n", env!("CARGO_PKG_VERSION"));
    let report = SuiteRunnerBuilder::new().with_config(config).run(&root)?;
    Ok(report.status)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(status) => exit(status.code()),
        Err(e) => {
            eprintln!("error: {e}");
            exit(ExitStatus::Exception.code());
        }
    }
}
