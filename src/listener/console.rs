//! Terminal output: progress characters while the run is going, then the
//! defect lists and the summary line.

use super::TestListener;
use crate::config::{ColorMode, RunOptions};
use crate::core::error::Result;
use crate::node::{SuiteInfo, TestInfo};
use crate::result::OutcomeKind;
use std::io::{IsTerminal, Write};
use std::time::Duration;

const RED: &str = "\x1b[31;1m";
const YELLOW: &str = "\x1b[33;1m";
const OK_BANNER: &str = "\x1b[30;42m";
const WARN_BANNER: &str = "\x1b[30;43m";
const FAIL_BANNER: &str = "\x1b[37;41m";
const RESET: &str = "\x1b[0m";

/// A defect collected for the final report.
#[derive(Debug, Clone)]
struct Defect {
    name: String,
    message: String,
}

/// Console printer of progress and the final summary.
///
/// The summary is printed on `flush`, after the last test.
pub struct ResultPrinter {
    out: Box<dyn Write>,
    colors: bool,
    verbose: bool,
    columns: usize,
    /// Tests announced by the outermost suites.
    total: usize,
    /// Tests that ended so far.
    run: usize,
    column: usize,
    depth: usize,
    /// Kind reported for the current test; success unless an `add_*` arrived.
    current: OutcomeKind,
    defects: Vec<(OutcomeKind, Defect)>,
    counts: [usize; OutcomeKind::ALL.len()],
    time: Duration,
}

impl ResultPrinter {
    /// Printer writing to `out`.
    pub fn new(out: Box<dyn Write>, options: &RunOptions, colors: bool) -> Self {
        Self {
            out,
            colors,
            verbose: options.verbose,
            columns: options.columns,
            total: 0,
            run: 0,
            column: 0,
            depth: 0,
            current: OutcomeKind::Success,
            defects: Vec::new(),
            counts: [0; OutcomeKind::ALL.len()],
            time: Duration::ZERO,
        }
    }

    /// Printer writing to stdout, with colors resolved against the terminal.
    pub fn stdout(options: &RunOptions) -> Self {
        let colors = match options.colors {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        };
        Self::new(Box::new(std::io::stdout()), options, colors)
    }

    fn colorize(&self, color: &str, text: &str) -> String {
        if self.colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn record(&mut self, kind: OutcomeKind, test: &TestInfo, message: &str) {
        self.current = kind;
        self.defects.push((
            kind,
            Defect {
                name: test.display_name(),
                message: message.to_string(),
            },
        ));
    }

    /// Width of the `n / total` counters.
    fn counter_width(&self) -> usize {
        self.total.max(self.run).to_string().len()
    }

    /// Number of progress characters per line.
    fn max_column(&self) -> usize {
        // " nnn / nnn (100%)"
        let suffix = 2 * self.counter_width() + " /  (100%)".len() + 1;
        self.columns.saturating_sub(suffix).max(1)
    }

    fn write_progress(&mut self, kind: OutcomeKind) -> std::io::Result<()> {
        let c = kind.progress_char().to_string();
        let text = match kind {
            OutcomeKind::Success => c,
            OutcomeKind::Error | OutcomeKind::Failure => self.colorize(RED, &c),
            _ => self.colorize(YELLOW, &c),
        };
        write!(self.out, "{text}")?;
        self.column += 1;
        self.run += 1;

        let total = self.total.max(self.run);
        if self.column == self.max_column() || self.run == total {
            if self.run == total {
                let padding = self.max_column().saturating_sub(self.column);
                write!(self.out, "{}", " ".repeat(padding))?;
            }
            let width = self.counter_width();
            let percent = self.run * 100 / total.max(1);
            writeln!(
                self.out,
                " {:>width$} / {:>width$} ({:>3}%)",
                self.run, total, percent
            )?;
            self.column = 0;
        }
        self.out.flush()
    }

    fn print_defects(&mut self, kind: OutcomeKind, label: &str) -> std::io::Result<()> {
        let defects: Vec<&Defect> = self
            .defects
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, d)| d)
            .collect();
        if defects.is_empty() {
            return Ok(());
        }

        let (verb, noun) = if defects.len() == 1 {
            ("was", label.to_string())
        } else {
            ("were", format!("{label}s"))
        };
        writeln!(self.out, "There {} {} {}:\n", verb, defects.len(), noun)?;
        for (i, defect) in defects.iter().enumerate() {
            writeln!(self.out, "{}) {}", i + 1, defect.name)?;
            if !defect.message.is_empty() {
                writeln!(self.out, "{}", defect.message.trim_end())?;
            }
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn count(&self, kind: OutcomeKind) -> usize {
        self.counts[kind as usize]
    }

    fn print_footer(&mut self) -> std::io::Result<()> {
        let tests = self.run;
        let errors = self.count(OutcomeKind::Error);
        let failures = self.count(OutcomeKind::Failure);
        let warnings = self.count(OutcomeKind::Warning);
        let skipped = self.count(OutcomeKind::Skipped);
        let incomplete = self.count(OutcomeKind::Incomplete);
        let risky = self.count(OutcomeKind::Risky);

        if errors == 0 && failures == 0 {
            if warnings + skipped + incomplete + risky == 0 {
                let plural = if tests == 1 { "test" } else { "tests" };
                let line = self.colorize(OK_BANNER, &format!("OK ({tests} {plural})"));
                return writeln!(self.out, "{line}");
            }
            let line = self.colorize(WARN_BANNER, "OK, but incomplete, skipped, or risky tests!");
            writeln!(self.out, "{line}")?;
        } else {
            let banner = if errors > 0 { "ERRORS!" } else { "FAILURES!" };
            let line = self.colorize(FAIL_BANNER, banner);
            writeln!(self.out, "{line}")?;
        }

        let mut parts = vec![format!("Tests: {tests}")];
        for (label, count) in [
            ("Errors", errors),
            ("Failures", failures),
            ("Warnings", warnings),
            ("Skipped", skipped),
            ("Incomplete", incomplete),
            ("Risky", risky),
        ] {
            if count > 0 {
                parts.push(format!("{label}: {count}"));
            }
        }
        writeln!(self.out, "{}.", parts.join(", "))
    }

    fn print_result(&mut self) -> std::io::Result<()> {
        writeln!(self.out, "\n\nTime: {:.3}s\n", self.time.as_secs_f64())?;

        self.print_defects(OutcomeKind::Error, "error")?;
        self.print_defects(OutcomeKind::Warning, "warning")?;
        self.print_defects(OutcomeKind::Failure, "failure")?;
        if self.verbose {
            self.print_defects(OutcomeKind::Risky, "risky test")?;
            self.print_defects(OutcomeKind::Incomplete, "incomplete test")?;
            self.print_defects(OutcomeKind::Skipped, "skipped test")?;
        }

        self.print_footer()?;
        self.out.flush()
    }
}

impl TestListener for ResultPrinter {
    fn start_suite(&mut self, suite: &SuiteInfo) -> Result<()> {
        if self.depth == 0 {
            self.total += suite.test_count;
        }
        self.depth += 1;
        if self.verbose && self.depth == 1 {
            writeln!(self.out, "{} ({} tests)", suite.name, suite.test_count)?;
        }
        Ok(())
    }

    fn end_suite(&mut self, _suite: &SuiteInfo) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn start_test(&mut self, _test: &TestInfo) -> Result<()> {
        self.current = OutcomeKind::Success;
        Ok(())
    }

    fn end_test(&mut self, _test: &TestInfo, elapsed: Duration) -> Result<()> {
        let kind = self.current;
        self.counts[kind as usize] += 1;
        self.time += elapsed;
        self.write_progress(kind)?;
        Ok(())
    }

    fn add_error(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.record(OutcomeKind::Error, test, message);
        Ok(())
    }

    fn add_failure(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.record(OutcomeKind::Failure, test, message);
        Ok(())
    }

    fn add_warning(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.record(OutcomeKind::Warning, test, message);
        Ok(())
    }

    fn add_incomplete(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.record(OutcomeKind::Incomplete, test, message);
        Ok(())
    }

    fn add_risky(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.record(OutcomeKind::Risky, test, message);
        Ok(())
    }

    fn add_skipped(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.record(OutcomeKind::Skipped, test, message);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.print_result()?;
        Ok(())
    }
}
