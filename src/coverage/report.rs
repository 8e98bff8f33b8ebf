use super::{CoverageSnapshot, LineStatus};
use crate::core::error::{Error, Result};
use crate::util::{create_output_file, xml};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Path that sends a report to the console instead of a file.
pub const CONSOLE_TARGET: &str = "-";

/// Coverage report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Clover,
    Crap4j,
    Html,
    Text,
    Xml,
}

impl ReportKind {
    /// Format name as printed in progress lines.
    pub fn label(self) -> &'static str {
        match self {
            ReportKind::Clover => "Clover XML",
            ReportKind::Crap4j => "Crap4J XML",
            ReportKind::Html => "HTML",
            ReportKind::Text => "text",
            ReportKind::Xml => "XML",
        }
    }
}

/// A requested report: format plus destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTarget {
    pub kind: ReportKind,
    /// Output path; `-` writes to the console.
    pub path: PathBuf,
}

impl ReportTarget {
    pub fn new(kind: ReportKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    fn is_console(&self) -> bool {
        self.path.as_os_str() == CONSOLE_TARGET
    }
}

/// Percentage bands used to color or label coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportThresholds {
    /// Coverage below this is "low".
    pub low_upper_bound: u8,
    /// Coverage at or above this is "high".
    pub high_lower_bound: u8,
    pub crap4j_threshold: u32,
}

impl Default for ReportThresholds {
    fn default() -> Self {
        Self {
            low_upper_bound: 50,
            high_lower_bound: 90,
            crap4j_threshold: 30,
        }
    }
}

/// Coverage band of a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageBand {
    Low,
    Medium,
    High,
}

impl CoverageBand {
    pub fn as_str(self) -> &'static str {
        match self {
            CoverageBand::Low => "low",
            CoverageBand::Medium => "medium",
            CoverageBand::High => "high",
        }
    }
}

impl ReportThresholds {
    pub fn band(&self, percent: f64) -> CoverageBand {
        if percent < f64::from(self.low_upper_bound) {
            CoverageBand::Low
        } else if percent >= f64::from(self.high_lower_bound) {
            CoverageBand::High
        } else {
            CoverageBand::Medium
        }
    }
}

/// Renders a [`CoverageSnapshot`] in one report format.
pub trait ReportWriter {
    /// Format this writer produces.
    fn kind(&self) -> ReportKind;

    /// Render the report into `out`.
    fn write(
        &self,
        coverage: &CoverageSnapshot,
        thresholds: &ReportThresholds,
        out: &mut dyn Write,
    ) -> Result<()>;
}

/// Plain-text summary with per-file line coverage.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextReport;

impl ReportWriter for TextReport {
    fn kind(&self) -> ReportKind {
        ReportKind::Text
    }

    fn write(
        &self,
        coverage: &CoverageSnapshot,
        thresholds: &ReportThresholds,
        out: &mut dyn Write,
    ) -> Result<()> {
        let totals = coverage.totals();
        writeln!(out)?;
        writeln!(out, "Code Coverage Report:")?;
        writeln!(out)?;
        writeln!(out, " Summary:")?;
        writeln!(
            out,
            "  Lines:  {:6.2}% ({}/{}) [{}]",
            totals.percent(),
            totals.executed,
            totals.executable,
            thresholds.band(totals.percent()).as_str()
        )?;
        writeln!(out)?;

        for (path, _) in coverage.files() {
            let counts = coverage.file_counts(path);
            if counts.executable == 0 {
                continue;
            }
            writeln!(out, "{}", path.display())?;
            writeln!(
                out,
                "  Lines:  {:6.2}% ({:>3}/{:>3}) [{}]",
                counts.percent(),
                counts.executed,
                counts.executable,
                thresholds.band(counts.percent()).as_str()
            )?;
        }
        Ok(())
    }
}

/// Clover XML report.
#[derive(Debug, Default, Clone, Copy)]
pub struct CloverReport;

impl ReportWriter for CloverReport {
    fn kind(&self) -> ReportKind {
        ReportKind::Clover
    }

    fn write(
        &self,
        coverage: &CoverageSnapshot,
        _thresholds: &ReportThresholds,
        out: &mut dyn Write,
    ) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(out, "<coverage generated=\"{timestamp}\">")?;
        writeln!(out, "  <project timestamp=\"{timestamp}\">")?;

        let mut files = 0usize;
        let mut loc = 0usize;
        for (path, lines) in coverage.files() {
            files += 1;
            let counts = coverage.file_counts(path);
            let file_loc = lines.keys().next_back().copied().unwrap_or(0) as usize;
            loc += file_loc;

            writeln!(out, "    <file name=\"{}\">", xml::escape(&path.display().to_string()))?;
            for (line, status) in lines {
                let count = match status {
                    LineStatus::Executed => 1,
                    LineStatus::NotExecuted => 0,
                    LineStatus::NotExecutable => continue,
                };
                writeln!(out, "      <line num=\"{line}\" type=\"stmt\" count=\"{count}\"/>")?;
            }
            writeln!(
                out,
                "      <metrics loc=\"{file_loc}\" ncloc=\"{file_loc}\" statements=\"{}\" coveredstatements=\"{}\" elements=\"{}\" coveredelements=\"{}\"/>",
                counts.executable, counts.executed, counts.executable, counts.executed
            )?;
            writeln!(out, "    </file>")?;
        }

        let totals = coverage.totals();
        writeln!(
            out,
            "    <metrics files=\"{files}\" loc=\"{loc}\" ncloc=\"{loc}\" statements=\"{}\" coveredstatements=\"{}\" elements=\"{}\" coveredelements=\"{}\"/>",
            totals.executable, totals.executed, totals.executable, totals.executed
        )?;
        writeln!(out, "  </project>")?;
        writeln!(out, "</coverage>")?;
        Ok(())
    }
}

/// Registered report writers, one per kind.
pub struct ReportSet {
    writers: HashMap<ReportKind, Box<dyn ReportWriter>>,
}

impl Default for ReportSet {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ReportSet {
    /// A set with no writers.
    pub fn empty() -> Self {
        Self {
            writers: HashMap::new(),
        }
    }

    /// A set with the built-in text and Clover writers.
    pub fn with_builtin() -> Self {
        let mut set = Self::empty();
        set.register(TextReport);
        set.register(CloverReport);
        set
    }

    /// Register a writer, replacing any writer for the same kind.
    pub fn register<W: ReportWriter + 'static>(&mut self, writer: W) {
        self.writers.insert(writer.kind(), Box::new(writer));
    }

    /// Generate every requested report in order, printing one progress line
    /// per target to `console`. A failing target does not stop the others.
    ///
    /// Returns the number of reports that failed.
    pub fn generate(
        &self,
        coverage: &CoverageSnapshot,
        targets: &[ReportTarget],
        thresholds: &ReportThresholds,
        console: &mut dyn Write,
    ) -> std::io::Result<usize> {
        let mut failed = 0;
        for target in targets {
            if target.is_console() {
                if let Err(e) = self.write_one(coverage, target, thresholds, console) {
                    failed += 1;
                    writeln!(console, "\nGenerating {} report ... failed: {}", target.kind.label(), e)?;
                }
                continue;
            }

            write!(
                console,
                "\nGenerating {} report in {} ...",
                target.kind.label(),
                target.path.display()
            )?;
            match self.write_to_file(coverage, target, thresholds) {
                Ok(()) => writeln!(console, " done")?,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(target: "suite_runner::coverage", kind = ?target.kind, "report failed: {e}");
                    writeln!(console, " failed: {e}")?;
                }
            }
        }
        Ok(failed)
    }

    fn writer(&self, kind: ReportKind) -> Result<&dyn ReportWriter> {
        self.writers
            .get(&kind)
            .map(|w| w.as_ref())
            .ok_or_else(|| Error::report(format!("no writer registered for {} reports", kind.label())))
    }

    fn write_one(
        &self,
        coverage: &CoverageSnapshot,
        target: &ReportTarget,
        thresholds: &ReportThresholds,
        out: &mut dyn Write,
    ) -> Result<()> {
        self.writer(target.kind)?.write(coverage, thresholds, out)
    }

    fn write_to_file(
        &self,
        coverage: &CoverageSnapshot,
        target: &ReportTarget,
        thresholds: &ReportThresholds,
    ) -> Result<()> {
        let writer = self.writer(target.kind)?;
        let mut file = create_output_file(&target.path)?;
        writer.write(coverage, thresholds, &mut file)?;
        file.flush()?;
        Ok(())
    }

    /// Whether a writer is registered for `kind`.
    pub fn supports(&self, kind: ReportKind) -> bool {
        self.writers.contains_key(&kind)
    }
}
