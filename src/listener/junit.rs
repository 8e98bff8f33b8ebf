use super::TestListener;
use crate::core::error::Result;
use crate::node::{SuiteInfo, TestInfo};
use crate::result::OutcomeKind;
use crate::util::{create_output_file, xml};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Default)]
struct SuiteFrame {
    name: String,
    tests: usize,
    errors: usize,
    failures: usize,
    warnings: usize,
    skipped: usize,
    time: Duration,
    body: String,
}

impl SuiteFrame {
    fn absorb(&mut self, child: &SuiteFrame) {
        self.tests += child.tests;
        self.errors += child.errors;
        self.failures += child.failures;
        self.warnings += child.warnings;
        self.skipped += child.skipped;
        self.time += child.time;
    }

    fn render(&self, depth: usize) -> String {
        let indent = "  ".repeat(depth);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{indent}<testsuite name=\"{}\" tests=\"{}\" errors=\"{}\" failures=\"{}\" warnings=\"{}\" skipped=\"{}\" time=\"{:.6}\">",
            xml::escape(&self.name),
            self.tests,
            self.errors,
            self.failures,
            self.warnings,
            self.skipped,
            self.time.as_secs_f64()
        );
        out.push_str(&self.body);
        let _ = writeln!(out, "{indent}</testsuite>");
        out
    }
}

/// Buffers the suite and case tree and writes it as JUnit XML on flush.
///
/// Incomplete, skipped and risky tests are reported as `<skipped/>`.
pub struct JunitLogger {
    out: Box<dyn Write>,
    stack: Vec<SuiteFrame>,
    /// Rendered top-level suites and suite-less cases.
    finished: String,
    pending: Option<(OutcomeKind, String)>,
}

impl JunitLogger {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out,
            stack: Vec::new(),
            finished: String::new(),
            pending: None,
        }
    }

    /// Logger writing to a file, creating parent directories.
    pub fn to_file(path: &Path) -> Result<Self> {
        let file = create_output_file(path)?;
        Ok(Self::new(Box::new(file)))
    }

    fn set_pending(&mut self, kind: OutcomeKind, message: &str) -> Result<()> {
        self.pending = Some((kind, message.to_string()));
        Ok(())
    }

    fn render_case(&self, test: &TestInfo, elapsed: Duration, kind: OutcomeKind, message: &str) -> String {
        let indent = "  ".repeat(self.stack.len() + 1);
        let mut out = String::new();
        let _ = write!(
            out,
            "{indent}<testcase name=\"{}\" classname=\"{}\" time=\"{:.6}\"",
            xml::escape(&test.name),
            xml::escape(test.owner.as_deref().unwrap_or("")),
            elapsed.as_secs_f64()
        );

        let element = match kind {
            OutcomeKind::Success => {
                out.push_str("/>\n");
                return out;
            }
            OutcomeKind::Error => "error",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Warning => "warning",
            OutcomeKind::Incomplete | OutcomeKind::Skipped | OutcomeKind::Risky => {
                let _ = writeln!(out, ">\n{indent}  <skipped message=\"{}\"/>", xml::escape(message));
                let _ = writeln!(out, "{indent}</testcase>");
                return out;
            }
        };
        let _ = writeln!(
            out,
            ">\n{indent}  <{element} type=\"{kind}\">{}</{element}>",
            xml::escape(&format!("{}\n\n{}", test.display_name(), message))
        );
        let _ = writeln!(out, "{indent}</testcase>");
        out
    }
}

impl TestListener for JunitLogger {
    fn start_suite(&mut self, suite: &SuiteInfo) -> Result<()> {
        self.stack.push(SuiteFrame {
            name: suite.name.clone(),
            ..SuiteFrame::default()
        });
        Ok(())
    }

    fn end_suite(&mut self, _suite: &SuiteInfo) -> Result<()> {
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        let rendered = frame.render(self.stack.len() + 1);
        match self.stack.last_mut() {
            Some(parent) => {
                parent.absorb(&frame);
                parent.body.push_str(&rendered);
            }
            None => self.finished.push_str(&rendered),
        }
        Ok(())
    }

    fn start_test(&mut self, _test: &TestInfo) -> Result<()> {
        self.pending = None;
        Ok(())
    }

    fn end_test(&mut self, test: &TestInfo, elapsed: Duration) -> Result<()> {
        let (kind, message) = self
            .pending
            .take()
            .unwrap_or((OutcomeKind::Success, String::new()));
        let rendered = self.render_case(test, elapsed, kind, &message);

        match self.stack.last_mut() {
            Some(frame) => {
                frame.tests += 1;
                frame.time += elapsed;
                match kind {
                    OutcomeKind::Error => frame.errors += 1,
                    OutcomeKind::Failure => frame.failures += 1,
                    OutcomeKind::Warning => frame.warnings += 1,
                    OutcomeKind::Incomplete | OutcomeKind::Skipped | OutcomeKind::Risky => {
                        frame.skipped += 1
                    }
                    OutcomeKind::Success => {}
                }
                frame.body.push_str(&rendered);
            }
            None => self.finished.push_str(&rendered),
        }
        Ok(())
    }

    fn add_error(&mut self, _: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.set_pending(OutcomeKind::Error, message)
    }

    fn add_failure(&mut self, _: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.set_pending(OutcomeKind::Failure, message)
    }

    fn add_warning(&mut self, _: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.set_pending(OutcomeKind::Warning, message)
    }

    fn add_incomplete(&mut self, _: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.set_pending(OutcomeKind::Incomplete, message)
    }

    fn add_risky(&mut self, _: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.set_pending(OutcomeKind::Risky, message)
    }

    fn add_skipped(&mut self, _: &TestInfo, message: &str, _: Duration) -> Result<()> {
        self.set_pending(OutcomeKind::Skipped, message)
    }

    fn flush(&mut self) -> Result<()> {
        // Suites left open by an aborted run are closed here.
        while !self.stack.is_empty() {
            self.end_suite(&SuiteInfo {
                name: String::new(),
                test_count: 0,
            })?;
        }

        writeln!(self.out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(self.out, "<testsuites>")?;
        self.out.write_all(self.finished.as_bytes())?;
        writeln!(self.out, "</testsuites>")?;
        self.out.flush()?;
        Ok(())
    }
}
