use super::TestListener;
use crate::core::error::Result;
use crate::node::{SuiteInfo, TestInfo};
use crate::result::OutcomeKind;
use crate::util::create_output_file;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// One line of the JSON event log.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum Event<'a> {
    SuiteStart {
        suite: &'a str,
        tests: usize,
    },
    TestStart {
        suite: &'a str,
        test: String,
    },
    Test {
        suite: &'a str,
        test: String,
        status: OutcomeKind,
        time: f64,
        message: &'a str,
    },
}

/// Writes one JSON object per line for every suite start, test start and
/// finished test. Output is buffered and flushed when the run ends.
pub struct JsonLogger {
    out: Box<dyn Write>,
    /// Kind and message of the current test, set by `add_*`.
    pending: Option<(OutcomeKind, String)>,
}

impl JsonLogger {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out, pending: None }
    }

    /// Logger writing to a file, creating parent directories.
    pub fn to_file(path: &Path) -> Result<Self> {
        let file = create_output_file(path)?;
        Ok(Self::new(Box::new(file)))
    }

    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn set_pending(&mut self, kind: OutcomeKind, message: &str) -> Result<()> {
        self.pending = Some((kind, message.to_string()));
        Ok(())
    }
}

fn owner(test: &TestInfo) -> &str {
    test.owner.as_deref().unwrap_or("")
}

impl TestListener for JsonLogger {
    fn start_suite(&mut self, suite: &SuiteInfo) -> Result<()> {
        self.emit(&Event::SuiteStart {
            suite: &suite.name,
            tests: suite.test_count,
        })
    }

    fn start_test(&mut self, test: &TestInfo) -> Result<()> {
        self.pending = None;
        self.emit(&Event::TestStart {
            suite: owner(test),
            test: test.display_name(),
        })
    }

    fn end_test(&mut self, test: &TestInfo, elapsed: Duration) -> Result<()> {
        let (status, message) = self
            .pending
            .take()
            .unwrap_or((OutcomeKind::Success, String::new()));
        self.emit(&Event::Test {
            suite: owner(test),
            test: test.display_name(),
            status,
            time: elapsed.as_secs_f64(),
            message: &message,
        })
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
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn info(name: &str) -> TestInfo {
        let mut info = TestInfo::new(name);
        info.owner = Some("CalcTest".to_string());
        info
    }

    #[test]
    fn test_json_log_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/run.json");
        let mut logger = JsonLogger::to_file(&path).unwrap();

        let suite = SuiteInfo {
            name: "CalcTest".to_string(),
            test_count: 2,
        };
        logger.start_suite(&suite).unwrap();
        logger.start_test(&info("test_add")).unwrap();
        logger.end_test(&info("test_add"), Duration::from_millis(250)).unwrap();
        logger.start_test(&info("test_div")).unwrap();
        logger
            .add_failure(&info("test_div"), "1 != 2", Duration::ZERO)
            .unwrap();
        logger.end_test(&info("test_div"), Duration::ZERO).unwrap();
        logger.end_suite(&suite).unwrap();
        logger.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let events: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0]["event"], "suiteStart");
        assert_eq!(events[0]["tests"], 2);
        assert_eq!(events[1]["event"], "testStart");
        assert_eq!(events[1]["test"], "CalcTest::test_add");
        assert_eq!(events[2]["event"], "test");
        assert_eq!(events[2]["status"], "success");
        assert_eq!(events[2]["time"], 0.25);
        assert_eq!(events[4]["status"], "failure");
        assert_eq!(events[4]["message"], "1 != 2");
        assert_eq!(events[4]["suite"], "CalcTest");
    }
}
