use super::{CoverageDriver, CoverageSnapshot, LineStatus};
use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Coverage driver for tests that write an LCOV tracefile themselves.
///
/// Before each test the tracefile is removed; after the test whatever the
/// test wrote there is parsed. `DA:<line>,<count>` records become executed
/// (count > 0) or not-executed lines of the preceding `SF:` file. A test that
/// writes no tracefile contributes nothing.
#[derive(Debug, Clone)]
pub struct LcovFileDriver {
    path: PathBuf,
}

impl LcovFileDriver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CoverageDriver for LcovFileDriver {
    fn name(&self) -> &str {
        "lcov-file"
    }

    fn is_available(&self) -> bool {
        self.path
            .parent()
            .is_none_or(|dir| dir.as_os_str().is_empty() || dir.is_dir())
    }

    fn start(&mut self, _test_id: &str) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn stop(&mut self) -> Result<CoverageSnapshot> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_lcov(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CoverageSnapshot::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse the line records of an LCOV tracefile.
pub(crate) fn parse_lcov(content: &str) -> Result<CoverageSnapshot> {
    let mut snapshot = CoverageSnapshot::new();
    let mut current: Option<PathBuf> = None;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if let Some(file) = line.strip_prefix("SF:") {
            current = Some(PathBuf::from(file));
        } else if let Some(record) = line.strip_prefix("DA:") {
            let file = current.as_ref().ok_or_else(|| {
                Error::coverage(format!("line {}: DA record outside of a SF block", index + 1))
            })?;
            let mut fields = record.split(',');
            let line_no = fields.next().and_then(|f| f.parse::<u32>().ok());
            let count = fields.next().and_then(|f| f.parse::<u64>().ok());
            match (line_no, count) {
                (Some(line_no), Some(count)) => {
                    let status = if count > 0 {
                        LineStatus::Executed
                    } else {
                        LineStatus::NotExecuted
                    };
                    snapshot.record(file.clone(), line_no, status);
                }
                _ => {
                    return Err(Error::coverage(format!(
                        "line {}: malformed DA record '{}'",
                        index + 1,
                        record
                    )));
                }
            }
        } else if line == "end_of_record" {
            current = None;
        }
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lcov_records() {
        let snapshot = parse_lcov(
            "TN:\nSF:src/lib.rs\nDA:1,3\nDA:2,0\nLF:2\nLH:1\nend_of_record\nSF:src/util.rs\nDA:10,1\nend_of_record\n",
        )
        .unwrap();
        assert_eq!(snapshot.line(Path::new("src/lib.rs"), 1), Some(LineStatus::Executed));
        assert_eq!(snapshot.line(Path::new("src/lib.rs"), 2), Some(LineStatus::NotExecuted));
        assert_eq!(snapshot.line(Path::new("src/util.rs"), 10), Some(LineStatus::Executed));
        assert_eq!(snapshot.totals().executable, 3);
    }

    #[test]
    fn test_parse_lcov_rejects_orphan_record() {
        let err = parse_lcov("DA:1,1\n").unwrap_err();
        assert!(err.to_string().contains("outside of a SF block"));
    }

    #[test]
    fn test_parse_lcov_rejects_malformed_record() {
        assert!(parse_lcov("SF:a.rs\nDA:x,1\n").is_err());
    }

    #[test]
    fn test_driver_reads_and_clears_tracefile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.lcov");
        let mut driver = LcovFileDriver::new(&path);
        assert!(driver.is_available());

        std::fs::write(&path, "SF:stale.rs\nDA:1,1\nend_of_record\n").unwrap();
        driver.start("A::t").unwrap();
        assert!(!path.exists());
        assert!(driver.stop().unwrap().is_empty());

        driver.start("A::u").unwrap();
        std::fs::write(&path, "SF:fresh.rs\nDA:4,2\nend_of_record\n").unwrap();
        let delta = driver.stop().unwrap();
        assert_eq!(delta.line(Path::new("fresh.rs"), 4), Some(LineStatus::Executed));
    }

    #[test]
    fn test_driver_unavailable_without_directory() {
        let driver = LcovFileDriver::new("/nonexistent/dir/trace.lcov");
        assert!(!driver.is_available());
    }
}
