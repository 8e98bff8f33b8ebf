//! TOML manifests describing suites of process tests.
//!
//! ```toml
//! name = "Acceptance"
//!
//! [[suite]]
//! name = "Cli"
//! groups = ["cli"]
//!
//! [[suite.test]]
//! name = "prints_help"
//! command = ["target/debug/app", "--help"]
//! size = "small"
//! timeout = 5.0
//!
//! [[suite.test]]
//! name = "parses_numbers"
//! command = "target/debug/app parse \"$1\""
//! data-sets = [{ name = "negative", args = ["-1"] }, { args = ["0"] }]
//! ```
//!
//! Commands run with the manifest's directory as working directory. A test
//! with data sets becomes one case per data set; the data set's args are
//! appended to the command and its identifier is exported as
//! `SUITE_RUNNER_DATA_SET`.

use super::{DataSet, Size, TestCase, TestSuite};
use crate::core::error::{Error, Result};
use crate::node::TestBody;
use crate::result::Fault;
use crate::runner::process::{CommandSpec, ProcessTest};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable carrying the data set of a process test.
pub const DATA_SET_ENV: &str = "SUITE_RUNNER_DATA_SET";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Name of the root suite. Defaults to the manifest's file stem.
    pub name: Option<String>,
    #[serde(default)]
    pub suite: Vec<SuiteEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteEntry {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub test: Vec<TestEntry>,
    /// Nested suites.
    #[serde(default)]
    pub suite: Vec<SuiteEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct TestEntry {
    pub name: String,
    pub command: CommandSpec,
    pub size: Option<Size>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub covers: Vec<String>,
    #[serde(default)]
    pub todo: bool,
    /// Seconds before the process is killed.
    pub timeout: Option<f64>,
    #[serde(default)]
    pub success_exit_code: i32,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub data_sets: Vec<DataSetEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSetEntry {
    pub name: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Manifest {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::manifest(e.to_string()))
    }

    /// Build the test tree. Commands run in `base_dir`.
    pub fn into_suite(self, default_name: &str, base_dir: &Path) -> Result<TestSuite> {
        let mut root = TestSuite::new(self.name.unwrap_or_else(|| default_name.to_string()));
        for entry in self.suite {
            root.add_test(build_suite(entry, base_dir)?);
        }
        Ok(root)
    }
}

/// Load a manifest file into a suite named after the manifest (or its file
/// stem).
pub fn load_manifest(path: &Path) -> Result<TestSuite> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let manifest: Manifest = toml::from_str(&content)
        .map_err(|e| Error::manifest(format!("{}: {}", path.display(), e)))?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("manifest")
        .to_string();
    let base_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let suite = manifest.into_suite(&stem, &base_dir)?;
    tracing::debug!(target: "suite_runner::manifest", path = %path.display(), tests = suite.count(), "manifest loaded");
    Ok(suite)
}

fn build_suite(entry: SuiteEntry, base_dir: &Path) -> Result<TestSuite> {
    if entry.name.trim().is_empty() {
        return Err(Error::manifest("suite name must not be empty"));
    }
    let mut suite = TestSuite::new(&entry.name).with_groups(entry.groups);
    for test in entry.test {
        for case in build_cases(&entry.name, test, base_dir)? {
            suite.add_test(case);
        }
    }
    for nested in entry.suite {
        suite.add_test(build_suite(nested, base_dir)?);
    }
    Ok(suite)
}

fn build_cases(suite: &str, entry: TestEntry, base_dir: &Path) -> Result<Vec<TestCase>> {
    if entry.name.trim().is_empty() {
        return Err(Error::manifest(format!("test without a name in suite '{suite}'")));
    }
    let invalid = |what: &str| Error::manifest(format!("{}::{}: {}", suite, entry.name, what));

    match &entry.command {
        CommandSpec::Shell(script) if script.trim().is_empty() => return Err(invalid("empty command")),
        CommandSpec::Argv(argv) if argv.is_empty() => return Err(invalid("empty command")),
        _ => {}
    }

    let mut process = ProcessTest::new(entry.command.clone())
        .current_dir(base_dir)
        .success_exit_code(entry.success_exit_code);
    for (key, value) in &entry.env {
        process = process.env(key, value);
    }
    if let Some(secs) = entry.timeout {
        let timeout = Duration::try_from_secs_f64(secs)
            .map_err(|_| invalid(&format!("invalid timeout {secs}")))?;
        process = process.timeout(timeout);
    }

    if entry.data_sets.is_empty() {
        return Ok(vec![describe(TestCase::with_factory(&entry.name, factory(process)), &entry)]);
    }

    let cases = entry
        .data_sets
        .iter()
        .enumerate()
        .map(|(index, data_set)| {
            let (id, value) = match &data_set.name {
                Some(name) => (DataSet::Named(name.clone()), name.clone()),
                None => (DataSet::Index(index), index.to_string()),
            };
            let body = process
                .clone()
                .args(data_set.args.iter().cloned())
                .env(DATA_SET_ENV, value);
            describe(TestCase::with_factory(&entry.name, factory(body)), &entry).data_set(id)
        })
        .collect();
    Ok(cases)
}

fn factory(process: ProcessTest) -> impl Fn() -> std::result::Result<Box<dyn TestBody>, Fault> {
    move || Ok(Box::new(process.clone()) as Box<dyn TestBody>)
}

fn describe(mut case: TestCase, entry: &TestEntry) -> TestCase {
    case = case.groups(entry.groups.iter().cloned()).covers(entry.covers.iter().cloned());
    if let Some(size) = entry.size {
        case = case.size(size);
    }
    if entry.todo {
        case = case.todo();
    }
    case
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TestInfo;

    const MANIFEST: &str = r#"
        name = "Acceptance"

        [[suite]]
        name = "Cli"
        groups = ["cli"]

        [[suite.test]]
        name = "help"
        command = ["app", "--help"]
        size = "small"
        covers = ["cli::help"]
        timeout = 1.5

        [[suite.test]]
        name = "parse"
        command = "app parse $1"
        groups = ["parser"]
        data-sets = [{ name = "negative", args = ["-1"] }, { args = ["0"] }]

        [[suite.suite]]
        name = "Nested"

        [[suite.suite.test]]
        name = "todo"
        command = "true"
        todo = true
    "#;

    fn cases(suite: &TestSuite) -> Vec<TestInfo> {
        let mut infos = Vec::new();
        for child in suite.tests() {
            child.for_each_case(&mut |case| infos.push(case.info().clone()));
        }
        infos
    }

    #[test]
    fn test_manifest_builds_tree() {
        let suite = Manifest::from_toml_str(MANIFEST)
            .unwrap()
            .into_suite("fallback", Path::new("."))
            .unwrap();
        assert_eq!(suite.name(), "Acceptance");
        assert_eq!(suite.count(), 4);

        let infos = cases(&suite);
        assert_eq!(infos[0].qualified_name(), "Cli::help");
        assert_eq!(infos[0].size, Some(Size::Small));
        assert!(infos[0].groups.contains("cli"));
        assert_eq!(infos[0].covers, vec!["cli::help".to_string()]);

        assert_eq!(infos[1].display_name(), "Cli::parse with data set \"negative\"");
        assert_eq!(infos[2].display_name(), "Cli::parse with data set #1");
        assert!(infos[2].groups.contains("parser"));
        assert!(infos[2].groups.contains("cli"));

        assert_eq!(infos[3].qualified_name(), "Nested::todo");
        assert!(infos[3].todo);
        assert!(infos[3].groups.contains("cli"));
    }

    #[test]
    fn test_manifest_rejects_unknown_fields() {
        let err = Manifest::from_toml_str("[[suite]]\nname = \"A\"\ncolour = 1\n").unwrap_err();
        assert!(err.to_string().contains("Manifest error"));
    }

    #[test]
    fn test_manifest_rejects_empty_command() {
        let manifest = Manifest::from_toml_str(
            "[[suite]]\nname = \"A\"\n[[suite.test]]\nname = \"t\"\ncommand = []\n",
        )
        .unwrap();
        let err = manifest.into_suite("m", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("A::t: empty command"));
    }

    #[test]
    fn test_manifest_rejects_negative_timeout() {
        let manifest = Manifest::from_toml_str(
            "[[suite]]\nname = \"A\"\n[[suite.test]]\nname = \"t\"\ncommand = \"true\"\ntimeout = -1.0\n",
        )
        .unwrap();
        assert!(manifest.into_suite("m", Path::new(".")).is_err());
    }

    #[test]
    fn test_load_manifest_uses_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smoke.toml");
        std::fs::write(&path, "[[suite]]\nname = \"A\"\n[[suite.test]]\nname = \"t\"\ncommand = \"true\"\n").unwrap();

        let suite = load_manifest(&path).unwrap();
        assert_eq!(suite.name(), "smoke");
        assert_eq!(suite.count(), 1);
    }

    #[test]
    fn test_load_manifest_missing_file() {
        let err = load_manifest(Path::new("/nonexistent/tests.toml")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
