//! Classified results of a single test execution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The classified result of executing one test case.
///
/// Exactly one outcome is produced per executed case. The message carried by
/// the non-success variants is the assertion detail, error text or reason
/// given by the test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure(String),
    Error(String),
    Warning(String),
    Incomplete(String),
    Skipped(String),
    Risky(String),
}

/// Field-less tag of an [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Failure,
    Error,
    Warning,
    Incomplete,
    Skipped,
    Risky,
}

impl OutcomeKind {
    /// All kinds, in reporting order.
    pub const ALL: [OutcomeKind; 7] = [
        OutcomeKind::Success,
        OutcomeKind::Failure,
        OutcomeKind::Error,
        OutcomeKind::Warning,
        OutcomeKind::Incomplete,
        OutcomeKind::Skipped,
        OutcomeKind::Risky,
    ];

    /// Single character used by the console progress printer.
    pub fn progress_char(self) -> char {
        match self {
            OutcomeKind::Success => '.',
            OutcomeKind::Failure => 'F',
            OutcomeKind::Error => 'E',
            OutcomeKind::Warning => 'W',
            OutcomeKind::Incomplete => 'I',
            OutcomeKind::Skipped => 'S',
            OutcomeKind::Risky => 'R',
        }
    }

    /// Lowercase name, as used in config files and JSON logs.
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Error => "error",
            OutcomeKind::Warning => "warning",
            OutcomeKind::Incomplete => "incomplete",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Risky => "risky",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Outcome {
    /// The tag of this outcome.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success => OutcomeKind::Success,
            Outcome::Failure(_) => OutcomeKind::Failure,
            Outcome::Error(_) => OutcomeKind::Error,
            Outcome::Warning(_) => OutcomeKind::Warning,
            Outcome::Incomplete(_) => OutcomeKind::Incomplete,
            Outcome::Skipped(_) => OutcomeKind::Skipped,
            Outcome::Risky(_) => OutcomeKind::Risky,
        }
    }

    /// The detail message, empty for [`Outcome::Success`].
    pub fn message(&self) -> &str {
        match self {
            Outcome::Success => "",
            Outcome::Failure(m)
            | Outcome::Error(m)
            | Outcome::Warning(m)
            | Outcome::Incomplete(m)
            | Outcome::Skipped(m)
            | Outcome::Risky(m) => m,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// A fault raised by a test body, suite hook or test factory.
///
/// Test code returns `Err(Fault)` to end the current test early. The driver
/// classifies it into an [`Outcome`]: `Assertion` becomes a failure, `Error` an
/// error, and the remaining variants map onto their outcome of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Assertion(String),
    Error(String),
    Warning(String),
    Incomplete(String),
    Skipped(String),
    Risky(String),
}

impl Fault {
    pub fn assertion(msg: impl Into<String>) -> Self {
        Fault::Assertion(msg.into())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Fault::Error(msg.into())
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Fault::Warning(msg.into())
    }

    pub fn incomplete(msg: impl Into<String>) -> Self {
        Fault::Incomplete(msg.into())
    }

    pub fn skipped(msg: impl Into<String>) -> Self {
        Fault::Skipped(msg.into())
    }

    pub fn risky(msg: impl Into<String>) -> Self {
        Fault::Risky(msg.into())
    }

    /// Whether this fault is one of the explicit markers a test raises on
    /// purpose (skip, incomplete, risky).
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            Fault::Skipped(_) | Fault::Incomplete(_) | Fault::Risky(_)
        )
    }
}

impl From<Fault> for Outcome {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Assertion(m) => Outcome::Failure(m),
            Fault::Error(m) => Outcome::Error(m),
            Fault::Warning(m) => Outcome::Warning(m),
            Fault::Incomplete(m) => Outcome::Incomplete(m),
            Fault::Skipped(m) => Outcome::Skipped(m),
            Fault::Risky(m) => Outcome::Risky(m),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = Outcome::from(self.clone());
        write!(f, "{}: {}", outcome.kind(), outcome.message())
    }
}

impl From<crate::core::Error> for Fault {
    fn from(err: crate::core::Error) -> Self {
        Fault::Error(err.to_string())
    }
}
