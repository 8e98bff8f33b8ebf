//! Core types: the runner builder, the per-test context and error handling.

pub mod builder;
pub mod context;
pub mod error;

pub use builder::{RunReport, SuiteRunner, SuiteRunnerBuilder};
pub use context::TestContext;
pub use error::{Error, Result};
