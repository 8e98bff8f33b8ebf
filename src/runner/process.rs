use crate::core::context::TestContext;
use crate::node::TestBody;
use crate::result::{Fault, Outcome};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

/// Prefix of the stdout line a child uses to report its own outcome.
pub const OUTCOME_MARKER: &str = "##outcome ";

/// Exit code a child uses to report that it skipped itself.
pub const SKIP_EXIT_CODE: i32 = 77;

/// How a process test's command is given.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Run through the platform shell.
    Shell(String),
    /// Program followed by its arguments.
    Argv(Vec<String>),
}

/// A test body that runs a command in a child process.
///
/// The child passes with the success exit code, skips itself with exit code
/// 77 and fails with anything else. It may instead print a last stdout line
/// `##outcome {json}` carrying a serialized [`Outcome`]. A child that outlives
/// its timeout is killed together with its process group and reported as an
/// error. All other stdout is the
/// test's output.
#[derive(Debug, Clone)]
pub struct ProcessTest {
    command: CommandSpec,
    args: Vec<String>,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
    success_exit_code: i32,
}

impl ProcessTest {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            timeout: None,
            success_exit_code: 0,
        }
    }

    /// Extra arguments appended to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Kill the child once it has run this long.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn success_exit_code(mut self, code: i32) -> Self {
        self.success_exit_code = code;
        self
    }

    fn program(&self) -> String {
        match &self.command {
            CommandSpec::Shell(script) => script.clone(),
            CommandSpec::Argv(argv) => argv.first().cloned().unwrap_or_default(),
        }
    }

    fn build_command(&self) -> Result<Command, Fault> {
        let mut cmd = match &self.command {
            CommandSpec::Shell(script) => {
                #[cfg(unix)]
                {
                    let mut cmd = Command::new("sh");
                    // `sh` fills $0; the extra args become $1...
                    cmd.arg("-c").arg(script).arg("sh");
                    cmd
                }
                #[cfg(not(unix))]
                {
                    let mut cmd = Command::new("cmd");
                    cmd.arg("/C").arg(script);
                    cmd
                }
            }
            CommandSpec::Argv(argv) => {
                let (program, rest) = argv
                    .split_first()
                    .ok_or_else(|| Fault::error("process test has an empty command"))?;
                let mut cmd = Command::new(program);
                cmd.args(rest);
                cmd
            }
        };
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

impl TestBody for ProcessTest {
    fn run(&mut self, ctx: &mut TestContext) -> Result<(), Fault> {
        let mut cmd = self.build_command()?;
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        // The child leads its own process group so the watchdog can kill
        // everything the command started, not just the shell.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::debug!(target: "suite_runner::process", command = ?cmd, "spawning test process");
        let child = cmd
            .spawn()
            .map_err(|e| Fault::error(format!("failed to execute {}: {}", self.program(), e)))?;

        let killed = Arc::new(AtomicBool::new(false));
        let watchdog = self.timeout.map(|timeout| {
            let (done_tx, done_rx) = mpsc::channel::<()>();
            let flag = killed.clone();
            let child_id = child.id();
            let handle = std::thread::spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                    flag.store(true, Ordering::SeqCst);
                    #[cfg(unix)]
                    {
                        unsafe {
                            libc::kill(-(child_id as i32), libc::SIGKILL);
                        }
                    }
                    #[cfg(not(unix))]
                    {
                        let _ = child_id;
                    }
                }
            });
            (done_tx, handle)
        });

        let output = child.wait_with_output();

        if let Some((done_tx, handle)) = watchdog {
            let _ = done_tx.send(());
            let _ = handle.join();
        }
        let output = output
            .map_err(|e| Fault::error(format!("failed to wait for {}: {}", self.program(), e)))?;
        let was_timed_out = killed.load(Ordering::SeqCst) && killed_by_signal(&output.status);

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let (captured, reported) = split_outcome(&stdout);
        ctx.write_output(&captured);
        // The exit status check counts as one assertion.
        ctx.add_assertions(1);

        if was_timed_out {
            let limit = self.timeout.unwrap_or_default();
            return Err(Fault::error(format!(
                "process killed after exceeding its timeout of {:.3}s",
                limit.as_secs_f64()
            )));
        }

        if let Some(outcome) = reported {
            return into_result(ctx, outcome);
        }

        let code = output.status.code().unwrap_or(-1);
        if code == self.success_exit_code {
            Ok(())
        } else if code == SKIP_EXIT_CODE {
            let reason = stderr.trim();
            let reason = if reason.is_empty() {
                "skipped by the test process"
            } else {
                reason
            };
            Err(ctx.mark_skipped(reason))
        } else {
            let mut message = format!(
                "Process exited with code {code}, expected {}",
                self.success_exit_code
            );
            if !stderr.trim().is_empty() {
                message.push('\n');
                message.push_str(stderr.trim_end());
            }
            Err(Fault::assertion(message))
        }
    }
}

/// Whether the child ended by a signal rather than exiting. A child that
/// exited on its own right at the deadline is not reported as timed out.
#[cfg(unix)]
fn killed_by_signal(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn killed_by_signal(status: &std::process::ExitStatus) -> bool {
    status.code().is_none()
}

/// Split stdout into the test's own output and a reported outcome, if the
/// last non-empty line carries one.
pub(crate) fn split_outcome(stdout: &str) -> (String, Option<Outcome>) {
    let trimmed = stdout.trim_end();
    let (head, last) = match trimmed.rfind('\n') {
        Some(pos) => (&trimmed[..=pos], &trimmed[pos + 1..]),
        None => ("", trimmed),
    };

    match last.strip_prefix(OUTCOME_MARKER) {
        Some(json) => match serde_json::from_str::<Outcome>(json) {
            Ok(outcome) => (head.to_string(), Some(outcome)),
            Err(e) => {
                tracing::warn!(target: "suite_runner::process", "ignoring malformed outcome line: {e}");
                (stdout.to_string(), None)
            }
        },
        None => (stdout.to_string(), None),
    }
}

fn into_result(ctx: &mut TestContext, outcome: Outcome) -> Result<(), Fault> {
    match outcome {
        Outcome::Success => Ok(()),
        Outcome::Failure(m) => Err(Fault::assertion(m)),
        Outcome::Error(m) => Err(Fault::error(m)),
        Outcome::Warning(m) => Err(Fault::warning(m)),
        Outcome::Incomplete(m) => Err(ctx.mark_incomplete(m)),
        Outcome::Skipped(m) => Err(ctx.mark_skipped(m)),
        Outcome::Risky(m) => Err(ctx.mark_risky(m)),
    }
}
