//! Shared test utilities for the engine crate.

use crate::error::{AutomationError, Result};
use crate::tools::CommandExecutor;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.cast_unsigned())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    stdout_output("")
}

/// Creates a successful command `Output` carrying `stdout`.
#[must_use]
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "mamba").
    pub cmd: &'static str,
    /// The arguments to pass to the command. An argument of `"*"` matches
    /// anything, which keeps temporary paths out of expectations.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

/// A scripted implementation of `CommandExecutor` for testing.
///
/// Calls must arrive in the order they were scripted. A mismatch is returned
/// as [`AutomationError::StubMismatch`] so the operation under test reports
/// it like any other tool failure.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    received: RefCell<Vec<String>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            received: RefCell::new(Vec::new()),
        }
    }

    /// Returns every invocation seen so far, rendered as `cmd arg arg`.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        self.received.borrow().clone()
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations, still waiting for {:?}",
            self.expected.borrow().front().map(|call| call.cmd)
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        self.received
            .borrow_mut()
            .push(std::iter::once(cmd).chain(args.iter().copied()).collect::<Vec<_>>().join(" "));

        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(AutomationError::StubMismatch {
                message: format!("unexpected invocation of {cmd} {args:?}"),
            });
        };

        let args_match = call.args.len() == args.len()
            && call
                .args
                .iter()
                .zip(args)
                .all(|(expected, actual)| *expected == "*" || expected == actual);
        if call.cmd != cmd || !args_match {
            return Err(AutomationError::StubMismatch {
                message: format!(
                    "expected {} {:?}, received {cmd} {args:?}",
                    call.cmd, call.args
                ),
            });
        }

        call.result
    }
}
