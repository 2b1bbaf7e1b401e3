//! External tool invocation.
//!
//! Every subprocess (conda/mamba, stubgen) is run through the
//! [`CommandExecutor`] seam so operations can be exercised without the tools
//! installed. Failures surface the exit code plus the tail of the captured
//! output.

use crate::error::{AutomationError, Result};
use std::process::{Command, Output};

/// Number of trailing output lines kept in [`AutomationError::ExternalTool`].
pub const OUTPUT_TAIL_LINES: usize = 20;

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::ExternalTool`] when the command cannot be
    /// spawned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use automation_engine::tools::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("conda", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), automation_engine::error::AutomationError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        log::debug!("running {cmd} {}", args.join(" "));
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(|err| AutomationError::ExternalTool {
                tool: cmd.to_owned(),
                code: None,
                output: err.to_string(),
            })
    }
}

/// Runs a command and converts a non-zero exit into an error.
///
/// # Errors
///
/// Returns [`AutomationError::ExternalTool`] when the command cannot be
/// spawned or exits unsuccessfully.
pub fn run_checked(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> Result<Output> {
    let output = executor.run(cmd, args)?;
    if output.status.success() {
        return Ok(output);
    }
    Err(AutomationError::ExternalTool {
        tool: cmd.to_owned(),
        code: output.status.code(),
        output: output_tail(&output),
    })
}

/// Returns the last [`OUTPUT_TAIL_LINES`] lines of stderr, or of stdout when
/// stderr is empty.
#[must_use]
pub fn output_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines.get(start..).unwrap_or_default().join("\n")
}

/// The conda-compatible engine used for environment commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondaEngine {
    /// `mamba`, preferred when available.
    Mamba,
    /// `conda`.
    Conda,
}

impl CondaEngine {
    /// Returns the executable name.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Mamba => "mamba",
            Self::Conda => "conda",
        }
    }

    /// Picks the fastest engine that responds to `--version`.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::ExternalTool`] when neither `mamba` nor
    /// `conda` can be run.
    pub fn detect(executor: &dyn CommandExecutor) -> Result<Self> {
        for engine in [Self::Mamba, Self::Conda] {
            match executor.run(engine.program(), &["--version"]) {
                Ok(output) if output.status.success() => {
                    log::debug!("using {} for environment commands", engine.program());
                    return Ok(engine);
                }
                _ => log::trace!("{} is not available", engine.program()),
            }
        }
        Err(AutomationError::ExternalTool {
            tool: "conda".to_owned(),
            code: None,
            output: "neither mamba nor conda could be run; is conda installed and on PATH?"
                .to_owned(),
        })
    }
}

/// Lists the names of existing conda environments.
///
/// Parses the JSON emitted by `{engine} env list --json`; each entry is an
/// environment prefix whose final component is the environment name.
///
/// # Errors
///
/// Returns [`AutomationError::ExternalTool`] when the command fails or prints
/// something other than the expected JSON.
pub fn list_environments(
    executor: &dyn CommandExecutor,
    engine: CondaEngine,
) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct EnvList {
        envs: Vec<String>,
    }

    let output = run_checked(executor, engine.program(), &["env", "list", "--json"])?;
    let parsed: EnvList =
        serde_json::from_slice(&output.stdout).map_err(|err| AutomationError::ExternalTool {
            tool: engine.program().to_owned(),
            code: output.status.code(),
            output: format!("unexpected `env list --json` output: {err}"),
        })?;

    Ok(parsed
        .envs
        .iter()
        .filter_map(|prefix| {
            prefix
                .rsplit(['/', '\\'])
                .find(|segment| !segment.is_empty())
                .map(str::to_owned)
        })
        .collect())
}
