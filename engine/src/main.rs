//! Automation CLI entrypoint.
//!
//! Parses arguments, runs one engine operation against the project root, and
//! reports the outcome: the human report on stderr, `layout --json` on stdout.

use automation_common::logging;
use automation_engine::cli::Cli;
use automation_engine::engine::{Engine, OperationResult, Status};
use automation_engine::error::{AutomationError, Result};
use automation_engine::output::{format_human, format_layout_human, format_layout_json};
use automation_engine::tools::SystemCommandExecutor;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::{self, Write};

fn main() {
    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbosity, cli.quiet));

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<OperationResult> {
    let root = project_root(cli.project_dir.clone())?;
    let executor = SystemCommandExecutor;
    let result = Engine::new(root, &executor).run(&cli.command.operation());
    report(cli, &result, stdout, stderr);
    Ok(result)
}

fn project_root(requested: Option<Utf8PathBuf>) -> Result<Utf8PathBuf> {
    if let Some(root) = requested {
        return Ok(root);
    }
    let cwd = std::env::current_dir().map_err(|source| AutomationError::Io {
        path: Utf8PathBuf::from("."),
        source,
    })?;
    Utf8PathBuf::try_from(cwd).map_err(|e| AutomationError::Layout {
        reason: format!("current directory is not valid UTF-8: {e}"),
    })
}

fn report(cli: &Cli, result: &OperationResult, stdout: &mut dyn Write, stderr: &mut dyn Write) {
    if let Some(layout) = &result.layout {
        if cli.command.wants_json() {
            if writeln!(stdout, "{}", format_layout_json(layout)).is_err() {
                // Best-effort output; ignore write failures.
            }
        } else {
            write_stderr_line(stderr, format_layout_human(layout).trim_end());
        }
    }

    let quiet_success = cli.quiet && result.status == Status::Success;
    if !quiet_success {
        write_stderr_line(stderr, format_human(result, cli.verbosity > 0).trim_end());
    }
}

fn exit_code_for_run_result(result: Result<OperationResult>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(result) => result.exit_code(),
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
