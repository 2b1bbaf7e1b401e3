//! Error types for the automation engine.
//!
//! Every variant names the file, environment, or tool it concerns so the
//! final report can tell a user exactly what failed and where. Per-file
//! variants (`Install`, `Rename`) are collected into [`PathFailure`] lists
//! rather than aborting a batch.

use automation_common::{ConfigError, OsTagError};
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Errors that can occur while running an automation operation.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The working directory is not a usable template project.
    #[error("invalid project layout: {reason}")]
    Layout {
        /// Description of the missing or ambiguous element.
        reason: String,
    },

    /// A single artifact could not be installed at its destination.
    #[error("failed to install {path}: {reason}")]
    Install {
        /// Destination path of the failed artifact.
        path: Utf8PathBuf,
        /// Description of the underlying failure.
        reason: String,
    },

    /// An environment could not be exported.
    #[error("failed to export environment {environment}: {reason}")]
    Export {
        /// Name of the environment being exported.
        environment: String,
        /// Description of the failure.
        reason: String,
    },

    /// A descriptor could not be renamed.
    #[error("failed to rename {path}: {reason}")]
    Rename {
        /// Descriptor that was left untouched.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// No usable descriptor exists for the requested import.
    #[error("failed to import environment: {reason}")]
    Import {
        /// Description of the failure.
        reason: String,
    },

    /// An external tool could not be run or exited unsuccessfully.
    #[error("{tool} failed ({}): {output}", describe_exit_code(.code))]
    ExternalTool {
        /// Program that was invoked.
        tool: String,
        /// Process exit code, when the process ran to completion.
        code: Option<i32>,
        /// Tail of the captured output.
        output: String,
    },

    /// The `.pypirc` token store is unusable.
    #[error("PyPI token error at {path}: {reason}")]
    Token {
        /// Path of the `.pypirc` file.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {path}")]
    Io {
        /// Path the operation targeted.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A YAML document could not be parsed or written.
    #[error("invalid YAML in {path}: {reason}")]
    Yaml {
        /// Path of the document.
        path: Utf8PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl AutomationError {
    /// Returns a closure wrapping an I/O error with the path it concerns.
    ///
    /// ```
    /// use automation_engine::error::AutomationError;
    /// use camino::Utf8Path;
    ///
    /// let err = std::fs::read("/definitely/missing")
    ///     .map_err(AutomationError::io_at(Utf8Path::new("/definitely/missing")))
    ///     .expect_err("file does not exist");
    /// assert!(err.to_string().contains("/definitely/missing"));
    /// ```
    pub fn io_at(path: &Utf8Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

impl From<ConfigError> for AutomationError {
    fn from(err: ConfigError) -> Self {
        Self::Layout {
            reason: err.to_string(),
        }
    }
}

impl From<OsTagError> for AutomationError {
    fn from(err: OsTagError) -> Self {
        Self::Layout {
            reason: err.to_string(),
        }
    }
}

fn describe_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "did not run to completion".to_owned(),
    }
}

/// A per-path failure recorded while a batch continues.
#[derive(Debug)]
pub struct PathFailure {
    /// Path the failure concerns.
    pub path: Utf8PathBuf,
    /// What went wrong.
    pub error: AutomationError,
}

/// Result type alias using [`AutomationError`].
pub type Result<T> = std::result::Result<T, AutomationError>;
