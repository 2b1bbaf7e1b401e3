//! Automation engine for template Python projects.
//!
//! This crate places generated type stubs, moves build artifacts, and keeps
//! conda environment descriptors in step across operating systems. It backs
//! the `automation-cli` binary and can be driven programmatically through
//! [`engine::Engine`].
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`engine`] - Operation dispatch and result aggregation
//! - [`environment`] - Environment descriptor export, rename, and import
//! - [`error`] - Error types naming the file or tool that failed
//! - [`ini`] - Minimal INI reader and writer
//! - [`installer`] - Content-aware placement of located artifacts
//! - [`layout`] - Project root and library discovery
//! - [`locator`] - Depth-bounded artifact discovery with tag filters
//! - [`markers`] - `py.typed` normalisation and stub purging
//! - [`output`] - Report formatting for the CLI
//! - [`pypirc`] - PyPI token storage
//! - [`tools`] - External command execution and conda engine selection
//! - [`tox`] - Runtime versions declared in `tox.ini`

pub mod cli;
pub mod engine;
pub mod environment;
pub mod error;
pub mod ini;
pub mod installer;
pub mod layout;
pub mod locator;
pub mod markers;
pub mod output;
pub mod pypirc;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod tools;
pub mod tox;
