//! Shared infrastructure for the template automation workspace: project
//! configuration, operating-system tags, and logging setup.

pub mod config;
pub mod logging;
pub mod os_tag;

pub use config::{AutomationConfig, CONFIG_TABLE, ConfigError, PYPROJECT_FILE};
pub use os_tag::{OsTag, OsTagError, SUPPORTED_OS_TAGS};
