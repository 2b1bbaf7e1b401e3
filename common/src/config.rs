//! Project-level configuration loaded from `pyproject.toml`.
//!
//! Template projects keep automation overrides under
//! `[tool.ataraxis-automation]`. Every key is optional and an absent table
//! yields [`AutomationConfig::default`], so projects that follow the template
//! layout verbatim never need to declare it. Unknown keys are rejected so that
//! a typo in a shared template does not silently fall back to a default.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

/// Name of the `[tool.*]` table holding automation overrides.
pub const CONFIG_TABLE: &str = "ataraxis-automation";

/// File name of the project metadata manifest.
pub const PYPROJECT_FILE: &str = "pyproject.toml";

/// Errors raised while loading [`AutomationConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The manifest could not be read from disk.
    #[error("failed to read {path}")]
    Read {
        /// Path of the manifest that could not be read.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The manifest or the automation table is malformed.
    #[error("invalid {path}: {reason}")]
    Parse {
        /// Path of the malformed manifest.
        path: Utf8PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// A value parsed correctly but is outside its permitted range.
    #[error("invalid [tool.{CONFIG_TABLE}] value for `{key}`: {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Directory conventions and traversal limits for one template project.
///
/// All directory values are relative to the project root.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct AutomationConfig {
    /// Directory holding the library package (`src`).
    pub source_dir: Utf8PathBuf,
    /// Directory holding environment descriptor files (`envs`).
    pub envs_dir: Utf8PathBuf,
    /// Directory `stubgen` writes generated stubs into (`stubs`).
    pub stubs_dir: Utf8PathBuf,
    /// Directory collecting distributable wheels and sdists (`dist`).
    pub dist_dir: Utf8PathBuf,
    /// Directory grayskull writes the conda recipe into (`recipe`).
    pub recipe_dir: Utf8PathBuf,
    /// Build tree scanned by `move-artifacts` when no override is given.
    pub build_dir: Utf8PathBuf,
    /// Maximum directory depth followed by artifact discovery.
    pub max_search_depth: usize,
}

impl AutomationConfig {
    const fn default_max_search_depth() -> usize {
        16
    }

    /// Loads the configuration from `pyproject.toml` under `project_root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the manifest cannot be read and
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`] when its contents
    /// are rejected.
    pub fn load(project_root: &Utf8Path) -> Result<Self, ConfigError> {
        let path = project_root.join(PYPROJECT_FILE);
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_pyproject(&contents).map_err(|err| match err {
            ConfigError::Parse { reason, .. } => ConfigError::Parse { path, reason },
            other => other,
        })
    }

    /// Parses the configuration from the text of a `pyproject.toml` file.
    ///
    /// # Examples
    ///
    /// ```
    /// use automation_common::AutomationConfig;
    ///
    /// let manifest = "[tool.ataraxis-automation]\nenvs-dir = \"environments\"\n";
    /// let config = AutomationConfig::from_pyproject(manifest).expect("valid manifest");
    /// assert_eq!(config.envs_dir, "environments");
    /// assert_eq!(config.source_dir, "src");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_pyproject(contents: &str) -> Result<Self, ConfigError> {
        let manifest = contents
            .parse::<toml::Table>()
            .map_err(|e| parse_error(e.to_string()))?;

        let Some(section) = manifest
            .get("tool")
            .and_then(|tool| tool.get(CONFIG_TABLE))
            .cloned()
        else {
            return Ok(Self::default());
        };

        let config: Self = section
            .try_into()
            .map_err(|e: toml::de::Error| parse_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_search_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "max-search-depth",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

fn parse_error(reason: String) -> ConfigError {
    ConfigError::Parse {
        path: Utf8PathBuf::from(PYPROJECT_FILE),
        reason,
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            source_dir: Utf8PathBuf::from("src"),
            envs_dir: Utf8PathBuf::from("envs"),
            stubs_dir: Utf8PathBuf::from("stubs"),
            dist_dir: Utf8PathBuf::from("dist"),
            recipe_dir: Utf8PathBuf::from("recipe"),
            build_dir: Utf8PathBuf::from("wheelhouse"),
            max_search_depth: Self::default_max_search_depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn missing_table_yields_defaults() {
        let manifest = "[project]\nname = \"demo\"\n";
        let config = AutomationConfig::from_pyproject(manifest).expect("valid manifest");
        assert_eq!(config, AutomationConfig::default());
    }

    #[test]
    fn overrides_are_applied_per_key() {
        let manifest = concat!(
            "[tool.ataraxis-automation]\n",
            "stubs-dir = \"typings\"\n",
            "max-search-depth = 4\n",
        );
        let config = AutomationConfig::from_pyproject(manifest).expect("valid manifest");
        assert_eq!(config.stubs_dir, "typings");
        assert_eq!(config.max_search_depth, 4);
        assert_eq!(config.dist_dir, "dist");
    }

    #[rstest]
    #[case::unknown_key("[tool.ataraxis-automation]\nsource = \"lib\"\n")]
    #[case::wrong_type("[tool.ataraxis-automation]\nmax-search-depth = \"deep\"\n")]
    #[case::broken_toml("[tool.ataraxis-automation\n")]
    fn malformed_manifests_are_rejected(#[case] manifest: &str) {
        let err = AutomationConfig::from_pyproject(manifest).expect_err("expected rejection");
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn zero_search_depth_is_invalid() {
        let manifest = "[tool.ataraxis-automation]\nmax-search-depth = 0\n";
        let err = AutomationConfig::from_pyproject(manifest).expect_err("expected rejection");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "max-search-depth",
                ..
            }
        ));
    }

    #[test]
    fn load_reports_the_manifest_path() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        std::fs::write(root.join(PYPROJECT_FILE), "[tool.ataraxis-automation]\nbogus = 1\n")
            .expect("failed to write manifest");

        let err = AutomationConfig::load(&root).expect_err("expected rejection");
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, root.join(PYPROJECT_FILE)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_fails_without_manifest() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        let err = AutomationConfig::load(&root).expect_err("expected read failure");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
