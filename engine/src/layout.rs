//! Project root and library discovery.
//!
//! A template project root holds the source directory, the environment
//! descriptor directory, `pyproject.toml`, and `tox.ini`. The library root is
//! the source directory itself when it is a package (extension projects) or
//! its single package subdirectory otherwise.

use crate::error::{AutomationError, Result};
use crate::tox::{RuntimeVersion, read_runtime_versions};
use automation_common::{AutomationConfig, PYPROJECT_FILE, SUPPORTED_OS_TAGS};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;

/// File name of the tox configuration.
pub const TOX_FILE: &str = "tox.ini";

/// Marker file identifying a Python package directory.
pub const PACKAGE_MARKER: &str = "__init__.py";

/// Resolved directories and supported targets for one project.
///
/// Built once per invocation by [`ProjectLayout::resolve`] and shared
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectLayout {
    root: Utf8PathBuf,
    source_dir: Utf8PathBuf,
    library_root: Utf8PathBuf,
    envs_dir: Utf8PathBuf,
    stubs_dir: Utf8PathBuf,
    dist_dir: Utf8PathBuf,
    recipe_dir: Utf8PathBuf,
    build_dir: Utf8PathBuf,
    os_tags: Vec<&'static str>,
    runtime_versions: Vec<RuntimeVersion>,
    max_search_depth: usize,
}

impl ProjectLayout {
    /// Resolves the layout of the project rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::Layout`] when `root` lacks any of the
    /// required entries, when `pyproject.toml` or `tox.ini` is malformed, or
    /// when the library package is missing or ambiguous.
    pub fn resolve(root: &Utf8Path) -> Result<Self> {
        require_files(root)?;
        let config = AutomationConfig::load(root)?;
        Self::resolve_with(root, &config)
    }

    /// Resolves the layout using an already loaded configuration.
    ///
    /// # Errors
    ///
    /// See [`ProjectLayout::resolve`].
    pub fn resolve_with(root: &Utf8Path, config: &AutomationConfig) -> Result<Self> {
        let source_dir = root.join(&config.source_dir);
        let envs_dir = root.join(&config.envs_dir);

        let missing: Vec<&Utf8Path> = [&config.source_dir, &config.envs_dir]
            .into_iter()
            .filter(|dir| !root.join(dir).is_dir())
            .map(Utf8PathBuf::as_path)
            .collect();
        if !missing.is_empty() {
            return Err(not_a_project_root(root, &missing));
        }

        let library_root = resolve_library_root(&source_dir)?;
        let runtime_versions = read_runtime_versions(&root.join(TOX_FILE))?;
        log::debug!("resolved library root {library_root}");

        Ok(Self {
            root: root.to_owned(),
            library_root,
            source_dir,
            envs_dir,
            stubs_dir: root.join(&config.stubs_dir),
            dist_dir: root.join(&config.dist_dir),
            recipe_dir: root.join(&config.recipe_dir),
            build_dir: root.join(&config.build_dir),
            os_tags: SUPPORTED_OS_TAGS.to_vec(),
            runtime_versions,
            max_search_depth: config.max_search_depth,
        })
    }

    /// Project root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Source directory (`src`).
    #[must_use]
    pub fn source_dir(&self) -> &Utf8Path {
        &self.source_dir
    }

    /// Top-level library package directory.
    #[must_use]
    pub fn library_root(&self) -> &Utf8Path {
        &self.library_root
    }

    /// Environment descriptor directory (`envs`).
    #[must_use]
    pub fn envs_dir(&self) -> &Utf8Path {
        &self.envs_dir
    }

    /// Directory `stubgen` writes into (`stubs`).
    #[must_use]
    pub fn stubs_dir(&self) -> &Utf8Path {
        &self.stubs_dir
    }

    /// Distribution directory (`dist`).
    #[must_use]
    pub fn dist_dir(&self) -> &Utf8Path {
        &self.dist_dir
    }

    /// Conda recipe directory (`recipe`).
    #[must_use]
    pub fn recipe_dir(&self) -> &Utf8Path {
        &self.recipe_dir
    }

    /// Default build tree scanned by `move-artifacts`.
    #[must_use]
    pub fn build_dir(&self) -> &Utf8Path {
        &self.build_dir
    }

    /// Supported OS tags.
    #[must_use]
    pub fn os_tags(&self) -> &[&'static str] {
        &self.os_tags
    }

    /// Runtime versions declared by the tox environment list.
    #[must_use]
    pub fn runtime_versions(&self) -> &[RuntimeVersion] {
        &self.runtime_versions
    }

    /// Maximum traversal depth for artifact discovery.
    #[must_use]
    pub fn max_search_depth(&self) -> usize {
        self.max_search_depth
    }
}

fn require_files(root: &Utf8Path) -> Result<()> {
    let missing: Vec<&Utf8Path> = [PYPROJECT_FILE, TOX_FILE]
        .into_iter()
        .map(Utf8Path::new)
        .filter(|file| !root.join(file).is_file())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(not_a_project_root(root, &missing))
    }
}

fn not_a_project_root(root: &Utf8Path, missing: &[&Utf8Path]) -> AutomationError {
    let missing: Vec<&str> = missing.iter().map(|path| path.as_str()).collect();
    AutomationError::Layout {
        reason: format!(
            "{root} is not a template project root; missing {}",
            missing.join(", ")
        ),
    }
}

/// Finds the library package under `source_dir`.
///
/// # Errors
///
/// Returns [`AutomationError::Layout`] when no package exists or when more
/// than one top-level package is found.
pub fn resolve_library_root(source_dir: &Utf8Path) -> Result<Utf8PathBuf> {
    if source_dir.join(PACKAGE_MARKER).is_file() {
        return Ok(source_dir.to_owned());
    }

    let entries = fs::read_dir(source_dir).map_err(AutomationError::io_at(source_dir))?;
    let mut packages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(AutomationError::io_at(source_dir))?;
        let Ok(path) = Utf8PathBuf::try_from(entry.path()) else {
            log::warn!("skipping non-UTF-8 entry in {source_dir}");
            continue;
        };
        if path.is_dir() && path.join(PACKAGE_MARKER).is_file() {
            packages.push(path);
        }
    }
    packages.sort();

    match packages.as_slice() {
        [] => Err(AutomationError::Layout {
            reason: format!(
                "no Python package found in {source_dir}: neither it nor any subdirectory contains {PACKAGE_MARKER}"
            ),
        }),
        [single] => Ok(single.clone()),
        many => Err(AutomationError::Layout {
            reason: format!(
                "ambiguous library root in {source_dir}; found {} packages: {}",
                many.len(),
                many.iter()
                    .filter_map(|path| path.file_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}
