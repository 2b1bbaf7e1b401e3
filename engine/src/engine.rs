//! Command engine: one operation per CLI subcommand.
//!
//! [`Engine::run`] resolves the [`ProjectLayout`], delegates to the lower
//! layers, and folds whatever happened into a single [`OperationResult`].
//! Errors never escape `run`; they become a `Failure` result carrying the
//! error that stopped the operation.

use crate::environment::{self, CondaIntrospector, ImportAction, environment_name};
use crate::error::{AutomationError, PathFailure, Result};
use crate::installer::{InstallOptions, InstallReport, Installer, Placement};
use crate::layout::ProjectLayout;
use crate::locator::{ArtifactKind, LocateFilters, Locator};
use crate::markers::{self, TYPED_MARKER};
use crate::pypirc::{self, PYPIRC_FILE, TokenStatus};
use crate::tools::{CommandExecutor, CondaEngine, list_environments, run_checked};
use automation_common::OsTag;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;

/// Program used to generate type stubs.
pub const STUBGEN: &str = "stubgen";

/// Marker identifying the package directory inside the stubs output.
pub const STUB_PACKAGE_MARKER: &str = "__init__.pyi";

/// A single engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Place generated stubs into the library tree.
    Stubs {
        /// Run `stubgen` before placing.
        generate: bool,
    },
    /// Delete every stub file from the library tree.
    PurgeStubs,
    /// Keep `py.typed` only at the library root.
    ProcessTypedMarkers,
    /// Move wheels and source distributions into the dist directory.
    MoveArtifacts {
        /// Build tree to search instead of the configured one.
        build_dir: Option<Utf8PathBuf>,
        /// OS tag to keep instead of the host's.
        os_tag: Option<OsTag>,
        /// Ignore the runtime versions listed in `tox.ini`.
        all_versions: bool,
    },
    /// Export `{base}_{os}` into the envs directory.
    ExportEnv {
        /// Environment base name.
        base_name: String,
        /// OS tag to use instead of the host's.
        os_tag: Option<OsTag>,
    },
    /// Create or update an environment from a stored descriptor.
    ImportEnv {
        /// Restrict the search to `{base}_{os}.yml`.
        base_name: Option<String>,
        /// OS tag to use instead of the host's.
        os_tag: Option<OsTag>,
        /// Report the descriptor without running conda.
        resolve_only: bool,
    },
    /// Rename a descriptor family.
    RenameEnvs {
        /// Current base name.
        old_base: String,
        /// Replacement base name.
        new_base: String,
    },
    /// Recreate an empty recipe directory.
    RecipeFolder,
    /// Validate or store the PyPI upload token.
    PypiToken {
        /// Token to store when the current one is unusable.
        token: Option<String>,
        /// Store `token` even when a valid one exists.
        replace: bool,
    },
    /// Report the resolved project layout.
    Layout,
}

impl Operation {
    /// Subcommand name of the operation.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Stubs { .. } => "stubs",
            Self::PurgeStubs => "purge-stubs",
            Self::ProcessTypedMarkers => "process-typed-markers",
            Self::MoveArtifacts { .. } => "move-artifacts",
            Self::ExportEnv { .. } => "export-env",
            Self::ImportEnv { .. } => "import-env",
            Self::RenameEnvs { .. } => "rename-envs",
            Self::RecipeFolder => "recipe-folder",
            Self::PypiToken { .. } => "pypi-token",
            Self::Layout => "layout",
        }
    }
}

/// Aggregate outcome of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Everything completed.
    Success,
    /// Some paths failed; the rest completed.
    PartialFailure,
    /// The operation stopped.
    Failure,
}

impl Status {
    /// Process exit code for this status.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::PartialFailure => 3,
            Self::Failure => 1,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "succeeded",
            Self::PartialFailure => "partially failed",
            Self::Failure => "failed",
        })
    }
}

/// What one [`Engine::run`] call did.
#[derive(Debug)]
pub struct OperationResult {
    /// Subcommand name.
    pub operation: &'static str,
    /// Aggregate status.
    pub status: Status,
    /// Paths created, replaced, moved, or deleted.
    pub affected: Vec<Utf8PathBuf>,
    /// Conditions worth reporting that did not fail anything.
    pub warnings: Vec<String>,
    /// Per-path failures.
    pub failures: Vec<PathFailure>,
    /// The error that stopped the operation, if any.
    pub error: Option<AutomationError>,
    /// One-line description of the outcome.
    pub summary: String,
    /// Resolved layout, set by [`Operation::Layout`].
    pub layout: Option<ProjectLayout>,
}

impl OperationResult {
    fn success(operation: &'static str, summary: impl Into<String>) -> Self {
        Self {
            operation,
            status: Status::Success,
            affected: Vec::new(),
            warnings: Vec::new(),
            failures: Vec::new(),
            error: None,
            summary: summary.into(),
            layout: None,
        }
    }

    fn failure(operation: &'static str, error: AutomationError) -> Self {
        log::debug!("{operation} failed: {error:?}");
        Self {
            status: Status::Failure,
            summary: error.to_string(),
            error: Some(error),
            ..Self::success(operation, String::new())
        }
    }

    fn from_install(operation: &'static str, report: InstallReport) -> Self {
        let mut result = Self::success(operation, report.summary());
        result.affected.extend(report.created);
        result.affected.extend(report.replaced);
        result.warnings.extend(
            report
                .superseded
                .iter()
                .map(|path| format!("{path} skipped; a newer file claimed its destination")),
        );
        result.record_failures(report.failures);
        result
    }

    fn record_failures(&mut self, failures: impl IntoIterator<Item = PathFailure>) {
        self.failures.extend(failures);
        if !self.failures.is_empty() && self.status == Status::Success {
            self.status = Status::PartialFailure;
        }
    }

    /// Process exit code for this result.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

/// Runs operations against one project root.
pub struct Engine<'a> {
    root: Utf8PathBuf,
    executor: &'a dyn CommandExecutor,
    host_os: Option<OsTag>,
}

impl<'a> Engine<'a> {
    /// Creates an engine for the project at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            root: root.into(),
            executor,
            host_os: None,
        }
    }

    /// Uses `os_tag` wherever the host OS tag would be detected.
    #[must_use]
    pub fn with_host_os(mut self, os_tag: OsTag) -> Self {
        self.host_os = Some(os_tag);
        self
    }

    /// Runs `operation` and reports its outcome.
    pub fn run(&self, operation: &Operation) -> OperationResult {
        let name = operation.name();
        log::info!("running {name} in {}", self.root);
        let result = ProjectLayout::resolve(&self.root)
            .and_then(|layout| self.dispatch(operation, layout));
        match result {
            Ok(result) => result,
            Err(error) => OperationResult::failure(name, error),
        }
    }

    fn dispatch(&self, operation: &Operation, layout: ProjectLayout) -> Result<OperationResult> {
        let name = operation.name();
        match operation {
            Operation::Stubs { generate } => self.stubs(name, &layout, *generate),
            Operation::PurgeStubs => purge_stubs(name, &layout),
            Operation::ProcessTypedMarkers => process_typed_markers(name, &layout),
            Operation::MoveArtifacts {
                build_dir,
                os_tag,
                all_versions,
            } => {
                let build_dir = build_dir
                    .as_deref()
                    .map_or_else(|| layout.build_dir().to_owned(), |dir| layout.root().join(dir));
                let os_tag = self.os_tag(os_tag.as_ref())?;
                move_artifacts(name, &layout, &build_dir, os_tag, *all_versions)
            }
            Operation::ExportEnv { base_name, os_tag } => {
                let os_tag = self.os_tag(os_tag.as_ref())?;
                self.export_env(name, &layout, base_name, &os_tag)
            }
            Operation::ImportEnv {
                base_name,
                os_tag,
                resolve_only,
            } => {
                let os_tag = self.os_tag(os_tag.as_ref())?;
                self.import_env(name, &layout, base_name.as_deref(), &os_tag, *resolve_only)
            }
            Operation::RenameEnvs { old_base, new_base } => {
                rename_envs(name, &layout, old_base, new_base)
            }
            Operation::RecipeFolder => recipe_folder(name, &layout),
            Operation::PypiToken { token, replace } => {
                pypi_token(name, &layout, token.as_deref(), *replace)
            }
            Operation::Layout => {
                let mut result =
                    OperationResult::success(name, format!("resolved project at {}", layout.root()));
                result.layout = Some(layout);
                Ok(result)
            }
        }
    }

    fn os_tag(&self, requested: Option<&OsTag>) -> Result<OsTag> {
        if let Some(tag) = requested.or(self.host_os.as_ref()) {
            return Ok(tag.clone());
        }
        Ok(OsTag::host()?)
    }

    fn stubs(
        &self,
        name: &'static str,
        layout: &ProjectLayout,
        generate: bool,
    ) -> Result<OperationResult> {
        let stubs_dir = layout.stubs_dir();
        let library_root = layout.library_root();
        if generate {
            log::info!("generating stubs for {library_root}");
            run_checked(
                self.executor,
                STUBGEN,
                &[
                    "-o",
                    stubs_dir.as_str(),
                    "--include-private",
                    "--include-docstrings",
                    library_root.as_str(),
                ],
            )?;
        }

        let package = stub_package(stubs_dir)?;
        let candidates = Locator::new(layout.max_search_depth()).locate(
            ArtifactKind::Stub,
            &package,
            &LocateFilters::default(),
        );
        let found = candidates.len();
        let report = Installer::new(library_root, InstallOptions::default()).install(candidates);
        let mut result = OperationResult::from_install(name, report);
        if found == 0 {
            result.warnings.push(format!("no stub files found under {package}"));
        }

        let marker_report = markers::process_typed_markers(library_root)?;
        if marker_report.created {
            result.affected.push(library_root.join(TYPED_MARKER));
        }
        result.affected.extend(marker_report.removed);

        if result.failures.is_empty() {
            match fs::remove_dir_all(stubs_dir) {
                Ok(()) => log::debug!("removed {stubs_dir}"),
                Err(source) => result.record_failures([PathFailure {
                    path: stubs_dir.to_owned(),
                    error: AutomationError::Io {
                        path: stubs_dir.to_owned(),
                        source,
                    },
                }]),
            }
        } else {
            result
                .warnings
                .push(format!("{stubs_dir} kept for inspection after failures"));
        }
        Ok(result)
    }

    fn export_env(
        &self,
        name: &'static str,
        layout: &ProjectLayout,
        base_name: &str,
        os_tag: &OsTag,
    ) -> Result<OperationResult> {
        let engine = CondaEngine::detect(self.executor)?;
        let introspector = CondaIntrospector::new(self.executor, engine);
        let exported = environment::export(layout.envs_dir(), base_name, os_tag, &introspector)?;

        let count = exported.descriptor.flat_dependencies().count();
        let mut result = OperationResult::success(
            name,
            format!(
                "exported {} with {count} dependencies",
                environment_name(base_name, os_tag)
            ),
        );
        result.affected.push(exported.descriptor_path);
        result.affected.push(exported.spec_path);
        Ok(result)
    }

    fn import_env(
        &self,
        name: &'static str,
        layout: &ProjectLayout,
        base_name: Option<&str>,
        os_tag: &OsTag,
        resolve_only: bool,
    ) -> Result<OperationResult> {
        let resolved = environment::import(layout.envs_dir(), os_tag, base_name)?;
        let summary = if resolve_only {
            format!("{} resolves to {}", resolved.environment, resolved.path)
        } else {
            let engine = CondaEngine::detect(self.executor)?;
            let existing = list_environments(self.executor, engine)?;
            let verb = match environment::apply_import(self.executor, engine, &existing, &resolved)? {
                ImportAction::Created => "created",
                ImportAction::Updated => "updated",
            };
            format!("{verb} {} from {}", resolved.environment, resolved.path)
        };
        let mut result = OperationResult::success(name, summary);
        result.affected.push(resolved.path);
        Ok(result)
    }
}

fn stub_package(stubs_dir: &Utf8Path) -> Result<Utf8PathBuf> {
    if !stubs_dir.is_dir() {
        return Err(AutomationError::Layout {
            reason: format!("stubs directory {stubs_dir} does not exist; generate stubs first"),
        });
    }

    let mut packages = Vec::new();
    for entry in fs::read_dir(stubs_dir).map_err(AutomationError::io_at(stubs_dir))? {
        let entry = entry.map_err(AutomationError::io_at(stubs_dir))?;
        let Ok(path) = Utf8PathBuf::try_from(entry.path()) else {
            log::warn!("skipping non-UTF-8 entry in {stubs_dir}");
            continue;
        };
        if path.join(STUB_PACKAGE_MARKER).is_file() {
            packages.push(path);
        }
    }

    match <[Utf8PathBuf; 1]>::try_from(packages) {
        Ok([package]) => Ok(package),
        Err(packages) => Err(AutomationError::Layout {
            reason: format!(
                "expected exactly one stub package in {stubs_dir}, found {}",
                packages.len()
            ),
        }),
    }
}

fn purge_stubs(name: &'static str, layout: &ProjectLayout) -> Result<OperationResult> {
    let report = markers::purge_stubs(layout.library_root())?;
    let mut result =
        OperationResult::success(name, format!("removed {} stub files", report.removed.len()));
    result.affected = report.removed;
    result.record_failures(report.failures);
    Ok(result)
}

fn process_typed_markers(name: &'static str, layout: &ProjectLayout) -> Result<OperationResult> {
    let library_root = layout.library_root();
    let report = markers::process_typed_markers(library_root)?;
    let root_state = if report.created { "created" } else { "kept" };
    let mut result = OperationResult::success(
        name,
        format!(
            "{root_state} root marker, removed {} nested markers",
            report.removed.len()
        ),
    );
    if report.created {
        result.affected.push(library_root.join(TYPED_MARKER));
    }
    result.affected.extend(report.removed);
    Ok(result)
}

fn move_artifacts(
    name: &'static str,
    layout: &ProjectLayout,
    build_dir: &Utf8Path,
    os_tag: OsTag,
    all_versions: bool,
) -> Result<OperationResult> {
    if !build_dir.is_dir() {
        return Err(AutomationError::Layout {
            reason: format!("build directory {build_dir} does not exist"),
        });
    }

    let filters = LocateFilters {
        os: Some(os_tag),
        versions: if all_versions {
            Vec::new()
        } else {
            layout.runtime_versions().to_vec()
        },
    };
    let dist_dir = layout.dist_dir();
    fs::create_dir_all(dist_dir).map_err(AutomationError::io_at(dist_dir))?;
    let dist_root = dist_dir
        .canonicalize_utf8()
        .map_err(AutomationError::io_at(dist_dir))?;

    let locator = Locator::new(layout.max_search_depth());
    let mut candidates = locator.locate(ArtifactKind::Wheel, build_dir, &filters);
    candidates.extend(locator.locate(ArtifactKind::Sdist, build_dir, &filters));
    candidates.retain(|candidate| {
        let in_dist = candidate
            .path
            .canonicalize_utf8()
            .is_ok_and(|path| path.starts_with(&dist_root));
        if in_dist {
            log::debug!("{} is already in {dist_dir}", candidate.path);
        }
        !in_dist
    });
    let found = candidates.len();

    let options = InstallOptions {
        placement: Placement::Flatten,
        remove_sources: true,
    };
    let mut result =
        OperationResult::from_install(name, Installer::new(dist_dir, options).install(candidates));
    if found == 0 {
        result
            .warnings
            .push(format!("no wheels or source distributions found under {build_dir}"));
    }
    Ok(result)
}

fn rename_envs(
    name: &'static str,
    layout: &ProjectLayout,
    old_base: &str,
    new_base: &str,
) -> Result<OperationResult> {
    let report = environment::rename(old_base, new_base, layout.envs_dir())?;
    let mut result = OperationResult::success(
        name,
        format!(
            "renamed {} files from {old_base} to {new_base}",
            report.renamed.len()
        ),
    );
    if report.renamed.is_empty() && report.failures.is_empty() && old_base != new_base {
        result
            .warnings
            .push(format!("no descriptors named {old_base}_<os> in {}", layout.envs_dir()));
    }
    result.affected = report.renamed.into_iter().map(|file| file.to).collect();
    result.record_failures(report.failures);
    Ok(result)
}

fn recipe_folder(name: &'static str, layout: &ProjectLayout) -> Result<OperationResult> {
    let recipe_dir = layout.recipe_dir();
    let existed = recipe_dir.exists();
    if existed {
        fs::remove_dir_all(recipe_dir).map_err(AutomationError::io_at(recipe_dir))?;
    }
    fs::create_dir_all(recipe_dir).map_err(AutomationError::io_at(recipe_dir))?;

    let verb = if existed { "recreated" } else { "created" };
    let mut result = OperationResult::success(name, format!("{verb} {recipe_dir}"));
    result.affected.push(recipe_dir.to_owned());
    Ok(result)
}

fn pypi_token(
    name: &'static str,
    layout: &ProjectLayout,
    token: Option<&str>,
    replace: bool,
) -> Result<OperationResult> {
    let path = layout.root().join(PYPIRC_FILE);
    let status = pypirc::ensure_token(&path, token, replace)?;
    let mut result = match status {
        TokenStatus::Existing => {
            OperationResult::success(name, format!("{path} already holds a valid token"))
        }
        TokenStatus::Written => OperationResult::success(name, format!("stored token in {path}")),
    };
    if status == TokenStatus::Written {
        result.affected.push(path);
    }
    Ok(result)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
