//! Environment descriptor files.
//!
//! A descriptor is the YAML document `conda env export` produces, stored as
//! `{base}_{os}.yml` next to a flat `{base}_{os}_spec.txt` listing one
//! dependency per line. This module parses, exports, renames, and resolves
//! descriptors for import while leaving unrelated keys alone. Comments are
//! not preserved; rewritten files are regenerated from the parsed document.

use crate::error::{AutomationError, PathFailure, Result};
use crate::locator::{ArtifactKind, LocateFilters, Locator};
use crate::tools::{CommandExecutor, CondaEngine, run_checked};
use automation_common::OsTag;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

/// Top-level key holding the host install location, never written out.
const PREFIX_KEY: &str = "prefix";

/// Descriptor file extensions, in the order they are recognised.
const DESCRIPTOR_EXTENSIONS: [&str; 2] = [".yml", ".yaml"];

/// A single dependency entry such as `numpy>=1.20` or `python 3.12.*`.
///
/// The entry is written back exactly as it was read; `name` and
/// `constraint` are a split of that text for inspection only.
///
/// ```
/// use automation_engine::environment::Dependency;
///
/// let dep = Dependency::parse("numpy>=1.20");
/// assert_eq!(dep.name, "numpy");
/// assert_eq!(dep.constraint.as_deref(), Some(">=1.20"));
/// assert_eq!(dep.to_string(), "numpy>=1.20");
///
/// let spaced = Dependency::parse("python 3.12.*");
/// assert_eq!(spaced.name, "python");
/// assert_eq!(spaced.to_string(), "python 3.12.*");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Dependency {
    /// Package name.
    pub name: String,
    /// Version constraint with its operator, or the version and build
    /// fields of a space-separated spec.
    pub constraint: Option<String>,
    spec: String,
}

impl Dependency {
    /// Creates a dependency from its parts, written as `{name}{constraint}`.
    #[must_use]
    pub fn new(name: impl Into<String>, constraint: Option<&str>) -> Self {
        let name = name.into();
        let spec = format!("{name}{}", constraint.unwrap_or_default());
        Self {
            name,
            constraint: constraint.map(str::to_owned),
            spec,
        }
    }

    /// Splits `spec` at the first constraint operator or whitespace.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let (name, constraint) = match spec.find(|c: char| "<>=!~ ".contains(c)) {
            Some(at) => {
                let (name, constraint) = spec.split_at(at);
                let constraint = constraint.trim();
                (name, (!constraint.is_empty()).then(|| constraint.to_owned()))
            }
            None => (spec, None),
        };
        Self {
            name: name.to_owned(),
            constraint,
            spec: spec.to_owned(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

impl From<String> for Dependency {
    fn from(spec: String) -> Self {
        Self::parse(&spec)
    }
}

impl From<Dependency> for String {
    fn from(dep: Dependency) -> Self {
        dep.spec
    }
}

/// One element of the `dependencies` sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyEntry {
    /// A conda package.
    Package(Dependency),
    /// A nested `pip:` list.
    Pip(PipSection),
    /// Anything else, kept verbatim.
    Other(serde_yaml::Value),
}

/// A `pip:` mapping inside `dependencies`.
///
/// Mappings with any other key are not pip sections and stay
/// [`DependencyEntry::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipSection {
    /// Packages installed through pip.
    pub pip: Vec<Dependency>,
}

/// A parsed environment descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// Environment name, when the file declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Channels, in priority order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    /// Dependencies in file order.
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
    /// Unrelated top-level keys.
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl EnvironmentDescriptor {
    /// Parses a descriptor, dropping the host `prefix` key.
    ///
    /// # Errors
    ///
    /// Returns the YAML diagnostic when `text` is not a descriptor.
    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let mut descriptor: Self = serde_yaml::from_str(text)?;
        descriptor.extra.remove(PREFIX_KEY);
        Ok(descriptor)
    }

    /// Serialises the descriptor to YAML.
    ///
    /// # Errors
    ///
    /// Returns the YAML diagnostic when an extra key cannot be serialised.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Reads and parses the descriptor at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::Io`] or [`AutomationError::Yaml`].
    pub fn read(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(AutomationError::io_at(path))?;
        Self::from_yaml(&text).map_err(|err| AutomationError::Yaml {
            path: path.to_owned(),
            reason: err.to_string(),
        })
    }

    /// Writes the descriptor to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AutomationError::Io`] or [`AutomationError::Yaml`].
    pub fn write(&self, path: &Utf8Path) -> Result<()> {
        let text = self.to_yaml().map_err(|err| AutomationError::Yaml {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;
        fs::write(path, text).map_err(AutomationError::io_at(path))
    }

    /// Every dependency in file order, with nested pip entries in place.
    pub fn flat_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().flat_map(|entry| match entry {
            DependencyEntry::Package(dep) => std::slice::from_ref(dep).iter(),
            DependencyEntry::Pip(section) => section.pip.iter(),
            DependencyEntry::Other(_) => std::slice::Iter::default(),
        })
    }

    /// Renders the companion spec list, one dependency per line.
    #[must_use]
    pub fn spec_list(&self) -> String {
        self.flat_dependencies()
            .map(|dep| format!("{dep}\n"))
            .collect()
    }
}

/// Supplies the resolved contents of a named environment.
#[cfg_attr(test, mockall::automock)]
pub trait EnvironmentIntrospector {
    /// Returns the descriptor of `environment`.
    ///
    /// # Errors
    ///
    /// Returns an error when the environment does not exist or cannot be
    /// queried.
    fn introspect(&self, environment: &str) -> Result<EnvironmentDescriptor>;
}

/// Introspects environments through `{engine} env export`.
pub struct CondaIntrospector<'a> {
    executor: &'a dyn CommandExecutor,
    engine: CondaEngine,
}

impl<'a> CondaIntrospector<'a> {
    /// Creates an introspector running `engine` through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, engine: CondaEngine) -> Self {
        Self { executor, engine }
    }
}

impl EnvironmentIntrospector for CondaIntrospector<'_> {
    fn introspect(&self, environment: &str) -> Result<EnvironmentDescriptor> {
        let output = run_checked(
            self.executor,
            self.engine.program(),
            &["env", "export", "--name", environment],
        )?;
        let text = String::from_utf8_lossy(&output.stdout);
        EnvironmentDescriptor::from_yaml(&text).map_err(|err| AutomationError::Export {
            environment: environment.to_owned(),
            reason: format!("unreadable `env export` output: {err}"),
        })
    }
}

/// Returns `{base}_{os}`.
#[must_use]
pub fn environment_name(base: &str, os_tag: &OsTag) -> String {
    format!("{base}_{os_tag}")
}

/// Returns the descriptor and spec-list paths for `{base}_{os}`.
#[must_use]
pub fn descriptor_paths(
    envs_dir: &Utf8Path,
    base: &str,
    os_tag: &OsTag,
) -> (Utf8PathBuf, Utf8PathBuf) {
    let name = environment_name(base, os_tag);
    (
        envs_dir.join(format!("{name}.yml")),
        envs_dir.join(format!("{name}_spec.txt")),
    )
}

/// Files written by [`export`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedEnvironment {
    /// The `.yml` descriptor.
    pub descriptor_path: Utf8PathBuf,
    /// The flat `_spec.txt` list.
    pub spec_path: Utf8PathBuf,
    /// What was written.
    pub descriptor: EnvironmentDescriptor,
}

/// Exports environment `{base}_{os}` into `envs_dir`.
///
/// # Errors
///
/// Returns [`AutomationError::Export`] when the environment cannot be
/// introspected and [`AutomationError::Io`] or [`AutomationError::Yaml`] when
/// the files cannot be written.
pub fn export(
    envs_dir: &Utf8Path,
    base: &str,
    os_tag: &OsTag,
    introspector: &dyn EnvironmentIntrospector,
) -> Result<ExportedEnvironment> {
    let name = environment_name(base, os_tag);
    let mut descriptor = introspector
        .introspect(&name)
        .map_err(|err| match err {
            export @ AutomationError::Export { .. } => export,
            other => AutomationError::Export {
                environment: name.clone(),
                reason: other.to_string(),
            },
        })?;
    descriptor.name = Some(name.clone());
    descriptor.extra.remove(PREFIX_KEY);

    let (descriptor_path, spec_path) = descriptor_paths(envs_dir, base, os_tag);
    descriptor.write(&descriptor_path)?;
    fs::write(&spec_path, descriptor.spec_list()).map_err(AutomationError::io_at(&spec_path))?;
    log::info!("exported {name} to {descriptor_path}");

    Ok(ExportedEnvironment {
        descriptor_path,
        spec_path,
        descriptor,
    })
}

/// One descriptor family member moved by [`rename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedFile {
    /// Original path.
    pub from: Utf8PathBuf,
    /// New path.
    pub to: Utf8PathBuf,
}

/// Summary of a [`rename`] run.
#[derive(Debug, Default)]
pub struct RenameReport {
    /// Files moved to the new base name.
    pub renamed: Vec<RenamedFile>,
    /// Files left untouched because they could not be processed.
    pub failures: Vec<PathFailure>,
}

/// Renames every `{old_base}_{os}` descriptor and spec list to `new_base`.
///
/// Only files whose OS segment contains no underscore belong to the family,
/// so renaming `proj` leaves `proj_dev_lin.yml` alone. A descriptor that
/// fails to parse is reported and left in place along with its spec list.
/// Descriptors keep their `.yml` or `.yaml` extension.
///
/// # Errors
///
/// Returns [`AutomationError::Io`] when `envs_dir` cannot be listed.
pub fn rename(old_base: &str, new_base: &str, envs_dir: &Utf8Path) -> Result<RenameReport> {
    let mut report = RenameReport::default();
    if old_base == new_base {
        log::info!("environment base name is already {new_base}");
        return Ok(report);
    }

    let mut file_names = Vec::new();
    for entry in fs::read_dir(envs_dir).map_err(AutomationError::io_at(envs_dir))? {
        let entry = entry.map_err(AutomationError::io_at(envs_dir))?;
        if let Ok(name) = entry.file_name().into_string() {
            file_names.push(name);
        }
    }
    file_names.sort();

    let mut failed_tags = Vec::new();
    for file_name in &file_names {
        let Some((os_tag, extension)) = DESCRIPTOR_EXTENSIONS
            .iter()
            .find_map(|ext| family_tag(file_name, old_base, ext).map(|tag| (tag, ext)))
        else {
            continue;
        };
        let from = envs_dir.join(file_name);
        let to = envs_dir.join(format!("{new_base}_{os_tag}{extension}"));
        match rename_descriptor(&from, &to, &format!("{new_base}_{os_tag}")) {
            Ok(()) => report.renamed.push(RenamedFile { from, to }),
            Err(err) => {
                log::warn!("{err}");
                failed_tags.push(os_tag.to_owned());
                report.failures.push(PathFailure {
                    path: from.clone(),
                    error: AutomationError::Rename {
                        path: from,
                        reason: err.to_string(),
                    },
                });
            }
        }
    }

    for file_name in &file_names {
        let Some(os_tag) = family_tag(file_name, old_base, "_spec.txt") else {
            continue;
        };
        if failed_tags.iter().any(|tag| tag == os_tag) {
            continue;
        }
        let from = envs_dir.join(file_name);
        let to = envs_dir.join(format!("{new_base}_{os_tag}_spec.txt"));
        match fs::rename(&from, &to) {
            Ok(()) => report.renamed.push(RenamedFile { from, to }),
            Err(err) => report.failures.push(PathFailure {
                path: from.clone(),
                error: AutomationError::Rename {
                    path: from,
                    reason: err.to_string(),
                },
            }),
        }
    }

    Ok(report)
}

/// Returns the OS segment when `file_name` is `{base}_{os}{suffix}`.
fn family_tag<'a>(file_name: &'a str, base: &str, suffix: &str) -> Option<&'a str> {
    let os_tag = file_name
        .strip_suffix(suffix)?
        .strip_prefix(base)?
        .strip_prefix('_')?;
    (!os_tag.is_empty() && !os_tag.contains('_')).then_some(os_tag)
}

fn rename_descriptor(from: &Utf8Path, to: &Utf8Path, new_name: &str) -> Result<()> {
    let mut descriptor = EnvironmentDescriptor::read(from)?;
    if descriptor.name.is_some() {
        descriptor.name = Some(new_name.to_owned());
    }
    descriptor.write(to)?;
    fs::remove_file(from).map_err(AutomationError::io_at(from))
}

/// A descriptor selected for import.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImport {
    /// Descriptor file.
    pub path: Utf8PathBuf,
    /// Environment name the descriptor creates.
    pub environment: String,
    /// Parsed contents.
    pub descriptor: EnvironmentDescriptor,
}

/// Finds the descriptor to import for `os_tag`.
///
/// With `base` set only `{base}_{os}.yml` qualifies; otherwise the most
/// recently modified descriptor for the OS tag wins.
///
/// # Errors
///
/// Returns [`AutomationError::Import`] when no descriptor matches and
/// [`AutomationError::Io`] or [`AutomationError::Yaml`] when the chosen one
/// cannot be read.
pub fn import(envs_dir: &Utf8Path, os_tag: &OsTag, base: Option<&str>) -> Result<ResolvedImport> {
    let filters = LocateFilters {
        os: Some(os_tag.clone()),
        versions: Vec::new(),
    };
    let wanted_stem = base.map(|base| environment_name(base, os_tag));
    let candidate = Locator::new(1)
        .locate(ArtifactKind::EnvironmentFile, envs_dir, &filters)
        .into_iter()
        .filter(|candidate| candidate.os_tag.as_ref() == Some(os_tag))
        .find(|candidate| {
            wanted_stem
                .as_deref()
                .is_none_or(|stem| candidate.path.file_stem() == Some(stem))
        })
        .ok_or_else(|| AutomationError::Import {
            reason: match &wanted_stem {
                Some(stem) => format!("no {stem}.yml descriptor in {envs_dir}"),
                None => format!("no descriptor for OS tag `{os_tag}` in {envs_dir}"),
            },
        })?;

    let descriptor = EnvironmentDescriptor::read(&candidate.path)?;
    let environment = descriptor
        .name
        .clone()
        .or_else(|| candidate.path.file_stem().map(str::to_owned))
        .unwrap_or_default();
    Ok(ResolvedImport {
        path: candidate.path,
        environment,
        descriptor,
    })
}

/// How [`apply_import`] materialised a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportAction {
    /// `env create -f` built a new environment.
    Created,
    /// `env update -f --prune` synchronised an existing environment.
    Updated,
}

/// Creates or updates the environment described by `resolved`.
///
/// # Errors
///
/// Returns [`AutomationError::ExternalTool`] when the engine fails.
pub fn apply_import(
    executor: &dyn CommandExecutor,
    engine: CondaEngine,
    existing: &[String],
    resolved: &ResolvedImport,
) -> Result<ImportAction> {
    let program = engine.program();
    let file = resolved.path.as_str();
    if existing.iter().any(|name| *name == resolved.environment) {
        run_checked(
            executor,
            program,
            &[
                "env",
                "update",
                "-n",
                resolved.environment.as_str(),
                "-f",
                file,
                "--prune",
            ],
        )?;
        Ok(ImportAction::Updated)
    } else {
        run_checked(executor, program, &["env", "create", "-f", file])?;
        Ok(ImportAction::Created)
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
