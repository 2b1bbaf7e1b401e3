//! Placement of located artifacts into a destination tree.
//!
//! The installer re-roots each candidate under a destination directory and
//! copies it only when the destination content differs (SHA-256). Candidates
//! arrive in locator order, so the first candidate claiming a destination is
//! the newest one; later claimants are reported as superseded. Failures are
//! recorded per file and never stop the batch.

use crate::error::{AutomationError, PathFailure, Result};
use crate::locator::{ArtifactCandidate, ArtifactKind};
use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io;

/// How candidate paths map onto the destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Keep the path relative to the search root.
    #[default]
    PreserveTree,
    /// Place every file directly in the destination root.
    Flatten,
}

/// Options controlling one installation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallOptions {
    /// Destination path mapping.
    pub placement: Placement,
    /// Delete each source once its destination holds identical content.
    pub remove_sources: bool,
}

/// What happened to a single destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The destination did not exist.
    Created,
    /// The destination existed with different content.
    Replaced,
    /// The destination already held identical content.
    Unchanged,
}

/// Summary of one installation batch.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Destinations written for the first time.
    pub created: Vec<Utf8PathBuf>,
    /// Destinations overwritten with new content.
    pub replaced: Vec<Utf8PathBuf>,
    /// Destinations left as they were.
    pub unchanged: Vec<Utf8PathBuf>,
    /// Older sources skipped because a newer one claimed the destination.
    pub superseded: Vec<Utf8PathBuf>,
    /// Per-file failures.
    pub failures: Vec<PathFailure>,
}

impl InstallReport {
    /// Returns `true` when at least one file failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Number of destinations that were installed or already up to date.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.created.len() + self.replaced.len() + self.unchanged.len()
    }

    /// One-line summary of the counts.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} replaced, {} unchanged, {} superseded, {} failed",
            self.created.len(),
            self.replaced.len(),
            self.unchanged.len(),
            self.superseded.len(),
            self.failures.len()
        )
    }

    fn record(&mut self, destination: Utf8PathBuf, outcome: InstallOutcome) {
        match outcome {
            InstallOutcome::Created => self.created.push(destination),
            InstallOutcome::Replaced => self.replaced.push(destination),
            InstallOutcome::Unchanged => self.unchanged.push(destination),
        }
    }

    /// Records a moved file; a source that survives removal counts as a
    /// failure only.
    fn record_move(
        &mut self,
        source: Utf8PathBuf,
        destination: Utf8PathBuf,
        outcome: InstallOutcome,
        removal: io::Result<()>,
    ) {
        match removal {
            Ok(()) => self.record(destination, outcome),
            Err(err) => self.failures.push(PathFailure {
                path: source,
                error: AutomationError::Install {
                    path: destination,
                    reason: format!("installed but could not remove source: {err}"),
                },
            }),
        }
    }
}

/// Copies candidates into a destination root.
#[derive(Debug, Clone)]
pub struct Installer {
    destination_root: Utf8PathBuf,
    options: InstallOptions,
}

impl Installer {
    /// Creates an installer targeting `destination_root`.
    #[must_use]
    pub fn new(destination_root: impl Into<Utf8PathBuf>, options: InstallOptions) -> Self {
        Self {
            destination_root: destination_root.into(),
            options,
        }
    }

    /// Returns the destination root.
    #[must_use]
    pub fn destination_root(&self) -> &Utf8Path {
        &self.destination_root
    }

    /// Computes where `candidate` lands.
    ///
    /// Stub files named with a macOS duplicate counter (`module 2.pyi`) land
    /// on the undecorated name.
    #[must_use]
    pub fn destination_for(&self, candidate: &ArtifactCandidate) -> Utf8PathBuf {
        let relative = match self.options.placement {
            Placement::PreserveTree => candidate.relative_path.clone(),
            Placement::Flatten => candidate
                .relative_path
                .file_name()
                .map_or_else(|| candidate.relative_path.clone(), Utf8PathBuf::from),
        };
        let relative = if candidate.kind == ArtifactKind::Stub {
            strip_duplicate_counter(&relative)
        } else {
            relative
        };
        self.destination_root.join(relative)
    }

    /// Installs every candidate, newest claimant first.
    ///
    /// An empty batch succeeds with zero counts.
    pub fn install(&self, candidates: Vec<ArtifactCandidate>) -> InstallReport {
        let mut report = InstallReport::default();
        let mut claimed = HashSet::new();

        for candidate in candidates {
            let destination = self.destination_for(&candidate);
            if !claimed.insert(destination.clone()) {
                log::debug!("{} superseded by a newer candidate", candidate.path);
                report.superseded.push(candidate.path);
                continue;
            }

            if is_same_file(&candidate.path, &destination) {
                log::debug!("{destination} is its own source; leaving it in place");
                report.record(destination, InstallOutcome::Unchanged);
                continue;
            }

            match install_file(&candidate.path, &destination) {
                Ok(outcome) => {
                    log::debug!("{destination}: {outcome:?}");
                    if self.options.remove_sources {
                        let removal = fs::remove_file(&candidate.path);
                        report.record_move(candidate.path, destination, outcome, removal);
                    } else {
                        report.record(destination, outcome);
                    }
                }
                Err(error) => {
                    log::warn!("{error}");
                    report.failures.push(PathFailure {
                        path: candidate.path,
                        error,
                    });
                }
            }
        }

        report
    }
}

/// Copies `source` to `destination` unless both already hold the same bytes.
///
/// # Errors
///
/// Returns [`AutomationError::Install`] naming the destination when it cannot
/// be read, created, or written.
pub fn install_file(source: &Utf8Path, destination: &Utf8Path) -> Result<InstallOutcome> {
    let fail = |reason: String| AutomationError::Install {
        path: destination.to_owned(),
        reason,
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| fail(format!("cannot create directory {parent}: {e}")))?;
    }

    let outcome = if destination.exists() {
        if destination.is_dir() {
            return Err(fail("destination is a directory".to_owned()));
        }
        let source_digest =
            file_digest(source).map_err(|e| fail(format!("cannot read source {source}: {e}")))?;
        let destination_digest =
            file_digest(destination).map_err(|e| fail(format!("cannot read destination: {e}")))?;
        if source_digest == destination_digest {
            return Ok(InstallOutcome::Unchanged);
        }
        InstallOutcome::Replaced
    } else {
        InstallOutcome::Created
    };

    fs::copy(source, destination).map_err(|e| fail(format!("copy from {source} failed: {e}")))?;
    Ok(outcome)
}

/// Returns `true` when both paths resolve to the same existing file.
fn is_same_file(source: &Utf8Path, destination: &Utf8Path) -> bool {
    match (source.canonicalize_utf8(), destination.canonicalize_utf8()) {
        (Ok(source), Ok(destination)) => source == destination,
        _ => false,
    }
}

fn file_digest(path: &Utf8Path) -> io::Result<sha2::digest::Output<Sha256>> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Rewrites `name N.pyi` to `name.pyi` in the last path component.
fn strip_duplicate_counter(relative: &Utf8Path) -> Utf8PathBuf {
    let Some(file_name) = relative.file_name() else {
        return relative.to_owned();
    };
    let normalised = file_name
        .strip_suffix(".pyi")
        .and_then(|stem| stem.rsplit_once(' '))
        .filter(|(_, counter)| !counter.is_empty() && counter.chars().all(|c| c.is_ascii_digit()))
        .map(|(base, _)| format!("{base}.pyi"));
    match normalised {
        Some(name) => relative.with_file_name(name),
        None => relative.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Workspace {
        _temp: TempDir,
        source: Utf8PathBuf,
        destination: Utf8PathBuf,
    }

    impl Workspace {
        fn candidate(&self, relative: &str, contents: &str, age_secs: u64) -> ArtifactCandidate {
            let path = self.source.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(&path, contents).expect("write source");
            ArtifactCandidate {
                relative_path: Utf8PathBuf::from(relative),
                kind: ArtifactKind::of(relative).expect("known kind"),
                path,
                os_tag: None,
                version_tag: None,
                modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000 - age_secs),
            }
        }
    }

    #[fixture]
    fn workspace() -> Workspace {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        Workspace {
            source: root.join("stubs/pkg"),
            destination: root.join("src/pkg"),
            _temp: temp,
        }
    }

    #[rstest]
    fn creates_then_leaves_unchanged(workspace: Workspace) {
        let installer = Installer::new(&workspace.destination, InstallOptions::default());
        let batch = || {
            vec![
                workspace.candidate("__init__.pyi", "", 0),
                workspace.candidate("sub/module.pyi", "def f() -> int: ...\n", 0),
            ]
        };

        let first = installer.install(batch());
        assert_eq!(first.created.len(), 2);
        assert!(!first.has_failures());
        assert_eq!(
            fs::read_to_string(workspace.destination.join("sub/module.pyi")).expect("read"),
            "def f() -> int: ...\n"
        );

        let second = installer.install(batch());
        assert_eq!(second.unchanged.len(), 2);
        assert!(second.created.is_empty() && second.replaced.is_empty());
    }

    #[rstest]
    fn replaces_only_changed_content(workspace: Workspace) {
        let installer = Installer::new(&workspace.destination, InstallOptions::default());
        installer.install(vec![
            workspace.candidate("a.pyi", "old", 0),
            workspace.candidate("b.pyi", "same", 0),
        ]);

        let report = installer.install(vec![
            workspace.candidate("a.pyi", "new", 0),
            workspace.candidate("b.pyi", "same", 0),
        ]);
        assert_eq!(report.replaced, [workspace.destination.join("a.pyi")]);
        assert_eq!(report.unchanged, [workspace.destination.join("b.pyi")]);
    }

    #[rstest]
    fn newest_claimant_wins_shared_destination(workspace: Workspace) {
        fs::create_dir_all(&workspace.destination).expect("create destination");
        fs::write(workspace.destination.join("module.pyi"), "stale").expect("seed destination");
        let installer = Installer::new(&workspace.destination, InstallOptions::default());

        // Locator order: newest first.
        let newest = workspace.candidate("module 2.pyi", "newest", 0);
        let older = workspace.candidate("module.pyi", "older", 60);
        let older_path = older.path.clone();

        let report = installer.install(vec![newest, older]);
        assert_eq!(report.replaced.len(), 1);
        assert_eq!(report.superseded, [older_path]);
        assert_eq!(
            fs::read_to_string(workspace.destination.join("module.pyi")).expect("read"),
            "newest"
        );
    }

    #[rstest]
    fn empty_batch_succeeds(workspace: Workspace) {
        let report = Installer::new(&workspace.destination, InstallOptions::default()).install(Vec::new());
        assert_eq!(report.succeeded(), 0);
        assert!(!report.has_failures());
    }

    #[rstest]
    fn one_failure_does_not_stop_the_batch(workspace: Workspace) {
        // A directory squatting on a destination makes that single copy fail.
        fs::create_dir_all(workspace.destination.join("c.pyi")).expect("create blocker");
        let installer = Installer::new(&workspace.destination, InstallOptions::default());

        let report = installer.install(
            ["a.pyi", "b.pyi", "c.pyi", "d.pyi", "e.pyi"]
                .into_iter()
                .map(|name| workspace.candidate(name, name, 0))
                .collect(),
        );
        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.failures.len(), 1);
        let failure = report.failures.first().expect("one failure");
        assert!(failure.path.ends_with("c.pyi"));
        assert!(matches!(failure.error, AutomationError::Install { .. }));
    }

    #[rstest]
    fn flatten_and_remove_sources_moves_files(workspace: Workspace) {
        let installer = Installer::new(
            &workspace.destination,
            InstallOptions {
                placement: Placement::Flatten,
                remove_sources: true,
            },
        );
        let wheel = workspace.candidate("build/x86/demo-1.0-py3-none-any.whl", "wheel", 0);
        let source = wheel.path.clone();

        let report = installer.install(vec![wheel]);
        assert_eq!(
            report.created,
            [workspace.destination.join("demo-1.0-py3-none-any.whl")]
        );
        assert!(!source.exists());
    }

    #[rstest]
    fn source_already_at_destination_is_kept(workspace: Workspace) {
        let installer = Installer::new(
            &workspace.source,
            InstallOptions {
                placement: Placement::Flatten,
                remove_sources: true,
            },
        );
        let wheel = workspace.candidate("demo-1.0-py3-none-any.whl", "wheel", 0);
        let source = wheel.path.clone();

        let report = installer.install(vec![wheel]);
        assert_eq!(report.unchanged, [source.clone()]);
        assert!(!report.has_failures());
        assert_eq!(fs::read_to_string(&source).expect("read"), "wheel");
    }

    #[test]
    fn unremovable_source_counts_only_as_failure() {
        let mut report = InstallReport::default();
        report.record_move(
            Utf8PathBuf::from("build/demo.whl"),
            Utf8PathBuf::from("dist/demo.whl"),
            InstallOutcome::Created,
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only")),
        );

        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.failures.len(), 1);
        let failure = report.failures.first().expect("one failure");
        assert_eq!(failure.path, Utf8PathBuf::from("build/demo.whl"));
        assert!(failure.error.to_string().contains("could not remove source"));
    }

    #[rstest]
    #[case::counter("pkg/module 2.pyi", "pkg/module.pyi")]
    #[case::plain("pkg/module.pyi", "pkg/module.pyi")]
    #[case::space_in_name("pkg/my module.pyi", "pkg/my module.pyi")]
    #[case::bare_space("pkg/module .pyi", "pkg/module .pyi")]
    fn strips_macos_duplicate_counters(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_duplicate_counter(Utf8Path::new(input)), expected);
    }

    #[test]
    fn digest_detects_identical_content() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        fs::write(root.join("a"), "same").expect("write");
        fs::write(root.join("b"), "same").expect("write");
        fs::write(root.join("c"), "different").expect("write");
        let a = file_digest(&root.join("a")).expect("digest");
        assert_eq!(a, file_digest(&root.join("b")).expect("digest"));
        assert_ne!(a, file_digest(&root.join("c")).expect("digest"));
    }
}
