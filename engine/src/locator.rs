//! Artifact discovery in build output trees.
//!
//! The locator walks a search root, classifies files by [`ArtifactKind`],
//! infers OS and runtime-version tags from file names, and returns matching
//! candidates newest first. Discovery never fails: unreadable entries and
//! symlink loops are logged and skipped, and a missing search root simply
//! yields no candidates.

use crate::tox::RuntimeVersion;
use automation_common::OsTag;
use camino::{Utf8Path, Utf8PathBuf};
use std::cmp::Reverse;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Default traversal depth when no configuration overrides it.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Kinds of build output the locator recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Type stub (`.pyi`).
    Stub,
    /// Binary distribution (`.whl`).
    Wheel,
    /// Source distribution (`.tar.gz`).
    Sdist,
    /// Environment descriptor (`.yml` / `.yaml`).
    EnvironmentFile,
}

impl ArtifactKind {
    /// Classifies a file by name.
    ///
    /// ```
    /// use automation_engine::locator::ArtifactKind;
    ///
    /// assert_eq!(ArtifactKind::of("demo-1.0.tar.gz"), Some(ArtifactKind::Sdist));
    /// assert_eq!(ArtifactKind::of("proj_lin.yml"), Some(ArtifactKind::EnvironmentFile));
    /// assert_eq!(ArtifactKind::of("proj_lin_spec.txt"), None);
    /// ```
    #[must_use]
    pub fn of(file_name: &str) -> Option<Self> {
        if file_name.ends_with(".pyi") {
            Some(Self::Stub)
        } else if file_name.ends_with(".whl") {
            Some(Self::Wheel)
        } else if file_name.ends_with(".tar.gz") {
            Some(Self::Sdist)
        } else if file_name.ends_with(".yml") || file_name.ends_with(".yaml") {
            Some(Self::EnvironmentFile)
        } else {
            None
        }
    }
}

/// A discovered build artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCandidate {
    /// Absolute path of the file.
    pub path: Utf8PathBuf,
    /// Path relative to the search root.
    pub relative_path: Utf8PathBuf,
    /// What the file is.
    pub kind: ArtifactKind,
    /// OS tag inferred from the file name, if any.
    pub os_tag: Option<OsTag>,
    /// Runtime version inferred from the file name, if any.
    pub version_tag: Option<RuntimeVersion>,
    /// Last modification time.
    pub modified: SystemTime,
}

impl ArtifactCandidate {
    fn matches(&self, filters: &LocateFilters) -> bool {
        let os_matches = match (&filters.os, &self.os_tag) {
            (Some(wanted), Some(tag)) => wanted == tag,
            _ => true,
        };
        let version_matches = match &self.version_tag {
            Some(tag) if !filters.versions.is_empty() => {
                filters.versions.iter().any(|wanted| wanted.matches(tag))
            }
            _ => true,
        };
        os_matches && version_matches
    }
}

/// Optional tag filters applied by [`Locator::locate`].
///
/// Candidates without an OS tag match every OS filter, and candidates without
/// a version tag match every version list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocateFilters {
    /// Keep only candidates built for this OS.
    pub os: Option<OsTag>,
    /// Keep only candidates built for one of these runtime versions.
    pub versions: Vec<RuntimeVersion>,
}

/// Walks search roots for artifacts of one kind.
#[derive(Debug, Clone, Copy)]
pub struct Locator {
    max_depth: usize,
}

impl Default for Locator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Locator {
    /// Creates a locator that descends at most `max_depth` directories.
    #[must_use]
    pub const fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Finds every artifact of `kind` under `search_root` that passes
    /// `filters`.
    ///
    /// Results are ordered by modification time, newest first; ties are
    /// broken by the lexicographically greatest path so the order is stable
    /// across runs.
    #[must_use]
    pub fn locate(
        &self,
        kind: ArtifactKind,
        search_root: &Utf8Path,
        filters: &LocateFilters,
    ) -> Vec<ArtifactCandidate> {
        if !search_root.is_dir() {
            log::debug!("search root {search_root} does not exist");
            return Vec::new();
        }

        let walker = WalkDir::new(search_root)
            .follow_links(true)
            .max_depth(self.max_depth);

        let mut candidates: Vec<ArtifactCandidate> = walker
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    if let Some(ancestor) = err.loop_ancestor() {
                        log::warn!("skipping symlink loop back to {}", ancestor.display());
                    } else {
                        log::warn!("skipping unreadable entry: {err}");
                    }
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| classify(kind, search_root, entry))
            .filter(|candidate| candidate.matches(filters))
            .collect();

        candidates.sort_by(|a, b| {
            (Reverse(a.modified), Reverse(&a.path)).cmp(&(Reverse(b.modified), Reverse(&b.path)))
        });
        log::debug!(
            "located {} {kind:?} candidate(s) under {search_root}",
            candidates.len()
        );
        candidates
    }
}

fn classify(
    kind: ArtifactKind,
    search_root: &Utf8Path,
    entry: walkdir::DirEntry,
) -> Option<ArtifactCandidate> {
    let Ok(path) = Utf8PathBuf::try_from(entry.into_path()) else {
        log::warn!("skipping non-UTF-8 path under {search_root}");
        return None;
    };
    let file_name = path.file_name()?;
    if ArtifactKind::of(file_name)? != kind {
        return None;
    }

    let modified = match path.metadata().and_then(|meta| meta.modified()) {
        Ok(modified) => modified,
        Err(err) => {
            log::warn!("skipping {path}: {err}");
            return None;
        }
    };
    let (os_tag, version_tag) = infer_tags(kind, file_name);
    let relative_path = path
        .strip_prefix(search_root)
        .map_or_else(|_| Utf8PathBuf::from(file_name), Utf8Path::to_path_buf);

    Some(ArtifactCandidate {
        relative_path,
        path,
        kind,
        os_tag,
        version_tag,
        modified,
    })
}

fn infer_tags(kind: ArtifactKind, file_name: &str) -> (Option<OsTag>, Option<RuntimeVersion>) {
    match kind {
        ArtifactKind::Stub | ArtifactKind::Sdist => (None, None),
        ArtifactKind::Wheel => wheel_tags(file_name),
        ArtifactKind::EnvironmentFile => (descriptor_os_tag(file_name), None),
    }
}

/// Reads the python and platform tags of
/// `{dist}-{version}(-{build})?-{python}-{abi}-{platform}.whl`.
fn wheel_tags(file_name: &str) -> (Option<OsTag>, Option<RuntimeVersion>) {
    let stem = file_name.trim_end_matches(".whl");
    let parts: Vec<&str> = stem.split('-').collect();
    let [.., python, _abi, platform] = parts.as_slice() else {
        return (None, None);
    };
    if !(5..=6).contains(&parts.len()) {
        log::debug!("{file_name} does not follow the wheel naming convention");
        return (None, None);
    }
    let version = python.split('.').filter_map(RuntimeVersion::parse).max();
    (OsTag::from_platform_tag(platform), version)
}

/// Returns the segment after the last underscore of a descriptor stem.
#[must_use]
pub fn descriptor_os_tag(file_name: &str) -> Option<OsTag> {
    let stem = file_name
        .strip_suffix(".yml")
        .or_else(|| file_name.strip_suffix(".yaml"))?;
    let (_, tag) = stem.rsplit_once('_')?;
    OsTag::new(tag).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Tree {
        _temp: TempDir,
        root: Utf8PathBuf,
    }

    impl Tree {
        fn file(&self, relative: &str, age_secs: u64) -> Utf8PathBuf {
            let path = self.root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(&path, relative).expect("write file");
            let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 - age_secs);
            fs::File::options()
                .write(true)
                .open(&path)
                .and_then(|file| file.set_modified(modified))
                .expect("pin mtime");
            path
        }
    }

    #[fixture]
    fn tree() -> Tree {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        Tree { _temp: temp, root }
    }

    fn names(candidates: &[ArtifactCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.relative_path.as_str()).collect()
    }

    #[rstest]
    fn orders_newest_first(tree: Tree) {
        tree.file("pkg/a.pyi", 30);
        tree.file("pkg/sub/b.pyi", 10);
        tree.file("pkg/c.pyi", 20);
        tree.file("pkg/readme.md", 0);

        let found = Locator::default().locate(ArtifactKind::Stub, &tree.root, &LocateFilters::default());
        assert_eq!(names(&found), ["pkg/sub/b.pyi", "pkg/c.pyi", "pkg/a.pyi"]);
    }

    #[rstest]
    fn ties_prefer_greatest_path_and_are_stable(tree: Tree) {
        tree.file("a/mod.pyi", 5);
        tree.file("b/mod.pyi", 5);
        tree.file("c/mod.pyi", 5);

        let locator = Locator::default();
        let first = locator.locate(ArtifactKind::Stub, &tree.root, &LocateFilters::default());
        let second = locator.locate(ArtifactKind::Stub, &tree.root, &LocateFilters::default());
        assert_eq!(names(&first), ["c/mod.pyi", "b/mod.pyi", "a/mod.pyi"]);
        assert_eq!(first, second);
    }

    #[rstest]
    fn missing_root_yields_nothing(tree: Tree) {
        let found = Locator::default().locate(
            ArtifactKind::Wheel,
            &tree.root.join("absent"),
            &LocateFilters::default(),
        );
        assert!(found.is_empty());
    }

    #[rstest]
    fn depth_limit_bounds_traversal(tree: Tree) {
        tree.file("one/shallow.pyi", 0);
        tree.file("one/two/three/deep.pyi", 0);

        let found = Locator::new(2).locate(ArtifactKind::Stub, &tree.root, &LocateFilters::default());
        assert_eq!(names(&found), ["one/shallow.pyi"]);
    }

    #[rstest]
    fn filters_wheels_by_os_and_version(tree: Tree) {
        tree.file("wheelhouse/demo-1.0-cp312-cp312-manylinux_2_17_x86_64.whl", 0);
        tree.file("wheelhouse/demo-1.0-cp311-cp311-manylinux_2_17_x86_64.whl", 1);
        tree.file("wheelhouse/demo-1.0-cp312-cp312-win_amd64.whl", 2);
        tree.file("wheelhouse/demo-1.0-py3-none-any.whl", 3);

        let filters = LocateFilters {
            os: Some(OsTag::new("lin").expect("valid tag")),
            versions: vec![RuntimeVersion::new(3, Some(12))],
        };
        let found = Locator::default().locate(ArtifactKind::Wheel, &tree.root, &filters);
        assert_eq!(
            names(&found),
            [
                "wheelhouse/demo-1.0-cp312-cp312-manylinux_2_17_x86_64.whl",
                "wheelhouse/demo-1.0-py3-none-any.whl",
            ]
        );
    }

    #[rstest]
    fn sdists_ignore_tag_filters(tree: Tree) {
        tree.file("dist/demo-1.0.tar.gz", 0);
        let filters = LocateFilters {
            os: Some(OsTag::new("osx").expect("valid tag")),
            versions: vec![RuntimeVersion::new(3, Some(13))],
        };
        let found = Locator::default().locate(ArtifactKind::Sdist, &tree.root, &filters);
        assert_eq!(found.len(), 1);
    }

    #[rstest]
    fn environment_files_carry_their_os_tag(tree: Tree) {
        tree.file("proj_lin.yml", 0);
        tree.file("proj_osx.yml", 0);
        tree.file("proj_lin_spec.txt", 0);

        let filters = LocateFilters {
            os: Some(OsTag::new("lin").expect("valid tag")),
            versions: Vec::new(),
        };
        let found = Locator::default().locate(ArtifactKind::EnvironmentFile, &tree.root, &filters);
        assert_eq!(names(&found), ["proj_lin.yml"]);
        assert_eq!(found.first().and_then(|c| c.os_tag.clone()), OsTag::new("lin").ok());
    }

    #[rstest]
    #[case::plain("demo-1.0-cp312-cp312-macosx_11_0_arm64.whl", Some("osx"), Some("3.12"))]
    #[case::build_tag("demo-1.0-1-cp313-cp313-win_amd64.whl", Some("win"), Some("3.13"))]
    #[case::compound_python("demo-1.0-py2.py3-none-any.whl", None, Some("3"))]
    #[case::malformed("demo.whl", None, None)]
    fn reads_wheel_tags(
        #[case] file_name: &str,
        #[case] os: Option<&str>,
        #[case] version: Option<&str>,
    ) {
        let (os_tag, version_tag) = wheel_tags(file_name);
        assert_eq!(os_tag.as_ref().map(OsTag::as_str), os);
        assert_eq!(version_tag.map(|v| v.to_string()).as_deref(), version);
    }

    #[cfg(unix)]
    #[rstest]
    fn symlink_loops_are_skipped(tree: Tree) {
        tree.file("pkg/mod.pyi", 0);
        std::os::unix::fs::symlink(&tree.root, tree.root.join("pkg/loop")).expect("create symlink");

        let found = Locator::default().locate(ArtifactKind::Stub, &tree.root, &LocateFilters::default());
        assert_eq!(names(&found), ["pkg/mod.pyi"]);
    }
}
