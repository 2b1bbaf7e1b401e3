//! Typing marker normalisation and stub cleanup inside the library tree.

use crate::error::{AutomationError, PathFailure, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use walkdir::WalkDir;

/// PEP 561 marker declaring that a package ships type information.
pub const TYPED_MARKER: &str = "py.typed";

/// Outcome of [`process_typed_markers`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MarkerReport {
    /// Whether the root marker had to be created.
    pub created: bool,
    /// Nested markers that were deleted.
    pub removed: Vec<Utf8PathBuf>,
}

/// Ensures `py.typed` exists at `library_root` and nowhere below it.
///
/// # Errors
///
/// Returns [`AutomationError::Io`] when a marker cannot be created or
/// removed, or when the tree cannot be walked.
pub fn process_typed_markers(library_root: &Utf8Path) -> Result<MarkerReport> {
    let root_marker = library_root.join(TYPED_MARKER);
    let mut report = MarkerReport::default();

    if !root_marker.is_file() {
        fs::write(&root_marker, b"").map_err(AutomationError::io_at(&root_marker))?;
        report.created = true;
    }

    for path in files_named(library_root, |name| name == TYPED_MARKER)? {
        if path != root_marker {
            fs::remove_file(&path).map_err(AutomationError::io_at(&path))?;
            log::debug!("removed nested marker {path}");
            report.removed.push(path);
        }
    }

    Ok(report)
}

/// Outcome of [`purge_stubs`].
#[derive(Debug, Default)]
pub struct PurgeReport {
    /// Stub files deleted.
    pub removed: Vec<Utf8PathBuf>,
    /// Stub files that could not be deleted.
    pub failures: Vec<PathFailure>,
}

/// Deletes every `.pyi` file under `library_root`.
///
/// # Errors
///
/// Returns [`AutomationError::Io`] when the tree cannot be walked; per-file
/// deletion failures are collected in the report instead.
pub fn purge_stubs(library_root: &Utf8Path) -> Result<PurgeReport> {
    let mut report = PurgeReport::default();
    for path in files_named(library_root, |name| name.ends_with(".pyi"))? {
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("removed {path}");
                report.removed.push(path);
            }
            Err(source) => report.failures.push(PathFailure {
                error: AutomationError::Io {
                    path: path.clone(),
                    source,
                },
                path,
            }),
        }
    }
    Ok(report)
}

fn files_named(root: &Utf8Path, matches: impl Fn(&str) -> bool) -> Result<Vec<Utf8PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| AutomationError::Io {
            path: root.to_owned(),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(path) = Utf8PathBuf::try_from(entry.into_path()) else {
            log::warn!("skipping non-UTF-8 path under {root}");
            continue;
        };
        if path.file_name().is_some_and(&matches) {
            found.push(path);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Library {
        _temp: TempDir,
        root: Utf8PathBuf,
    }

    impl Library {
        fn touch(&self, relative: &str) {
            let path = self.root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(path, "").expect("write file");
        }
    }

    #[fixture]
    fn library() -> Library {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().join("demo_lib")).expect("non-UTF8 temp path");
        fs::create_dir_all(&root).expect("create library root");
        Library { _temp: temp, root }
    }

    #[rstest]
    fn creates_root_marker_and_removes_nested_ones(library: Library) {
        library.touch("sub/py.typed");
        library.touch("sub/deeper/py.typed");

        let report = process_typed_markers(&library.root).expect("markers processed");
        assert!(report.created);
        assert_eq!(
            report.removed,
            [
                library.root.join("sub/deeper/py.typed"),
                library.root.join("sub/py.typed"),
            ]
        );
        assert!(library.root.join(TYPED_MARKER).is_file());
        assert!(!library.root.join("sub/py.typed").exists());
    }

    #[rstest]
    fn existing_root_marker_is_kept(library: Library) {
        library.touch(TYPED_MARKER);
        let report = process_typed_markers(&library.root).expect("markers processed");
        assert_eq!(report, MarkerReport::default());
    }

    #[rstest]
    fn purge_removes_only_stubs(library: Library) {
        library.touch("__init__.py");
        library.touch("__init__.pyi");
        library.touch("sub/module.py");
        library.touch("sub/module.pyi");

        let report = purge_stubs(&library.root).expect("purge succeeds");
        assert_eq!(report.removed.len(), 2);
        assert!(report.failures.is_empty());
        assert!(library.root.join("__init__.py").exists());
        assert!(library.root.join("sub/module.py").exists());
        assert!(!library.root.join("sub/module.pyi").exists());
    }
}
