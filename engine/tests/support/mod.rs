//! Test support utilities for engine behavioural tests.
//!
//! Builds throwaway template projects on disk so scenarios exercise the
//! engine against real files.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

/// A template project rooted in a temporary directory.
pub struct TemplateProject {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl TemplateProject {
    /// Creates a project with a `demo_lib` package, an envs directory, and a
    /// tox configuration targeting 3.11 and 3.12.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_owned()).expect("non-UTF8 temp path");
        let project = Self { _temp: temp, root };
        project.write("pyproject.toml", "[project]\nname = \"demo-lib\"\n");
        project.write("tox.ini", "[tox]\nenvlist = py{311,312}-test, lint\n");
        project.write("src/demo_lib/__init__.py", "");
        fs::create_dir_all(project.root.join("envs")).expect("create envs");
        project
    }

    /// Project root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Writes `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write file");
    }

    /// Reads `relative` as text.
    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.root.join(relative)).expect("read file")
    }

    /// Returns `true` when `relative` exists.
    pub fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }
}
