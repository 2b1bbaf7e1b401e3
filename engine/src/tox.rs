//! Runtime-version discovery from `tox.ini`.
//!
//! Template projects declare the interpreter versions they support through
//! the tox environment list, e.g. `envlist = py{311,312,313}-test, lint`.
//! The first factor of each environment that names an interpreter yields one
//! [`RuntimeVersion`]; everything else (`lint`, `docs`) is ignored.

use crate::error::{AutomationError, Result};
use crate::ini::{IniDocument, IniSyntaxError};
use camino::Utf8Path;
use serde::{Serialize, Serializer};
use std::fmt;

/// An interpreter version such as `3.12`, or a bare major version `3`.
///
/// Parses the spellings used by tox factors and wheel python tags:
///
/// ```
/// use automation_engine::tox::RuntimeVersion;
///
/// let dotted = RuntimeVersion::parse("3.12").expect("dotted version");
/// assert_eq!(RuntimeVersion::parse("py312"), Some(dotted));
/// assert_eq!(RuntimeVersion::parse("cp312"), Some(dotted));
/// assert_eq!(dotted.to_string(), "3.12");
/// assert!(RuntimeVersion::parse("lint").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeVersion {
    major: u32,
    minor: Option<u32>,
}

impl RuntimeVersion {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: Option<u32>) -> Self {
        Self { major, minor }
    }

    /// Parses `3.12`, `py312`, `cp312`, or `py3`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let digits_at = text.find(|c: char| c.is_ascii_digit())?;
        let (prefix, rest) = text.split_at(digits_at);
        if !matches!(prefix, "" | "py" | "cp") {
            return None;
        }

        if let Some((major, minor)) = rest.split_once('.') {
            return Some(Self::new(parse_number(major)?, Some(parse_number(minor)?)));
        }

        let mut chars = rest.chars();
        let major = chars.next()?.to_digit(10)?;
        let minor = chars.as_str();
        if minor.is_empty() {
            return Some(Self::new(major, None));
        }
        Some(Self::new(major, Some(parse_number(minor)?)))
    }

    /// Returns `true` when both versions name the same interpreter line.
    ///
    /// A bare major version matches every minor version of that major.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.major == other.major
            && match (self.minor, other.minor) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

fn parse_number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{}.{minor}", self.major),
            None => write!(f, "{}", self.major),
        }
    }
}

impl Serialize for RuntimeVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Extracts runtime versions from the text of a `tox.ini` file.
///
/// Reads `[tox] envlist` (or the tox 4 spelling `env_list`). A missing
/// section, a missing key, or an empty list all yield an empty vector.
/// Versions keep their first-seen order and are deduplicated.
///
/// # Errors
///
/// Returns [`IniSyntaxError`] when the file is not valid INI.
pub fn runtime_versions(tox_ini: &str) -> std::result::Result<Vec<RuntimeVersion>, IniSyntaxError> {
    let doc = IniDocument::parse(tox_ini)?;
    let Some(envlist) = doc
        .get("tox", "envlist")
        .or_else(|| doc.get("tox", "env_list"))
    else {
        return Ok(Vec::new());
    };

    let mut versions = Vec::new();
    for env in split_top_level(envlist).flat_map(|item| expand_braces(item.trim())) {
        let Some(version) = env.split('-').find_map(RuntimeVersion::parse) else {
            continue;
        };
        if !versions.contains(&version) {
            versions.push(version);
        }
    }
    Ok(versions)
}

/// Reads `tox.ini` from disk and extracts its runtime versions.
///
/// # Errors
///
/// Returns [`AutomationError::Io`] when the file cannot be read and
/// [`AutomationError::Layout`] when it is not valid INI.
pub fn read_runtime_versions(path: &Utf8Path) -> Result<Vec<RuntimeVersion>> {
    let text = std::fs::read_to_string(path).map_err(AutomationError::io_at(path))?;
    runtime_versions(&text).map_err(|err| AutomationError::Layout {
        reason: format!("invalid {path}: {err}"),
    })
}

/// Splits on commas and newlines that are not inside braces.
fn split_top_level(list: &str) -> impl Iterator<Item = &str> {
    let mut depth = 0_usize;
    list.split(move |c: char| match c {
        '{' => {
            depth += 1;
            false
        }
        '}' => {
            depth = depth.saturating_sub(1);
            false
        }
        ',' | '\n' => depth == 0,
        _ => false,
    })
    .filter(|item| !item.trim().is_empty())
}

/// Expands tox brace groups: `py{311,312}-test` becomes `py311-test` and
/// `py312-test`.
fn expand_braces(env: &str) -> Vec<String> {
    let Some(open) = env.find('{') else {
        return vec![env.to_owned()];
    };
    let (head, rest) = env.split_at(open);
    let Some(close) = rest.find('}') else {
        return vec![env.to_owned()];
    };
    let (group, tail) = rest.split_at(close);
    let group = group.trim_start_matches('{');
    let tail = tail.trim_start_matches('}');

    group
        .split(',')
        .flat_map(|option| expand_braces(&format!("{head}{}{tail}", option.trim())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::dotted("3.12", Some(RuntimeVersion::new(3, Some(12))))]
    #[case::py_tag("py311", Some(RuntimeVersion::new(3, Some(11))))]
    #[case::cp_tag("cp313", Some(RuntimeVersion::new(3, Some(13))))]
    #[case::dotted_factor("py3.10", Some(RuntimeVersion::new(3, Some(10))))]
    #[case::major_only("py3", Some(RuntimeVersion::new(3, None)))]
    #[case::plain_word("lint", None)]
    #[case::foreign_prefix("x86", None)]
    #[case::empty("", None)]
    fn parses_version_spellings(#[case] text: &str, #[case] expected: Option<RuntimeVersion>) {
        assert_eq!(RuntimeVersion::parse(text), expected);
    }

    #[rstest]
    #[case::same_minor("3.12", "cp312", true)]
    #[case::different_minor("3.12", "3.11", false)]
    #[case::major_wildcard("py3", "3.13", true)]
    #[case::different_major("py2", "3.13", false)]
    fn matching_honours_major_only_tags(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        let a = RuntimeVersion::parse(a).expect("valid version");
        let b = RuntimeVersion::parse(b).expect("valid version");
        assert_eq!(a.matches(&b), expected);
        assert_eq!(b.matches(&a), expected);
    }

    #[test]
    fn expands_brace_groups_and_skips_non_interpreter_envs() {
        let tox = "[tox]\nenvlist = lint, stubs, py{311,312,313}-test, coverage, docs\n";
        let versions = runtime_versions(tox).expect("valid tox.ini");
        let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["3.11", "3.12", "3.13"]);
    }

    #[test]
    fn reads_multiline_env_list_and_deduplicates() {
        let tox = "[tox]\nenv_list =\n    py312-test\n    py312-coverage\n    py311-test\n";
        let versions = runtime_versions(tox).expect("valid tox.ini");
        assert_eq!(
            versions,
            [RuntimeVersion::new(3, Some(12)), RuntimeVersion::new(3, Some(11))]
        );
    }

    #[rstest]
    #[case::no_tox_section("[testenv]\ndeps = pytest\n")]
    #[case::no_envlist("[tox]\nrequires = tox>=4\n")]
    #[case::empty_envlist("[tox]\nenvlist =\n")]
    fn missing_envlist_yields_no_versions(#[case] tox: &str) {
        assert!(runtime_versions(tox).expect("valid tox.ini").is_empty());
    }

    #[test]
    fn nested_brace_groups_expand_fully() {
        assert_eq!(
            expand_braces("py{311,312}-{lin,win}"),
            ["py311-lin", "py311-win", "py312-lin", "py312-win"]
        );
    }

    #[test]
    fn serializes_as_dotted_string() {
        let json = serde_json::to_string(&RuntimeVersion::new(3, Some(12))).expect("serializable");
        assert_eq!(json, "\"3.12\"");
    }
}
