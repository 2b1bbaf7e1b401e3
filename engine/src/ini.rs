//! Minimal INI reader and writer for `tox.ini` and `.pypirc`.
//!
//! Supports `[section]` headers, `key = value` and `key: value` entries,
//! full-line `#`/`;` comments, and indented continuation lines, which tox
//! uses for multi-line values. Section names and keys are case-sensitive and
//! keys keep their first-seen order so a rewritten file reads like the input.

use std::fmt;
use thiserror::Error;

/// A syntax error in an INI document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct IniSyntaxError {
    /// One-based line number of the offending line.
    pub line: usize,
    /// Description of the problem.
    pub reason: String,
}

/// One `[section]` and its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    /// Returns the section name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => value.clone_into(&mut entry.1),
            None => self.entries.push((key.to_owned(), value.to_owned())),
        }
    }
}

/// A parsed INI document.
///
/// # Examples
///
/// ```
/// use automation_engine::ini::IniDocument;
///
/// let doc = IniDocument::parse("[tox]\nenvlist =\n    py311\n    py312\n")?;
/// assert_eq!(doc.get("tox", "envlist"), Some("py311\npy312"));
/// # Ok::<(), automation_engine::ini::IniSyntaxError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    /// Parses `text` into a document.
    ///
    /// # Errors
    ///
    /// Returns [`IniSyntaxError`] for entries outside any section, unclosed
    /// section headers, and lines that are neither entries nor comments.
    pub fn parse(text: &str) -> Result<Self, IniSyntaxError> {
        let mut doc = Self::default();
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = raw.starts_with([' ', '\t']);
            if indented
                && let (Some(section), Some(key)) = (&current, &last_key)
            {
                doc.append_continuation(section, key, trimmed);
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header.strip_suffix(']').ok_or_else(|| IniSyntaxError {
                    line: line_no,
                    reason: format!("unclosed section header `{trimmed}`"),
                })?;
                let name = name.trim();
                doc.ensure_section(name);
                current = Some(name.to_owned());
                last_key = None;
                continue;
            }

            let Some((key, value)) = split_entry(trimmed) else {
                return Err(IniSyntaxError {
                    line: line_no,
                    reason: format!("expected `key = value`, found `{trimmed}`"),
                });
            };
            let Some(section) = &current else {
                return Err(IniSyntaxError {
                    line: line_no,
                    reason: format!("entry `{key}` appears before any section header"),
                });
            };
            doc.set(section, key, value);
            last_key = Some(key.to_owned());
        }

        Ok(doc)
    }

    /// Returns the named section, if present.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns the value of `key` in `section`, if present.
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    /// Sets `key` in `section`, creating the section when needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ensure_section(section);
        if let Some(target) = self.sections.iter_mut().find(|s| s.name == section) {
            target.set(key, value);
        }
    }

    fn ensure_section(&mut self, name: &str) {
        if self.section(name).is_none() {
            self.sections.push(IniSection {
                name: name.to_owned(),
                entries: Vec::new(),
            });
        }
    }

    fn append_continuation(&mut self, section: &str, key: &str, line: &str) {
        let entry = self
            .sections
            .iter_mut()
            .filter(|s| s.name == section)
            .flat_map(|s| s.entries.iter_mut())
            .find(|(k, _)| k == key);
        if let Some((_, value)) = entry {
            if !value.is_empty() {
                value.push('\n');
            }
            value.push_str(line);
        }
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                let mut lines = value.lines();
                writeln!(f, "{key} = {}", lines.next().unwrap_or_default())?;
                for line in lines {
                    writeln!(f, "    {line}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let split_at = line.find(['=', ':'])?;
    let (key, rest) = line.split_at(split_at);
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, rest.get(1..).unwrap_or_default().trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn reads_sections_and_entries() {
        let doc = IniDocument::parse(
            "# leading comment\n[pypi]\nusername = __token__\npassword: pypi-abc\n",
        )
        .expect("valid ini");
        assert_eq!(doc.get("pypi", "username"), Some("__token__"));
        assert_eq!(doc.get("pypi", "password"), Some("pypi-abc"));
        assert_eq!(doc.get("pypi", "repository"), None);
        assert_eq!(doc.get("testpypi", "username"), None);
    }

    #[test]
    fn joins_continuation_lines() {
        let doc = IniDocument::parse(
            "[tox]\nenvlist =\n    py311\n    ; comment inside\n    py312\nskip_missing = true\n",
        )
        .expect("valid ini");
        assert_eq!(doc.get("tox", "envlist"), Some("py311\npy312"));
        assert_eq!(doc.get("tox", "skip_missing"), Some("true"));
    }

    #[test]
    fn values_may_contain_separators() {
        let doc = IniDocument::parse("[testenv]\ncommands = python -c 'a=1'\n").expect("valid ini");
        assert_eq!(doc.get("testenv", "commands"), Some("python -c 'a=1'"));
    }

    #[rstest]
    #[case::orphan_entry("key = value\n", 1)]
    #[case::unclosed_header("[tox\n", 1)]
    #[case::bare_word("[tox]\nenvlist\n", 2)]
    fn rejects_malformed_lines(#[case] text: &str, #[case] line: usize) {
        let err = IniDocument::parse(text).expect_err("expected syntax error");
        assert_eq!(err.line, line);
    }

    #[test]
    fn set_replaces_in_place_and_renders() {
        let mut doc = IniDocument::parse("[pypi]\nusername = someone\n").expect("valid ini");
        doc.set("pypi", "username", "__token__");
        doc.set("pypi", "password", "pypi-xyz");
        assert_eq!(
            doc.to_string(),
            "[pypi]\nusername = __token__\npassword = pypi-xyz\n\n"
        );
    }

    #[test]
    fn rendered_output_parses_back() {
        let source = "[tox]\nenvlist =\n    py311\n    py312\n";
        let doc = IniDocument::parse(source).expect("valid ini");
        let reparsed = IniDocument::parse(&doc.to_string()).expect("valid ini");
        assert_eq!(reparsed.get("tox", "envlist"), doc.get("tox", "envlist"));
    }
}
