//! `.pypirc` token storage used by the upload task.
//!
//! The file is expected to hold only the PyPI API token:
//!
//! ```ini
//! [pypi]
//! username = __token__
//! password = pypi-...
//! ```
//!
//! Only the token's shape is checked; whether PyPI accepts it is left to the
//! upload itself.

use crate::error::{AutomationError, Result};
use crate::ini::IniDocument;
use camino::Utf8Path;
use std::fs;

/// File name of the token store in the project root.
pub const PYPIRC_FILE: &str = ".pypirc";

const SECTION: &str = "pypi";
const TOKEN_USERNAME: &str = "__token__";
const TOKEN_PREFIX: &str = "pypi-";

/// What [`ensure_token`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// A valid token was already stored.
    Existing,
    /// A new token was written.
    Written,
}

/// Returns `true` when `path` holds a well-formed PyPI token entry.
///
/// Missing or unparsable files are simply invalid.
#[must_use]
pub fn verify(path: &Utf8Path) -> bool {
    let Ok(text) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(doc) = IniDocument::parse(&text) else {
        log::debug!("{path} is not valid INI");
        return false;
    };
    doc.get(SECTION, "username") == Some(TOKEN_USERNAME)
        && doc
            .get(SECTION, "password")
            .is_some_and(|password| password.starts_with(TOKEN_PREFIX))
}

/// Keeps a valid stored token, or stores `token` when the file is unusable or
/// `replace` is set.
///
/// # Errors
///
/// Returns [`AutomationError::Token`] when a new token is needed but none was
/// supplied or it lacks the `pypi-` prefix, and [`AutomationError::Io`] when
/// the file cannot be written.
pub fn ensure_token(path: &Utf8Path, token: Option<&str>, replace: bool) -> Result<TokenStatus> {
    if !replace && verify(path) {
        return Ok(TokenStatus::Existing);
    }

    let Some(token) = token.map(str::trim) else {
        return Err(AutomationError::Token {
            path: path.to_owned(),
            reason: "no valid token is stored; supply one with --token".to_owned(),
        });
    };
    if !token.starts_with(TOKEN_PREFIX) || token.len() == TOKEN_PREFIX.len() {
        return Err(AutomationError::Token {
            path: path.to_owned(),
            reason: format!("PyPI tokens start with `{TOKEN_PREFIX}`"),
        });
    }

    let mut doc = IniDocument::default();
    doc.set(SECTION, "username", TOKEN_USERNAME);
    doc.set(SECTION, "password", token);
    fs::write(path, doc.to_string()).map_err(AutomationError::io_at(path))?;
    Ok(TokenStatus::Written)
}
