//! Operating-system tags used to suffix environment descriptors and to filter
//! platform-specific build artifacts.
//!
//! Template projects name their descriptors `{base}_{os}.yml`, so a tag must
//! never contain an underscore: the tag is always recovered as the segment
//! after the last underscore of a file stem.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tags assigned to the three supported host platforms.
pub const SUPPORTED_OS_TAGS: [&str; 3] = ["lin", "win", "osx"];

/// Errors raised when constructing an [`OsTag`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OsTagError {
    /// The tag is empty or contains characters other than ASCII letters and
    /// digits.
    #[error("invalid OS tag `{tag}`: tags must be non-empty ASCII alphanumerics")]
    Invalid {
        /// The rejected tag.
        tag: String,
    },

    /// The host operating system has no tag.
    #[error("unsupported host operating system `{os}`")]
    UnsupportedHost {
        /// Value of `std::env::consts::OS`.
        os: &'static str,
    },
}

/// A validated operating-system tag such as `lin`, `osx`, or `lin64`.
///
/// # Examples
///
/// ```
/// use automation_common::OsTag;
///
/// let tag = OsTag::new("lin64").expect("valid tag");
/// assert_eq!(tag.as_str(), "lin64");
/// assert!(OsTag::new("lin_64").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OsTag(String);

impl OsTag {
    /// Validates and wraps `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`OsTagError::Invalid`] when `tag` is empty or contains
    /// anything but ASCII alphanumerics.
    pub fn new(tag: impl Into<String>) -> Result<Self, OsTagError> {
        let tag = tag.into();
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(OsTagError::Invalid { tag });
        }
        Ok(Self(tag))
    }

    /// Returns the tag for the running host.
    ///
    /// # Errors
    ///
    /// Returns [`OsTagError::UnsupportedHost`] on platforms other than Linux,
    /// Windows, and macOS.
    pub fn host() -> Result<Self, OsTagError> {
        Self::for_os(std::env::consts::OS)
    }

    /// Maps a `std::env::consts::OS` value to its tag.
    ///
    /// # Errors
    ///
    /// Returns [`OsTagError::UnsupportedHost`] for unknown operating systems.
    pub fn for_os(os: &'static str) -> Result<Self, OsTagError> {
        let tag = match os {
            "linux" => "lin",
            "windows" => "win",
            "macos" => "osx",
            _ => return Err(OsTagError::UnsupportedHost { os }),
        };
        Ok(Self(tag.to_owned()))
    }

    /// Infers the tag from a wheel platform tag.
    ///
    /// Returns `None` for platform-independent wheels (`any`) and for platform
    /// families no template project targets.
    ///
    /// ```
    /// use automation_common::OsTag;
    ///
    /// let tag = OsTag::from_platform_tag("manylinux_2_17_x86_64").expect("linux wheel");
    /// assert_eq!(tag.as_str(), "lin");
    /// assert!(OsTag::from_platform_tag("any").is_none());
    /// ```
    #[must_use]
    pub fn from_platform_tag(platform: &str) -> Option<Self> {
        let platform = platform.to_ascii_lowercase();
        let tag = if ["linux", "manylinux", "musllinux"]
            .iter()
            .any(|prefix| platform.starts_with(prefix))
        {
            "lin"
        } else if platform.starts_with("win") {
            "win"
        } else if platform.starts_with("macosx") {
            "osx"
        } else {
            return None;
        };
        Some(Self(tag.to_owned()))
    }

    /// Returns the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OsTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OsTag {
    type Err = OsTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for OsTag {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
