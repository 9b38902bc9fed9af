//! ---
//! sdl_section: "04-versioning"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "RPC semantic version primitives."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::VersionError;

/// Semantic version of the mobile RPC API negotiated by an application.
///
/// Ordering is lexicographic over `(major, minor, patch)`. The all-zero triple
/// is reserved as the "unknown" sentinel; see [`SemanticVersion::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion {
    /// Major component.
    pub major: u16,
    /// Minor component.
    pub minor: u16,
    /// Patch component.
    pub patch: u16,
}

impl SemanticVersion {
    /// Sentinel used when no version information could be obtained.
    pub const UNKNOWN: SemanticVersion = SemanticVersion::new(0, 0, 0);

    /// Construct a version from its components.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Build a version from loosely typed components, as found in RPC payloads.
    ///
    /// Every component must be a non-negative integer that fits 16 bits.
    pub fn from_components(major: i64, minor: i64, patch: i64) -> Result<Self, VersionError> {
        let narrow = |value: i64| {
            u16::try_from(value).map_err(|_| VersionError::ComponentOutOfRange(value))
        };
        Ok(Self::new(narrow(major)?, narrow(minor)?, narrow(patch)?))
    }

    /// A version is valid when at least one component is non-zero.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.major > 0 || self.minor > 0 || self.patch > 0
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let mut parts = trimmed.split('.');
        let mut next = || -> Result<u16, VersionError> {
            let part = parts
                .next()
                .ok_or_else(|| VersionError::Malformed(trimmed.to_owned()))?;
            part.parse::<u16>()
                .map_err(|_| VersionError::Malformed(trimmed.to_owned()))
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(VersionError::Malformed(trimmed.to_owned()));
        }
        Ok(version)
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SemanticVersion> for String {
    fn from(value: SemanticVersion) -> Self {
        value.to_string()
    }
}
