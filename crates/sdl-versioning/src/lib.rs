//! ---
//! sdl_section: "04-versioning"
//! sdl_subsection: "module"
//! sdl_type: "source"
//! sdl_scope: "code"
//! sdl_description: "RPC semantic version primitives."
//! sdl_version: "v0.1.0-alpha"
//! sdl_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Version primitives shared by the schema registry and the RPC router:
//! the [`SemanticVersion`] triple and the fixed thresholds that decide which
//! schema generation a mobile message is validated against.

pub mod semver;

pub use semver::SemanticVersion;

/// First mobile API version whose schemas carry fine-grained version ranges.
pub const RPC_VERSION_5: SemanticVersion = SemanticVersion::new(5, 0, 0);

/// Canonical legacy version used for every negotiated version below [`RPC_VERSION_5`].
pub const BASE_RPC_VERSION: SemanticVersion = SemanticVersion::new(4, 5, 0);

/// Errors raised while parsing or building versions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// The textual form was not `major.minor.patch`.
    #[error("malformed version string '{0}'")]
    Malformed(String),
    /// A component was negative or larger than 16 bits.
    #[error("version component {0} is out of range")]
    ComponentOutOfRange(i64),
}

/// Clamp a negotiated version onto the schema generation used for validation.
///
/// Versions at or above [`RPC_VERSION_5`] are kept verbatim; anything older
/// collapses onto `base`.
#[must_use]
pub fn clamp_to_schema_generation(
    version: SemanticVersion,
    threshold: SemanticVersion,
    base: SemanticVersion,
) -> SemanticVersion {
    if version >= threshold {
        version
    } else {
        base
    }
}
