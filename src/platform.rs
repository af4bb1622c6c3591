//! Platform catalog - maps a target platform descriptor to build parameters.
//!
//! The catalog is pure data (`platforms.toml`, embedded at compile time and
//! parsed once at startup). Adding a platform is a data change, never a code
//! branch.
//!
//! # Example
//!
//! ```rust
//! use sysroot_builder::platform::{PlatformCatalog, PlatformDescriptor};
//!
//! let catalog = PlatformCatalog::builtin().unwrap();
//! let descriptor = PlatformDescriptor::new(
//!     "generic_arm64", "ubuntu_bionic", "crystal", "fastrtps",
//! );
//! let profile = catalog.resolve(&descriptor).unwrap();
//! assert_eq!(profile.target_triple, "aarch64-linux-gnu");
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;

/// Identifies a cross-compilation target platform.
///
/// Equality is by value; the descriptor is used only as a catalog lookup key
/// and as the source of the per-platform directory id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformDescriptor {
    /// Target architecture family (e.g. `generic_arm64`).
    pub arch: String,
    /// Target operating system release (e.g. `ubuntu_bionic`).
    pub os: String,
    /// Target distribution release installed on the sysroot.
    pub distro: String,
    /// Middleware implementation variant.
    pub rmw: String,
}

impl PlatformDescriptor {
    pub fn new(
        arch: impl Into<String>,
        os: impl Into<String>,
        distro: impl Into<String>,
        rmw: impl Into<String>,
    ) -> Self {
        Self {
            arch: arch.into(),
            os: os.into(),
            distro: distro.into(),
            rmw: rmw.into(),
        }
    }

    /// Deterministic directory id for this platform.
    pub fn platform_id(&self) -> String {
        format!("{}-{}-{}-{}", self.arch, self.os, self.rmw, self.distro)
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arch={} os={} distro={} rmw={}",
            self.arch, self.os, self.distro, self.rmw
        )
    }
}

/// Build parameters associated with exactly one registered platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Base image the sysroot is derived from, when the catalog knows one.
    pub sysroot_base_image: Option<String>,
    /// Architecture tag exported to the build environment (e.g. `aarch64`).
    pub target_arch: String,
    /// GNU target triple (e.g. `aarch64-linux-gnu`).
    pub target_triple: String,
}

/// Descriptor absent from the platform catalog.
#[derive(Debug, thiserror::Error)]
#[error("unknown platform ({descriptor}); not registered in the platform catalog")]
pub struct UnknownPlatform {
    pub descriptor: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogToml {
    platform: Vec<CatalogEntryToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogEntryToml {
    arch: String,
    os: String,
    distro: String,
    rmw: String,
    sysroot_base_image: Option<String>,
    target_arch: String,
    target_triple: String,
}

const BUILTIN_CATALOG: &str = include_str!("platforms.toml");

/// Read-only platform table, built once at process start.
#[derive(Debug)]
pub struct PlatformCatalog {
    entries: Vec<(PlatformDescriptor, PlatformProfile)>,
}

impl PlatformCatalog {
    /// Parse the catalog shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_CATALOG).context("parsing built-in platform catalog")
    }

    /// Parse a catalog from TOML text. Duplicate descriptors are rejected.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let parsed: CatalogToml = toml::from_str(raw).context("parsing platform catalog TOML")?;

        let mut entries: Vec<(PlatformDescriptor, PlatformProfile)> = Vec::new();
        for entry in parsed.platform {
            let descriptor = PlatformDescriptor::new(entry.arch, entry.os, entry.distro, entry.rmw);
            if entries.iter().any(|(d, _)| *d == descriptor) {
                bail!("duplicate platform catalog entry for ({descriptor})");
            }
            let profile = PlatformProfile {
                sysroot_base_image: entry.sysroot_base_image,
                target_arch: entry.target_arch,
                target_triple: entry.target_triple,
            };
            entries.push((descriptor, profile));
        }

        Ok(Self { entries })
    }

    /// Look up the build parameters for a descriptor.
    ///
    /// Fails with [`UnknownPlatform`] for any descriptor that is not a
    /// registered catalog key; there is no default.
    pub fn resolve(
        &self,
        descriptor: &PlatformDescriptor,
    ) -> Result<&PlatformProfile, UnknownPlatform> {
        self.entries
            .iter()
            .find(|(d, _)| d == descriptor)
            .map(|(_, profile)| profile)
            .ok_or_else(|| UnknownPlatform {
                descriptor: descriptor.to_string(),
            })
    }

    /// Number of registered platforms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
