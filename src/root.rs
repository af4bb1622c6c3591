//! Per-platform working directory management.
//!
//! Each target platform gets one root directory under the workspace,
//! named by the deterministic platform id. The root holds the build and
//! install trees consumed by the outer build orchestrator, the extracted
//! sysroot, and the generated setup scripts.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::platform::PlatformDescriptor;

/// Marker file telling the outer build orchestrator to skip this tree
/// during package discovery.
pub const IGNORE_MARKER: &str = "BUILD_IGNORE";

/// The per-platform root directory.
///
/// Layout:
///
/// ```text
/// <workdir>/<platform id>/
///     BUILD_IGNORE
///     build/
///     install/
///     sysroot/            (created by extraction)
///     cc_build_setup.bash
///     cc_system_setup.bash
///     toolchain.cmake
/// ```
#[derive(Debug, Clone)]
pub struct CcRoot {
    path: PathBuf,
}

impl CcRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build tree consumed by the outer orchestrator.
    pub fn build_dir(&self) -> PathBuf {
        self.path.join("build")
    }

    /// Install tree consumed by the outer orchestrator.
    pub fn install_dir(&self) -> PathBuf {
        self.path.join("install")
    }

    /// Target path of the extracted sysroot.
    pub fn sysroot_dir(&self) -> PathBuf {
        self.path.join("sysroot")
    }
}

/// Compute and lazily create the platform root under `workdir`.
///
/// Idempotent: safe to call repeatedly. The exclusion marker is written on
/// first creation only; existing contents are never deleted here.
pub fn ensure_cc_root(workdir: &Path, descriptor: &PlatformDescriptor) -> Result<CcRoot> {
    let path = workdir.join(descriptor.platform_id());

    if !path.exists() {
        fs::create_dir_all(&path)
            .with_context(|| format!("creating platform root '{}'", path.display()))?;
        let marker = path.join(IGNORE_MARKER);
        fs::write(&marker, "")
            .with_context(|| format!("writing exclusion marker '{}'", marker.display()))?;
    }

    let root = CcRoot { path };
    for dir in [root.build_dir(), root.install_dir()] {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating platform root subdirectory '{}'", dir.display()))?;
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn descriptor() -> PlatformDescriptor {
        PlatformDescriptor::new("generic_arm64", "ubuntu_bionic", "crystal", "fastrtps")
    }

    #[test]
    fn creates_root_with_marker() {
        let tmp = TempDir::new().unwrap();
        let root = ensure_cc_root(tmp.path(), &descriptor()).unwrap();

        assert!(root.path().ends_with("generic_arm64-ubuntu_bionic-fastrtps-crystal"));
        assert!(root.path().join(IGNORE_MARKER).is_file());
        assert!(root.build_dir().is_dir());
        assert!(root.install_dir().is_dir());
        assert!(!root.sysroot_dir().exists());
    }

    #[test]
    fn is_idempotent_and_preserves_contents() {
        let tmp = TempDir::new().unwrap();
        let root = ensure_cc_root(tmp.path(), &descriptor()).unwrap();

        let keep = root.build_dir().join("keep.txt");
        fs::write(&keep, "data").unwrap();
        fs::remove_file(root.path().join(IGNORE_MARKER)).unwrap();

        let again = ensure_cc_root(tmp.path(), &descriptor()).unwrap();
        assert_eq!(root.path(), again.path());
        assert_eq!(fs::read_to_string(&keep).unwrap(), "data");
        // Marker is only written on first creation.
        assert!(!root.path().join(IGNORE_MARKER).exists());
    }
}
