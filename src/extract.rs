//! Sysroot extraction with top-level allow-list filtering.
//!
//! The exported archive holds a full container filesystem; only the
//! directories needed for compiling and linking are materialized. Filtering
//! at extraction time bounds disk usage on the sysroot side while accepting
//! a larger, transient full-image archive.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Top-level directories copied into the sysroot. Every extracted member's
/// first path segment matches exactly one of these.
pub const SYSROOT_DIRS: &[&str] = &["lib", "usr", "etc", "opt", "root_path"];

/// Scratch directory removed when the guard leaves scope.
///
/// Removal failures are logged, never fatal, so cleanup cannot mask the
/// error that unwound the extraction.
#[derive(Debug)]
pub(crate) struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a uniquely named scratch directory under the system temp dir.
    pub fn create(prefix: &str) -> Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
        fs::create_dir_all(&path)
            .with_context(|| format!("creating scratch directory '{}'", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.path) {
            eprintln!(
                "warning: failed to remove scratch directory '{}': {err}",
                self.path.display()
            );
        }
    }
}

/// First normal path segment of an archive member, if any.
fn first_segment(path: &Path) -> Option<&std::ffi::OsStr> {
    path.components().find_map(|component| match component {
        Component::Normal(part) => Some(part),
        _ => None,
    })
}

/// Whether an archive member belongs in the sysroot.
fn is_sysroot_member(path: &Path) -> bool {
    first_segment(path)
        .and_then(|part| part.to_str())
        .map(|part| SYSROOT_DIRS.contains(&part))
        .unwrap_or(false)
}

/// Extract the allow-listed subset of `archive` into `target`.
///
/// Any previous sysroot at `target` is removed first, so a failure part-way
/// leaves no stale mixture; retrying after a failure requires a forced
/// rebuild. Returns the number of members extracted.
pub fn extract_sysroot(archive: &Path, target: &Path) -> Result<usize> {
    if target.exists() {
        fs::remove_dir_all(target)
            .with_context(|| format!("removing previous sysroot '{}'", target.display()))?;
    }
    fs::create_dir_all(target)
        .with_context(|| format!("creating sysroot directory '{}'", target.display()))?;

    let file = File::open(archive)
        .with_context(|| format!("opening export archive '{}'", archive.display()))?;
    let mut tar = tar::Archive::new(file);

    let mut extracted = 0usize;
    let entries = tar
        .entries()
        .with_context(|| format!("reading export archive '{}'", archive.display()))?;
    for entry in entries {
        let mut entry =
            entry.with_context(|| format!("reading member of '{}'", archive.display()))?;
        let member_path = entry
            .path()
            .with_context(|| format!("reading member path in '{}'", archive.display()))?
            .into_owned();
        if !is_sysroot_member(&member_path) {
            continue;
        }
        let unpacked = entry.unpack_in(target).with_context(|| {
            format!(
                "extracting '{}' into '{}'",
                member_path.display(),
                target.display()
            )
        })?;
        if unpacked {
            extracted += 1;
        }
    }

    Ok(extracted)
}
