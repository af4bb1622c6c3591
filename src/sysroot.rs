//! The sysroot provisioning pipeline.
//!
//! Sequential, single-threaded: pull, build, run, export, stop, extract,
//! cleanup. Each stage blocks until complete; no stage retries. The only
//! automatic recovery on failure is resource release (container stop,
//! scratch deletion).

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::engine::{ContainerEngine, ImageBuildSpec};
use crate::export::export_filesystem;
use crate::extract::{extract_sysroot, ScratchDir};
use crate::image::{build_workspace_image, workspace_image_tag, write_workspace_dockerfile};
use crate::platform::PlatformProfile;
use crate::root::CcRoot;

/// Options for one sysroot setup invocation.
#[derive(Debug, Clone)]
pub struct SetupOptions {
    /// Base image override from the command line, when given.
    pub base_image: Option<String>,
    /// Engine network mode for image builds.
    pub network_mode: String,
    /// When false, the engine's layer cache is bypassed.
    pub cache_enabled: bool,
    /// Rebuild even when a sysroot already exists.
    pub force: bool,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            base_image: None,
            network_mode: "host".to_string(),
            cache_enabled: true,
            force: false,
        }
    }
}

/// Resolve the base image for a platform.
///
/// An explicit override wins; otherwise the catalog entry is used. There is
/// no derivation rule: when neither is present this fails fast.
pub fn resolve_base_image(override_image: Option<&str>, profile: &PlatformProfile) -> Result<String> {
    if let Some(image) = override_image {
        return Ok(image.to_string());
    }
    match &profile.sysroot_base_image {
        Some(image) => Ok(image.clone()),
        None => bail!(
            "no sysroot base image registered for this platform; pass --sysroot-base-image"
        ),
    }
}

/// Ensure a sysroot exists under the platform root, building it if needed.
///
/// The cache is coarse: when `force` is unset and the sysroot directory
/// exists, the whole image build and export is skipped and the existing path
/// returned unchanged. Staleness detection is the caller's responsibility.
pub fn setup_sysroot(
    engine: &dyn ContainerEngine,
    root: &CcRoot,
    profile: &PlatformProfile,
    distro: &str,
    workspace: &Path,
    opts: &SetupOptions,
) -> Result<PathBuf> {
    let target = root.sysroot_dir();

    if !opts.force && target.exists() {
        println!("Using existing sysroot path [{}]", target.display());
        return Ok(target);
    }
    if !target.exists() {
        println!(
            "No sysroot found at path [{}], building it now",
            target.display()
        );
    } else {
        println!("Forced sysroot re-build");
    }

    let base_image = resolve_base_image(opts.base_image.as_deref(), profile)?;
    let tag = workspace_image_tag(workspace);
    let dockerfile = write_workspace_dockerfile(root)?;

    let spec = ImageBuildSpec {
        build_args: vec![
            ("BASE_IMAGE".to_string(), base_image.clone()),
            ("WORKSPACE".to_string(), ".".to_string()),
            ("DISTRO".to_string(), distro.to_string()),
            ("TARGET_TRIPLE".to_string(), profile.target_triple.clone()),
        ],
        base_image,
        dockerfile,
        context_dir: workspace.to_path_buf(),
        tag: tag.clone(),
        cache_enabled: opts.cache_enabled,
        network_mode: opts.network_mode.clone(),
    };
    build_workspace_image(engine, &spec)?;

    provision(engine, &tag, &target)?;
    println!("Success exporting sysroot to path [{}]", target.display());

    Ok(target)
}

/// Export the image filesystem into a scratch archive and extract the
/// allow-listed subset into `target`. The scratch directory and archive are
/// deleted on every exit path.
fn provision(engine: &dyn ContainerEngine, tag: &str, target: &Path) -> Result<usize> {
    let scratch = ScratchDir::create("sysroot-export")?;
    let archive = scratch.path().join("sysroot.tar");

    println!(
        "Exporting filesystem of image {} into archive {}",
        tag,
        archive.display()
    );
    export_filesystem(engine, tag, &archive)?;

    let count = extract_sysroot(&archive, target)
        .with_context(|| format!("extracting sysroot into '{}'", target.display()))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub::StubEngine;
    use crate::platform::{PlatformCatalog, PlatformDescriptor};
    use crate::root::ensure_cc_root;
    use std::fs;
    use tempfile::TempDir;

    fn profile() -> PlatformProfile {
        PlatformProfile {
            sysroot_base_image: Some("registry.example/arm64-base:bionic".to_string()),
            target_arch: "aarch64".to_string(),
            target_triple: "aarch64-linux-gnu".to_string(),
        }
    }

    fn engine_with_sample_archive() -> StubEngine {
        StubEngine::new(StubEngine::tar_archive(&[
            ("lib/x.so", b"ELF".as_slice()),
            ("usr/y", b"data".as_slice()),
            ("notrelevant/z", b"junk".as_slice()),
        ]))
    }

    fn root_in(tmp: &TempDir) -> crate::root::CcRoot {
        let descriptor =
            PlatformDescriptor::new("generic_arm64", "ubuntu_bionic", "crystal", "fastrtps");
        ensure_cc_root(tmp.path(), &descriptor).unwrap()
    }

    #[test]
    fn full_pipeline_extracts_allowlisted_sysroot() {
        let tmp = TempDir::new().unwrap();
        let root = root_in(&tmp);
        let engine = engine_with_sample_archive();

        let target = setup_sysroot(
            &engine,
            &root,
            &profile(),
            "crystal",
            tmp.path(),
            &SetupOptions::default(),
        )
        .unwrap();

        assert_eq!(target, root.sysroot_dir());
        assert!(target.join("lib/x.so").is_file());
        assert!(target.join("usr/y").is_file());
        assert!(!target.join("notrelevant").exists());

        // Full engine lifecycle, in order.
        let calls = engine.calls.borrow();
        let lifecycle: Vec<&str> = calls
            .iter()
            .map(|call| call.split(':').next().unwrap())
            .collect();
        assert_eq!(lifecycle, ["pull", "build", "run", "export", "stop"]);
    }

    #[test]
    fn existing_sysroot_short_circuits_the_pipeline() {
        let tmp = TempDir::new().unwrap();
        let root = root_in(&tmp);
        fs::create_dir_all(root.sysroot_dir().join("usr")).unwrap();
        fs::write(root.sysroot_dir().join("usr/keep"), "cached").unwrap();

        let engine = engine_with_sample_archive();
        let target = setup_sysroot(
            &engine,
            &root,
            &profile(),
            "crystal",
            tmp.path(),
            &SetupOptions::default(),
        )
        .unwrap();

        assert!(engine.calls.borrow().is_empty());
        assert_eq!(
            fs::read_to_string(target.join("usr/keep")).unwrap(),
            "cached"
        );
    }

    #[test]
    fn force_rebuild_replaces_existing_contents() {
        let tmp = TempDir::new().unwrap();
        let root = root_in(&tmp);
        fs::create_dir_all(root.sysroot_dir().join("usr")).unwrap();
        fs::write(root.sysroot_dir().join("usr/keep"), "cached").unwrap();

        let engine = engine_with_sample_archive();
        let opts = SetupOptions {
            force: true,
            ..SetupOptions::default()
        };
        let target =
            setup_sysroot(&engine, &root, &profile(), "crystal", tmp.path(), &opts).unwrap();

        assert_eq!(engine.call_count("build:"), 1);
        assert!(!target.join("usr/keep").exists());
        assert!(target.join("lib/x.so").is_file());
    }

    #[test]
    fn missing_base_image_fails_fast() {
        let mut profile = profile();
        profile.sysroot_base_image = None;
        let err = resolve_base_image(None, &profile).unwrap_err();
        assert!(err.to_string().contains("--sysroot-base-image"));

        let resolved = resolve_base_image(Some("override:latest"), &profile).unwrap();
        assert_eq!(resolved, "override:latest");
    }

    #[test]
    fn override_wins_over_catalog_image() {
        let resolved = resolve_base_image(Some("override:latest"), &profile()).unwrap();
        assert_eq!(resolved, "override:latest");
    }

    #[test]
    fn build_failure_aborts_before_export() {
        let tmp = TempDir::new().unwrap();
        let root = root_in(&tmp);
        let mut engine = engine_with_sample_archive();
        engine.fail_build = true;

        let result = setup_sysroot(
            &engine,
            &root,
            &profile(),
            "crystal",
            tmp.path(),
            &SetupOptions::default(),
        );

        assert!(result.is_err());
        assert!(!engine.called("run:"));
        assert!(!engine.called("export:"));
        assert!(!root.sysroot_dir().exists());
    }

    #[test]
    fn end_to_end_catalog_scenario() {
        // Descriptor (generic_arm64, ubuntu_bionic, crystal, fastrtps)
        // resolves to aarch64 / aarch64-linux-gnu and a 3-entry archive
        // yields exactly the two allow-listed members.
        let catalog = PlatformCatalog::builtin().unwrap();
        let descriptor =
            PlatformDescriptor::new("generic_arm64", "ubuntu_bionic", "crystal", "fastrtps");
        let resolved = catalog.resolve(&descriptor).unwrap();
        assert_eq!(resolved.target_arch, "aarch64");
        assert_eq!(resolved.target_triple, "aarch64-linux-gnu");

        let tmp = TempDir::new().unwrap();
        let root = ensure_cc_root(tmp.path(), &descriptor).unwrap();
        let engine = engine_with_sample_archive();
        let opts = SetupOptions {
            base_image: Some("registry.example/arm64-base:bionic".to_string()),
            ..SetupOptions::default()
        };

        let target = setup_sysroot(
            &engine,
            &root,
            resolved,
            &descriptor.distro,
            tmp.path(),
            &opts,
        )
        .unwrap();

        let mut found: Vec<String> = walkdir::WalkDir::new(&target)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                entry
                    .path()
                    .strip_prefix(&target)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        found.sort();
        assert_eq!(found, ["lib/x.so", "usr/y"]);
    }
}
