//! Workspace image construction.
//!
//! The sysroot is materialized from a derived image: the platform base image
//! extended with the workspace's build context. The Dockerfile driving that
//! build ships embedded in the binary and is written into the platform root
//! before each build.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{BuildError, ContainerEngine, ImageBuildSpec};
use crate::root::CcRoot;

/// File name of the workspace Dockerfile under the platform root.
pub const DOCKERFILE_NAME: &str = "Dockerfile.workspace";

/// The derived image only exists to be exported, so it does nothing but
/// embed the workspace and stay alive long enough for the export.
const WORKSPACE_DOCKERFILE: &str = r#"ARG BASE_IMAGE
FROM ${BASE_IMAGE}

ARG WORKSPACE=.
ARG DISTRO
ARG TARGET_TRIPLE
ENV DISTRO=${DISTRO}
ENV TARGET_TRIPLE=${TARGET_TRIPLE}

COPY ${WORKSPACE} /root_path/workspace

CMD ["sleep", "infinity"]
"#;

/// Tag of the derived workspace image: `<workspace dir name>:latest`.
pub fn workspace_image_tag(workspace: &Path) -> String {
    let name = workspace
        .file_name()
        .and_then(|part| part.to_str())
        .unwrap_or("workspace");
    format!("{}:latest", name.to_ascii_lowercase())
}

/// Write the embedded workspace Dockerfile under the platform root.
pub fn write_workspace_dockerfile(root: &CcRoot) -> Result<PathBuf> {
    let path = root.path().join(DOCKERFILE_NAME);
    fs::write(&path, WORKSPACE_DOCKERFILE)
        .with_context(|| format!("writing workspace Dockerfile '{}'", path.display()))?;
    Ok(path)
}

/// Pull the base image, then build the derived workspace image.
///
/// Build failures are reported with the engine's message and full build log
/// before the error propagates; nothing is retried.
pub fn build_workspace_image(engine: &dyn ContainerEngine, spec: &ImageBuildSpec) -> Result<()> {
    println!("Fetching sysroot base image {}", spec.base_image);
    engine
        .pull(&spec.base_image)
        .with_context(|| format!("pulling sysroot base image '{}'", spec.base_image))?;

    if let Err(err) = engine.build(spec) {
        eprintln!("Error building sysroot image '{}'", spec.tag);
        if let Some(build_err) = err.downcast_ref::<BuildError>() {
            eprintln!("  Error message: {}", build_err.message);
            eprintln!("  Build log:");
            for line in &build_err.log {
                eprintln!("    {line}");
            }
        }
        return Err(err);
    }

    println!("Workspace sysroot image {} created with success", spec.tag);
    Ok(())
}
