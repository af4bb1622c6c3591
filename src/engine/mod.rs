//! Container engine abstraction.
//!
//! The provisioning pipeline drives a container engine through a fixed
//! lifecycle: pull the base image, build the derived workspace image, run a
//! detached container, export its filesystem, stop the container. The engine
//! is an explicit collaborator passed into the components that need it, so
//! tests can substitute a stub.
//!
//! The production implementation is [`docker::DockerCli`].

pub mod docker;
#[cfg(test)]
pub(crate) mod stub;

use anyhow::Result;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// Handle to a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerId(pub String);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters for one derived workspace image build.
///
/// Constructed per invocation, never persisted.
#[derive(Debug, Clone)]
pub struct ImageBuildSpec {
    /// Image the build starts from; pulled before building.
    pub base_image: String,
    /// Dockerfile driving the build.
    pub dockerfile: PathBuf,
    /// Build context directory (the workspace).
    pub context_dir: PathBuf,
    /// `--build-arg` key/value pairs.
    pub build_args: Vec<(String, String)>,
    /// Tag applied to the built image.
    pub tag: String,
    /// When false, the engine's layer cache is bypassed.
    pub cache_enabled: bool,
    /// Engine network mode used during the build.
    pub network_mode: String,
}

/// Image build failure carrying the engine's message and the full build log.
///
/// Both are surfaced to the operator verbatim; nothing is summarized away.
#[derive(Debug, thiserror::Error)]
#[error("image build failed: {message}")]
pub struct BuildError {
    pub message: String,
    pub log: Vec<String>,
}

/// Operations the pipeline needs from a container engine.
pub trait ContainerEngine {
    /// Pull an image from the registry. Fatal on failure; no partial image
    /// is left tagged.
    fn pull(&self, image: &str) -> Result<()>;

    /// Build the derived image described by `spec`.
    ///
    /// Log lines are streamed to the operator as they are produced and the
    /// complete log is returned. Failures carry a [`BuildError`].
    fn build(&self, spec: &ImageBuildSpec) -> Result<Vec<String>>;

    /// Start a detached container from a tagged image.
    fn run_detached(&self, tag: &str) -> Result<ContainerId>;

    /// Stream the container's entire filesystem as a tar archive into `out`.
    fn export(&self, id: &ContainerId, out: &mut dyn Write) -> Result<()>;

    /// Stop a running container.
    fn stop(&self, id: &ContainerId) -> Result<()>;
}
