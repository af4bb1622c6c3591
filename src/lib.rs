//! Container-backed sysroot provisioning for cross-compilation.
//!
//! This crate prepares a target-platform root filesystem ("sysroot") so a
//! workspace can be cross-compiled for a foreign architecture/OS pair. It
//! does not cross-compile anything itself; it builds the environment and
//! delegates the build to an outer orchestrator.
//!
//! # Pipeline
//!
//! ```text
//! descriptor ─► platform catalog ─► profile
//!                                     │
//!                 platform root ◄─────┘
//!                      │
//!            [sysroot exists?] ──yes──► reuse
//!                      │no/force
//!            pull base image
//!            build workspace image
//!            run container / export filesystem / stop container
//!            extract allow-listed directories ─► <root>/sysroot/
//!            write setup scripts + toolchain file
//! ```
//!
//! The container engine is injected (see [`engine::ContainerEngine`]) so the
//! pipeline can be exercised against a stub. The two scoped resources - the
//! running container and the export scratch directory - are released on
//! every exit path.
//!
//! Concurrent invocations against the same platform root are not supported;
//! there is no locking discipline and no retry anywhere in the pipeline.

pub mod engine;
pub mod export;
pub mod extract;
pub mod image;
pub mod orchestrator;
pub mod platform;
pub mod root;
pub mod scripts;
pub mod sysroot;

pub use engine::{BuildError, ContainerEngine, ContainerId, ImageBuildSpec};
pub use platform::{PlatformCatalog, PlatformDescriptor, PlatformProfile, UnknownPlatform};
pub use root::{ensure_cc_root, CcRoot};
pub use sysroot::{setup_sysroot, SetupOptions};
