//! Delegation to the outer multi-package build orchestrator.
//!
//! The cross-compile build itself is not performed here. Once a sysroot
//! exists, the orchestrator is invoked with the platform root's build and
//! install trees and the generated toolchain file; its exit status is the
//! result.

use anyhow::{bail, Context, Result};
use std::process::Command;

use crate::root::CcRoot;
use crate::scripts::{write_toolchain_file, TOOLCHAIN_FILE_NAME};

/// Default orchestrator program invoked by the build verb.
pub const DEFAULT_BUILD_TOOL: &str = "colcon";

/// Argument vector passed to the orchestrator's `build` verb.
fn orchestrator_args(root: &CcRoot, passthrough: &[String]) -> Vec<String> {
    let toolchain = root.path().join(TOOLCHAIN_FILE_NAME);
    let mut args = vec![
        "build".to_string(),
        "--build-base".to_string(),
        root.build_dir().display().to_string(),
        "--install-base".to_string(),
        root.install_dir().display().to_string(),
        "--merge-install".to_string(),
        "--cmake-force-configure".to_string(),
        "--cmake-args".to_string(),
        "-DCMAKE_VERBOSE_MAKEFILE:BOOL=ON".to_string(),
        format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain.display()),
    ];
    args.extend(passthrough.iter().cloned());
    args
}

/// Run the outer build orchestrator against the platform root.
///
/// The toolchain file is (re)generated first; it is deterministic, so
/// rewriting is harmless. Extra arguments are passed through untouched.
pub fn run_cross_build(root: &CcRoot, program: &str, passthrough: &[String]) -> Result<()> {
    write_toolchain_file(root)?;

    let args = orchestrator_args(root, passthrough);
    println!("Invoking build orchestrator: {} {}", program, args.join(" "));
    let status = Command::new(program)
        .args(&args)
        .status()
        .with_context(|| format!("running build orchestrator '{program}'"))?;

    if !status.success() {
        bail!("build orchestrator '{}' failed with status {}", program, status);
    }
    Ok(())
}
