use std::env;

use anyhow::{bail, Context, Result};
use sysroot_builder::engine::docker::DockerCli;
use sysroot_builder::orchestrator::{run_cross_build, DEFAULT_BUILD_TOOL};
use sysroot_builder::scripts::{write_env_script, write_system_fixup_script, write_toolchain_file};
use sysroot_builder::{
    ensure_cc_root, setup_sysroot, PlatformCatalog, PlatformDescriptor, SetupOptions,
};

const DEFAULT_DISTRO: &str = "crystal";
const DEFAULT_RMW: &str = "fastrtps";
const DEFAULT_NETWORK_MODE: &str = "host";

fn usage() -> &'static str {
    "Usage:\n  \
     sysroot-builder setup-sysroot --arch <arch> --os <os> [--distro <distro>] [--rmw <rmw>]\n      \
     [--sysroot-base-image <image>] [--docker-network-mode <mode>]\n      \
     [--sysroot-nocache] [--force-sysroot-build]\n  \
     sysroot-builder build --arch <arch> --os <os> [--distro <distro>] [--rmw <rmw>]\n      \
     [--build-tool <program>] [-- <orchestrator args...>]"
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("setup-sysroot") => run_setup(&args[1..]),
        Some("build") => run_build(&args[1..]),
        _ => bail!(usage()),
    }
}

struct PlatformFlags {
    arch: Option<String>,
    os: Option<String>,
    distro: String,
    rmw: String,
}

impl PlatformFlags {
    fn new() -> Self {
        Self {
            arch: None,
            os: None,
            distro: DEFAULT_DISTRO.to_string(),
            rmw: DEFAULT_RMW.to_string(),
        }
    }

    /// Consume a platform flag; true when `flag` was recognized.
    fn accept(&mut self, flag: &str, iter: &mut std::slice::Iter<'_, String>) -> Result<bool> {
        match flag {
            "--arch" => self.arch = Some(flag_value(iter, flag)?),
            "--os" => self.os = Some(flag_value(iter, flag)?),
            "--distro" => self.distro = flag_value(iter, flag)?,
            "--rmw" => self.rmw = flag_value(iter, flag)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn into_descriptor(self) -> Result<PlatformDescriptor> {
        let arch = self.arch.with_context(|| format!("--arch is required\n\n{}", usage()))?;
        let os = self.os.with_context(|| format!("--os is required\n\n{}", usage()))?;
        Ok(PlatformDescriptor::new(arch, os, self.distro, self.rmw))
    }
}

fn flag_value(iter: &mut std::slice::Iter<'_, String>, flag: &str) -> Result<String> {
    iter.next()
        .cloned()
        .with_context(|| format!("missing value for {flag}"))
}

fn run_setup(args: &[String]) -> Result<()> {
    let mut platform = PlatformFlags::new();
    let mut base_image: Option<String> = None;
    let mut network_mode = DEFAULT_NETWORK_MODE.to_string();
    let mut nocache = false;
    let mut force = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if platform.accept(arg, &mut iter)? {
            continue;
        }
        match arg.as_str() {
            "--sysroot-base-image" => base_image = Some(flag_value(&mut iter, arg)?),
            "--docker-network-mode" => network_mode = flag_value(&mut iter, arg)?,
            "--sysroot-nocache" => nocache = true,
            "--force-sysroot-build" => force = true,
            other => bail!("unknown argument '{}'\n\n{}", other, usage()),
        }
    }

    let descriptor = platform.into_descriptor()?;
    let catalog = PlatformCatalog::builtin()?;
    let profile = catalog.resolve(&descriptor)?.clone();

    let workdir = env::current_dir().context("resolving current directory")?;
    let root = ensure_cc_root(&workdir, &descriptor)?;
    let engine = DockerCli::from_path()?;

    let opts = SetupOptions {
        base_image,
        network_mode,
        cache_enabled: !nocache,
        force,
    };
    setup_sysroot(&engine, &root, &profile, &descriptor.distro, &workdir, &opts)?;

    let env_script = write_env_script(&root, &profile, &descriptor.distro)?;
    let fixup_script = write_system_fixup_script(&root, &profile)?;
    write_toolchain_file(&root)?;

    println!(
        "\nTo complete the cross-compilation setup:\n\n\
         1. WORKAROUND: point the host's target libraries at the sysroot's C library:\n\n\
         \tbash {}\n\n\
         2. Source the build environment:\n\n\
         \tsource {}\n",
        fixup_script.display(),
        env_script.display()
    );

    Ok(())
}

fn run_build(args: &[String]) -> Result<()> {
    let mut platform = PlatformFlags::new();
    let mut build_tool = DEFAULT_BUILD_TOOL.to_string();
    let mut passthrough: Vec<String> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if platform.accept(arg, &mut iter)? {
            continue;
        }
        match arg.as_str() {
            "--build-tool" => build_tool = flag_value(&mut iter, arg)?,
            "--" => {
                passthrough = iter.cloned().collect();
                break;
            }
            other => bail!("unknown argument '{}'\n\n{}", other, usage()),
        }
    }

    let descriptor = platform.into_descriptor()?;
    // Validate the platform even though only the root path is needed here.
    let catalog = PlatformCatalog::builtin()?;
    catalog.resolve(&descriptor)?;

    let workdir = env::current_dir().context("resolving current directory")?;
    let root = ensure_cc_root(&workdir, &descriptor)?;

    run_cross_build(&root, &build_tool, &passthrough)
}
