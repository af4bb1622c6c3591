//! Generated setup artifacts.
//!
//! Three files are written under the platform root, all pure functions of
//! the root path and the resolved platform profile, so identical inputs
//! produce byte-identical output:
//!
//! - `cc_build_setup.bash` - sourced into a shell to configure a
//!   cross-compilation session.
//! - `cc_system_setup.bash` - executed once with elevated privileges to
//!   point the host's target-triple library paths into the sysroot. The
//!   backup name is timestamped by the shell at execution time, keeping the
//!   generated file itself deterministic.
//! - `toolchain.cmake` - toolchain file consumed by the outer build
//!   orchestrator, reading the variables exported by `cc_build_setup.bash`.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::platform::PlatformProfile;
use crate::root::CcRoot;

pub const ENV_SCRIPT_NAME: &str = "cc_build_setup.bash";
pub const FIXUP_SCRIPT_NAME: &str = "cc_system_setup.bash";
pub const TOOLCHAIN_FILE_NAME: &str = "toolchain.cmake";

const ENV_SETUP_TEMPLATE: &str = r#"if [ -d @distro_root@ ]
then
    source @distro_root@/setup.bash
else
    echo "WARNING: no target distribution found on the sysroot"
fi

export TARGET_ARCH=@target_arch@
export TARGET_TRIPLE=@target_triple@
export CC_ROOT=@cc_root@
"#;

// The host toolchain links against its own glibc while the sysroot carries
// the target's; redirecting the host's target-triple library paths into the
// sysroot is a workaround for that version mismatch, not a general solution.
const SYSTEM_FIXUP_TEMPLATE: &str = r#"sudo rm -f /lib/@target_triple@
sudo ln -s @cc_root@/sysroot/lib/@target_triple@ /lib/@target_triple@
sudo rm -f /usr/lib/@target_triple@
sudo ln -s @cc_root@/sysroot/usr/lib/@target_triple@ /usr/lib/@target_triple@

CROSS_COMPILER_LIB=/usr/@target_triple@/lib
CROSS_COMPILER_LIB_BAK=${CROSS_COMPILER_LIB}_$(date +%s).bak
echo "Backing up ${CROSS_COMPILER_LIB} to ${CROSS_COMPILER_LIB_BAK}"
sudo mv ${CROSS_COMPILER_LIB} ${CROSS_COMPILER_LIB_BAK}
sudo ln -s @cc_root@/sysroot/lib/@target_triple@ ${CROSS_COMPILER_LIB}
"#;

const TOOLCHAIN_TEMPLATE: &str = r#"set(CMAKE_SYSTEM_NAME Linux)
set(CMAKE_SYSTEM_PROCESSOR $ENV{TARGET_ARCH})
set(CMAKE_SYSROOT $ENV{CC_ROOT}/sysroot)

set(CMAKE_C_COMPILER /usr/bin/$ENV{TARGET_TRIPLE}-gcc)
set(CMAKE_CXX_COMPILER /usr/bin/$ENV{TARGET_TRIPLE}-g++)

set(CMAKE_FIND_ROOT_PATH_MODE_PROGRAM NEVER)
set(CMAKE_FIND_ROOT_PATH_MODE_LIBRARY ONLY)
set(CMAKE_FIND_ROOT_PATH_MODE_INCLUDE ONLY)
set(CMAKE_FIND_ROOT_PATH_MODE_PACKAGE ONLY)
"#;

/// Substitute `@key@` placeholders into a fixed template.
///
/// Every supplied value must be used and every placeholder must be supplied;
/// either mismatch is an error, so a template edit cannot silently drop a
/// substitution.
fn render(template: &str, values: &[(&str, &str)]) -> Result<String> {
    let mut out = template.to_string();
    for (key, value) in values {
        let needle = format!("@{key}@");
        if !out.contains(&needle) {
            bail!("template does not use placeholder '{needle}'");
        }
        out = out.replace(&needle, value);
    }
    if let Some(leftover) = find_placeholder(&out) {
        bail!("template placeholder '{leftover}' was not supplied");
    }
    Ok(out)
}

/// Locate a remaining `@name@` token, where `name` is lowercase/underscore.
fn find_placeholder(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(start) = rest.find('@') {
        let tail = &rest[start + 1..];
        match tail.find('@') {
            Some(end) => {
                let name = &tail[..end];
                if !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
                {
                    return Some(&rest[start..start + end + 2]);
                }
                rest = tail;
            }
            None => return None,
        }
    }
    None
}

/// Write the environment setup script, returning its path.
pub fn write_env_script(root: &CcRoot, profile: &PlatformProfile, distro: &str) -> Result<PathBuf> {
    let path = root.path().join(ENV_SCRIPT_NAME);
    let distro_root = format!("{}/sysroot/opt/ros/{}", root.path().display(), distro);
    let cc_root = root.path().display().to_string();
    let contents = render(
        ENV_SETUP_TEMPLATE,
        &[
            ("distro_root", distro_root.as_str()),
            ("target_arch", profile.target_arch.as_str()),
            ("target_triple", profile.target_triple.as_str()),
            ("cc_root", cc_root.as_str()),
        ],
    )
    .context("rendering environment setup script")?;
    fs::write(&path, contents)
        .with_context(|| format!("writing environment setup script '{}'", path.display()))?;
    Ok(path)
}

/// Write the host library-path fixup script, returning its path.
pub fn write_system_fixup_script(root: &CcRoot, profile: &PlatformProfile) -> Result<PathBuf> {
    let path = root.path().join(FIXUP_SCRIPT_NAME);
    let cc_root = root.path().display().to_string();
    let contents = render(
        SYSTEM_FIXUP_TEMPLATE,
        &[
            ("target_triple", profile.target_triple.as_str()),
            ("cc_root", cc_root.as_str()),
        ],
    )
    .context("rendering system fixup script")?;
    fs::write(&path, contents)
        .with_context(|| format!("writing system fixup script '{}'", path.display()))?;
    Ok(path)
}

/// Write the CMake toolchain file consumed by the outer build orchestrator.
pub fn write_toolchain_file(root: &CcRoot) -> Result<PathBuf> {
    let path = root.path().join(TOOLCHAIN_FILE_NAME);
    fs::write(&path, TOOLCHAIN_TEMPLATE)
        .with_context(|| format!("writing toolchain file '{}'", path.display()))?;
    Ok(path)
}
