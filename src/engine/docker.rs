//! Container engine driven through the `docker` command-line client.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use super::{BuildError, ContainerEngine, ContainerId, ImageBuildSpec};

/// Engine implementation that shells out to `docker`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
}

impl DockerCli {
    /// Locate `docker` on PATH.
    pub fn from_path() -> Result<Self> {
        let program = which::which("docker")
            .context("docker not found on PATH; install docker to provision sysroots")?;
        Ok(Self { program })
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }
}

/// Argument vector for `docker build`, derived from the build spec.
fn build_cli_args(spec: &ImageBuildSpec) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "--file".to_string(),
        spec.dockerfile.display().to_string(),
        "--tag".to_string(),
        spec.tag.clone(),
        "--network".to_string(),
        spec.network_mode.clone(),
    ];
    if !spec.cache_enabled {
        args.push("--no-cache".to_string());
    }
    for (key, value) in &spec.build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.context_dir.display().to_string());
    args
}

impl ContainerEngine for DockerCli {
    fn pull(&self, image: &str) -> Result<()> {
        let output = self
            .command()
            .args(["pull", image])
            .output()
            .with_context(|| format!("running docker pull for '{image}'"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("failed to pull image '{}': {}", image, stderr.trim());
        }
        Ok(())
    }

    fn build(&self, spec: &ImageBuildSpec) -> Result<Vec<String>> {
        let mut child = self
            .command()
            .args(build_cli_args(spec))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning docker build for tag '{}'", spec.tag))?;

        let stdout = child.stdout.take().context("capturing docker build stdout")?;
        let stderr = child.stderr.take().context("capturing docker build stderr")?;

        // One channel fed by both streams; each log record is one line.
        let (tx, rx) = mpsc::channel::<String>();
        let tx_err = tx.clone();
        let out_reader = thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        let err_reader = thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                if tx_err.send(line).is_err() {
                    break;
                }
            }
        });

        let mut log = Vec::new();
        for line in rx {
            println!("{line}");
            log.push(line);
        }
        let _ = out_reader.join();
        let _ = err_reader.join();

        let status = child
            .wait()
            .with_context(|| format!("waiting for docker build of tag '{}'", spec.tag))?;

        if !status.success() {
            let message = log
                .iter()
                .rev()
                .find(|line| !line.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| format!("docker build exited with {status}"));
            return Err(BuildError { message, log }.into());
        }

        Ok(log)
    }

    fn run_detached(&self, tag: &str) -> Result<ContainerId> {
        let output = self
            .command()
            .args(["run", "--detach", tag])
            .output()
            .with_context(|| format!("running docker run for image '{tag}'"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "failed to start container from image '{}': {}",
                tag,
                stderr.trim()
            );
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            bail!("docker run returned no container id for image '{tag}'");
        }
        Ok(ContainerId(id))
    }

    fn export(&self, id: &ContainerId, out: &mut dyn io::Write) -> Result<()> {
        let mut child = self
            .command()
            .args(["export", id.0.as_str()])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning docker export for container {id}"))?;

        let mut stdout = child.stdout.take().context("capturing docker export stdout")?;
        let stderr = child.stderr.take().context("capturing docker export stderr")?;
        let err_reader = thread::spawn(move || {
            let mut text = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut text);
            text
        });

        let copied = io::copy(&mut stdout, out)
            .with_context(|| format!("streaming filesystem export of container {id}"))?;

        let status = child
            .wait()
            .with_context(|| format!("waiting for docker export of container {id}"))?;
        let stderr_text = err_reader.join().unwrap_or_default();

        if !status.success() {
            bail!(
                "failed to export container {} after {} bytes: {}",
                id,
                copied,
                stderr_text.trim()
            );
        }
        Ok(())
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        let output = self
            .command()
            .args(["stop", id.0.as_str()])
            .output()
            .with_context(|| format!("running docker stop for container {id}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("failed to stop container {}: {}", id, stderr.trim());
        }
        Ok(())
    }
}
