//! Container filesystem export.
//!
//! Runs a detached container from the workspace image and streams its whole
//! filesystem into a tar archive on disk. The export primitive has no
//! server-side path filter, so the full image is exported here and the
//! allow-list is applied later at extraction time.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

use crate::engine::{ContainerEngine, ContainerId};

/// Running container whose stop is guaranteed when the guard leaves scope.
///
/// The guard exists only after `run_detached` has returned a handle; a
/// failure to start the container leaves nothing to stop. Stop failures on
/// the drop path are logged and never mask the primary error.
struct RunningContainer<'a> {
    engine: &'a dyn ContainerEngine,
    id: ContainerId,
    stopped: bool,
}

impl<'a> RunningContainer<'a> {
    fn new(engine: &'a dyn ContainerEngine, id: ContainerId) -> Self {
        Self {
            engine,
            id,
            stopped: false,
        }
    }

    fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Explicit stop, surfacing the engine error on the happy path.
    fn stop(mut self) -> Result<()> {
        self.stopped = true;
        self.engine
            .stop(&self.id)
            .with_context(|| format!("stopping container {}", self.id))
    }
}

impl Drop for RunningContainer<'_> {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        if let Err(err) = self.engine.stop(&self.id) {
            eprintln!("warning: failed to stop container {}: {err:#}", self.id);
        }
    }
}

/// Run a detached container from `tag` and export its filesystem to `dest`.
///
/// The container is stopped whether the export succeeds or fails; an export
/// failure propagates only after the stop has run.
pub fn export_filesystem(engine: &dyn ContainerEngine, tag: &str, dest: &Path) -> Result<()> {
    let id = engine
        .run_detached(tag)
        .with_context(|| format!("starting container from image '{tag}'"))?;
    let container = RunningContainer::new(engine, id);

    let mut out = File::create(dest)
        .with_context(|| format!("creating export archive '{}'", dest.display()))?;
    engine
        .export(container.id(), &mut out)
        .with_context(|| format!("exporting filesystem of image '{tag}'"))?;

    container.stop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub::StubEngine;
    use tempfile::TempDir;

    #[test]
    fn exports_archive_and_stops_container() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("sysroot.tar");
        let engine = StubEngine::new(b"archive-bytes".to_vec());

        export_filesystem(&engine, "ws:latest", &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"archive-bytes");
        let calls = engine.calls.borrow();
        assert_eq!(
            calls.as_slice(),
            &[
                "run:ws:latest",
                "export:stub-container",
                "stop:stub-container"
            ]
        );
    }

    #[test]
    fn container_is_stopped_when_export_fails() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("sysroot.tar");
        let mut engine = StubEngine::new(Vec::new());
        engine.fail_export = true;

        let err = export_filesystem(&engine, "ws:latest", &dest).unwrap_err();
        assert!(err.to_string().contains("exporting filesystem"));
        assert!(engine.called("stop:stub-container"));
    }

    #[test]
    fn stop_happens_once_on_success() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("sysroot.tar");
        let engine = StubEngine::new(Vec::new());

        export_filesystem(&engine, "ws:latest", &dest).unwrap();
        assert_eq!(engine.call_count("stop:"), 1);
    }
}
