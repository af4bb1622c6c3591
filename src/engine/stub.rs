//! In-memory engine fake used by pipeline tests.

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::io::Write;

use super::{BuildError, ContainerEngine, ContainerId, ImageBuildSpec};

/// Records every engine call and serves a canned export archive.
pub(crate) struct StubEngine {
    pub calls: RefCell<Vec<String>>,
    pub archive: Vec<u8>,
    pub fail_pull: bool,
    pub fail_build: bool,
    pub fail_export: bool,
}

impl StubEngine {
    pub fn new(archive: Vec<u8>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            archive,
            fail_pull: false,
            fail_build: false,
            fail_export: false,
        }
    }

    /// Build a tar archive from (path, contents) pairs.
    pub fn tar_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls
            .borrow()
            .iter()
            .any(|call| call.starts_with(prefix))
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

impl ContainerEngine for StubEngine {
    fn pull(&self, image: &str) -> Result<()> {
        self.record(format!("pull:{image}"));
        if self.fail_pull {
            bail!("stub pull failure for '{image}'");
        }
        Ok(())
    }

    fn build(&self, spec: &ImageBuildSpec) -> Result<Vec<String>> {
        self.record(format!("build:{}", spec.tag));
        if self.fail_build {
            return Err(BuildError {
                message: "stub build failure".to_string(),
                log: vec!["step 1/1 : FROM base".to_string(), "boom".to_string()],
            }
            .into());
        }
        Ok(vec![format!("successfully tagged {}", spec.tag)])
    }

    fn run_detached(&self, tag: &str) -> Result<ContainerId> {
        self.record(format!("run:{tag}"));
        Ok(ContainerId("stub-container".to_string()))
    }

    fn export(&self, id: &ContainerId, out: &mut dyn Write) -> Result<()> {
        self.record(format!("export:{id}"));
        if self.fail_export {
            bail!("stub export failure");
        }
        out.write_all(&self.archive)?;
        Ok(())
    }

    fn stop(&self, id: &ContainerId) -> Result<()> {
        self.record(format!("stop:{id}"));
        Ok(())
    }
}
