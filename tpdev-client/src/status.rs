//! `telepresence status` snapshots

use tpdev_core::{BinaryHandle, CommandRunner, StatusSnapshot};
use tracing::debug;

pub struct StatusReporter<'a> {
    binary: &'a BinaryHandle,
    runner: &'a dyn CommandRunner,
}

impl<'a> StatusReporter<'a> {
    pub fn new(binary: &'a BinaryHandle, runner: &'a dyn CommandRunner) -> Self {
        Self { binary, runner }
    }

    /// Structured status, or the raw text when it cannot be read as a JSON object.
    pub fn status(&self) -> StatusSnapshot {
        let out = match self.runner.run(self.binary.path(), &["status", "--output=json"]) {
            Ok(out) => out,
            Err(e) => return StatusSnapshot::raw(e.to_string()),
        };

        if !out.success() {
            return StatusSnapshot::raw(out.failure_text());
        }

        match serde_json::from_str::<serde_json::Value>(&out.stdout) {
            Ok(serde_json::Value::Object(object)) => StatusSnapshot::structured(object),
            Ok(_) => {
                debug!("status output is JSON but not an object");
                StatusSnapshot::raw(out.stdout)
            }
            Err(e) => {
                debug!(error = %e, "status output is not JSON");
                StatusSnapshot::raw(out.stdout)
            }
        }
    }
}
