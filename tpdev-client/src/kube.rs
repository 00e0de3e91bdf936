//! kubectl wrapper for the few cluster lookups tpdev needs

use tpdev_core::{CommandRunner, TpError};
use tracing::{debug, info, warn};

pub struct Kubectl<'a> {
    program: &'a str,
    runner: &'a dyn CommandRunner,
}

impl<'a> Kubectl<'a> {
    pub fn new(program: &'a str, runner: &'a dyn CommandRunner) -> Self {
        Self { program, runner }
    }

    pub fn namespace_exists(&self, namespace: &str) -> tpdev_core::Result<bool> {
        let out = self.runner.run(self.program, &["get", "ns", namespace])?;
        Ok(out.success())
    }

    /// Create `namespace` unless it exists. Returns true when it was created.
    pub fn ensure_namespace(&self, namespace: &str) -> tpdev_core::Result<bool> {
        if self.namespace_exists(namespace)? {
            debug!(namespace, "namespace exists");
            return Ok(false);
        }

        let out = self.runner.run(self.program, &["create", "ns", namespace])?;
        if !out.success() {
            return Err(TpError::NamespaceCreate {
                namespace: namespace.to_string(),
                message: out.failure_text().to_string(),
            });
        }
        info!(namespace, "created namespace");
        Ok(true)
    }

    /// JSON body of a deployment, or None when the lookup fails for any reason.
    pub fn deployment_json(&self, namespace: &str, name: &str) -> Option<String> {
        match self
            .runner
            .run(self.program, &["-n", namespace, "get", "deploy", name, "-o", "json"])
        {
            Ok(out) if out.success() => Some(out.stdout),
            Ok(out) => {
                debug!(namespace, name, stderr = %out.stderr, "deployment lookup failed");
                None
            }
            Err(e) => {
                warn!(namespace, name, error = %e, "could not run kubectl");
                None
            }
        }
    }
}
