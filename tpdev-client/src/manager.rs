//! Traffic-manager bootstrap: status, install and readiness wait

use crate::kube::Kubectl;
use crate::summary::ManagerReport;
use std::time::{Duration, Instant};
use tpdev_core::config::READY_POLL_INTERVAL;
use tpdev_core::{ActionLog, BinaryHandle, CommandRunner, ManagerStatus, TpError};
use tracing::{debug, info, warn};

pub const TRAFFIC_MANAGER: &str = "traffic-manager";

pub struct ManagerBootstrapper<'a> {
    kubectl: &'a Kubectl<'a>,
    binary: &'a BinaryHandle,
    runner: &'a dyn CommandRunner,
    poll_interval: Duration,
}

impl<'a> ManagerBootstrapper<'a> {
    pub fn new(
        kubectl: &'a Kubectl<'a>,
        binary: &'a BinaryHandle,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            kubectl,
            binary,
            runner,
            poll_interval: READY_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Current traffic-manager state. A failed lookup means "not installed".
    pub fn status(&self, namespace: &str) -> ManagerStatus {
        match self.kubectl.deployment_json(namespace, TRAFFIC_MANAGER) {
            Some(body) => parse_deployment_status(&body),
            None => ManagerStatus::absent(),
        }
    }

    /// Install the traffic manager into `namespace`, creating it if needed.
    pub fn install(&self, namespace: &str, log: &mut ActionLog) -> tpdev_core::Result<()> {
        if self.kubectl.ensure_namespace(namespace)? {
            log.push(format!("created namespace {}", namespace));
        }

        let out = self
            .runner
            .run(self.binary.path(), &["helm", "install", "--namespace", namespace])?;
        if !out.success() {
            return Err(TpError::InstallFailed {
                namespace: namespace.to_string(),
                message: out.failure_text().to_string(),
            });
        }
        info!(namespace, "installed traffic-manager");
        log.push(format!("installed traffic-manager in {}", namespace));
        Ok(())
    }

    /// Poll until ready or `timeout` elapses. Returns whether readiness was observed.
    pub fn wait_until_ready(&self, namespace: &str, timeout: Duration) -> bool {
        self.wait_for_status(namespace, timeout).ready()
    }

    /// Poll on a constant interval; returns the last observed status.
    ///
    /// A timeout too large to represent as a deadline waits without bound.
    fn wait_for_status(&self, namespace: &str, timeout: Duration) -> ManagerStatus {
        let deadline = Instant::now().checked_add(timeout);
        let mut polls = 0u32;
        loop {
            let status = self.status(namespace);
            polls = polls.saturating_add(1);
            if status.ready() {
                debug!(namespace, polls, "traffic-manager ready");
                return status;
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(namespace, polls, ?timeout, "traffic-manager not ready before timeout");
                        return status;
                    }
                    self.poll_interval.min(deadline - now)
                }
                None => self.poll_interval,
            };
            std::thread::sleep(pause);
        }
    }

    /// Install if absent, then wait if not ready.
    pub fn bootstrap(
        &self,
        namespace: &str,
        timeout: Duration,
        log: &mut ActionLog,
    ) -> tpdev_core::Result<ManagerReport> {
        let initial = self.status(namespace);
        debug!(
            namespace,
            installed = initial.installed(),
            ready = initial.ready(),
            "traffic-manager status"
        );

        let status = if !initial.installed() {
            self.install(namespace, log)?;
            self.wait_for_status(namespace, timeout)
        } else if !initial.ready() {
            self.wait_for_status(namespace, timeout)
        } else {
            initial
        };

        if status.ready() {
            log.push(format!("traffic-manager ready in {}", namespace));
        } else {
            log.push(format!(
                "traffic-manager not ready in {} after {}s",
                namespace,
                timeout.as_secs()
            ));
        }

        Ok(ManagerReport {
            namespace: namespace.to_string(),
            // Either it was there already or the install above succeeded
            installed: true,
            installed_this_run: !initial.installed(),
            ready: status.ready(),
            available_replicas: status.available_replicas(),
        })
    }
}

/// Read `.status.availableReplicas` from a deployment object.
fn parse_deployment_status(body: &str) -> ManagerStatus {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return ManagerStatus::unreadable();
    };

    let replicas = value
        .get("status")
        .and_then(|s| s.get("availableReplicas"))
        .and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .unwrap_or(0);
    ManagerStatus::with_replicas(u32::try_from(replicas).unwrap_or(u32::MAX))
}
